use std::path::Path;

use serde::{Deserialize, Serialize};
use threadline_core::{ModelConfig, RuntimeCapabilities, ThreadId};

use crate::error::ConfigError;

/// Settings for a [`LocalThreadCore`](crate::LocalThreadCore).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalThreadConfig {
    /// Fixed thread id; a fresh one is generated when unset.
    pub thread_id: Option<ThreadId>,
    pub is_disabled: bool,
    /// Replaces the engine's built-in capability set. `speech` and
    /// `feedback` are still cleared when no adapter is installed.
    pub capabilities: Option<RuntimeCapabilities>,
    pub model_config: ModelConfig,
}

impl LocalThreadConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Capabilities the engine advertises, given which adapters exist.
    pub(crate) fn resolve_capabilities(&self, speech: bool, feedback: bool) -> RuntimeCapabilities {
        let mut caps = self.capabilities.clone().unwrap_or(RuntimeCapabilities {
            switch_to_branch: true,
            edit: true,
            reload: true,
            cancel: true,
            copy: true,
            speech: true,
            attachments: true,
            feedback: true,
        });
        caps.speech &= speech;
        caps.feedback &= feedback;
        caps
    }
}
