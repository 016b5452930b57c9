use serde::{Deserialize, Serialize};

/// Feature flags an engine advertises. UI affordances gate on these.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeCapabilities {
    pub switch_to_branch: bool,
    pub edit: bool,
    pub reload: bool,
    pub cancel: bool,
    pub copy: bool,
    pub speech: bool,
    pub attachments: bool,
    pub feedback: bool,
}

/// Model settings the engine runs with. Opaque to the runtime facade.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}
