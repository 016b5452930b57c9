use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use threadline_core::{AssistantStreamChunk, ExportedMessageRepository, MessageId, ThreadRuntimeCore};
use threadline_engine::{drive_run, LocalThreadConfig, LocalThreadCore, RunOutcome, ThreadCoreSlot};
use threadline_reactive::Subscribable;
use threadline_runtime::{BranchSelector, ThreadRuntime};
use threadline_telemetry::{init_telemetry, LogLevel, TelemetryConfig};

#[derive(Parser)]
#[command(name = "threadline", about = "Branching conversation threads on a local engine")]
struct Cli {
    /// Default log level (RUST_LOG overrides).
    #[arg(long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the active path of an exported thread.
    Inspect {
        /// Export JSON, as written by `demo`.
        file: PathBuf,
    },
    /// Run a scripted conversation and print its export.
    Demo {
        /// Local thread config (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = init_telemetry(TelemetryConfig {
        log_level: cli.log_level,
        module_levels: Vec::new(),
        json: cli.json_logs,
    })?;

    match cli.command {
        Command::Inspect { file } => inspect(&file),
        Command::Demo { config } => demo(config).await,
    }
}

fn bind(core: &LocalThreadCore) -> ThreadRuntime {
    let slot = ThreadCoreSlot::new(Arc::new(core.clone()));
    ThreadRuntime::new(Arc::new(slot))
}

fn inspect(file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let data = ExportedMessageRepository::from_json(&raw).context("parsing export")?;
    if data.is_empty() {
        println!("(empty thread)");
        return Ok(());
    }

    let core = LocalThreadCore::new(LocalThreadConfig::default());
    let runtime = bind(&core);
    runtime.import(data)?;

    for index in 0..runtime.messages().len() {
        let Some(state) = runtime.get_message_by_index(index as isize)?.get_state() else {
            continue;
        };
        let text = state.message.text_content().replace('\n', " ");
        println!(
            "{:<9} {}/{}  {}",
            state.message.role.to_string(),
            state.branch_number,
            state.branch_count,
            text
        );
    }
    Ok(())
}

/// Stream `reply` word by word into the run `run_id`.
async fn stream_reply(core: &LocalThreadCore, run_id: &MessageId, reply: &str) -> anyhow::Result<()> {
    let words: Vec<String> = reply.split_inclusive(' ').map(str::to_string).collect();
    let chunks = futures::stream::iter(words).then(|word| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        AssistantStreamChunk::text(word)
    });
    match drive_run(core, run_id, chunks).await? {
        RunOutcome::Completed => Ok(()),
        other => bail!("run {run_id} ended early: {other:?}"),
    }
}

async fn demo(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => LocalThreadConfig::from_json_file(&path)?,
        None => LocalThreadConfig::default(),
    };
    let core = LocalThreadCore::new(config);
    let runtime = bind(&core);

    let watcher = runtime.watch();
    let observer = tokio::spawn(async move {
        let mut states = watcher.into_stream();
        while let Some(state) = states.next().await {
            tracing::info!(running = state.is_running, "thread state");
        }
    });

    runtime.append("What does a memoizing subject guarantee?")?;
    let first_run = core.active_run().context("append did not start a run")?;
    stream_reply(
        &core,
        &first_run,
        "It recomputes at most once per source snapshot and keeps the same reference while nothing changed.",
    )
    .await?;

    let reply = runtime.get_message_by_index(1)?;
    reply.reload_action().trigger()?;
    let second_run = core.active_run().context("reload did not start a run")?;
    stream_reply(
        &core,
        &second_run,
        "Derived values are cached by source identity, so readers see stable references.",
    )
    .await?;

    if let Some(state) = reply.get_state() {
        tracing::info!(
            branch = state.branch_number,
            of = state.branch_count,
            "reloaded reply"
        );
    }
    reply.switch_to_branch(BranchSelector::Previous)?;

    observer.abort();
    println!("{}", core.export().to_json()?);
    Ok(())
}
