/*
[INPUT]:  CLI arguments, YAML configuration file, Ctrl-C
[OUTPUT]: Task progress as JSON lines, final payload, exit status
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, output format, or interrupt handling
*/

mod config;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tasker_client::{TaskHandle, TaskId, TaskOptions, Tasker};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tasker", version, about = "Submit and follow tasks on a remote task server")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "base-url", value_name = "URL")]
    base_url: Option<String>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new task with JSON data and follow it
    Dispose {
        #[arg(long, value_name = "JSON", default_value = "{}")]
        data: String,
        #[arg(long = "header", short = 'H', value_name = "NAME: VALUE")]
        headers: Vec<String>,
    },
    /// Follow a task that is already running
    Join {
        task_id: String,
        #[arg(long = "header", short = 'H', value_name = "NAME: VALUE")]
        headers: Vec<String>,
    },
    /// Ask the server to cancel a task
    Terminate { task_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = config::load_config(args.config_path.as_deref(), args.base_url.as_deref())?;
    info!(base_url = %config.base_url, "configuration loaded");
    let tasker = Tasker::new(config).context("create tasker client")?;

    match args.command {
        Command::Dispose { data, headers } => {
            let data: serde_json::Value =
                serde_json::from_str(&data).context("--data must be valid JSON")?;
            let options = task_options(&headers)?;
            let handle = tasker.dispose(&data, options).context("dispose task")?;
            follow(handle).await
        }
        Command::Join { task_id, headers } => {
            let options = task_options(&headers)?;
            let handle = tasker.join(task_id, options).context("join task")?;
            follow(handle).await
        }
        Command::Terminate { task_id } => {
            let response = tasker
                .terminate(&TaskId::from(task_id))
                .await
                .context("terminate task")?;
            println!("{response}");
            Ok(())
        }
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn task_options(headers: &[String]) -> Result<TaskOptions> {
    let mut options = TaskOptions::new();
    if let Some(headers) = config::parse_headers(headers)? {
        options = options.with_headers(headers);
    }
    Ok(options)
}

/// Print progress until the task settles.
///
/// The first Ctrl-C requests termination, the second gives up waiting.
async fn follow(mut handle: TaskHandle) -> Result<()> {
    let mut progress = handle.take_progress();
    let mut interrupted = false;

    loop {
        tokio::select! {
            outcome = handle.outcome() => {
                return match outcome {
                    Ok(event) => {
                        println!("{}", serde_json::to_string(&event)?);
                        Ok(())
                    }
                    Err(err) => Err(anyhow!(err)),
                };
            }
            Some(event) = recv_progress(&mut progress) => {
                println!("{}", serde_json::to_string(&event)?);
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("listen for Ctrl-C")?;
                if interrupted {
                    bail!("interrupted before the task settled");
                }
                interrupted = true;
                match handle.terminate().await {
                    Ok(_) => info!(task_id = ?handle.task_id(), "termination requested; waiting for the server"),
                    Err(err) => warn!(error = %err, "terminate failed"),
                }
            }
        }
    }
}

async fn recv_progress(
    progress: &mut Option<tokio::sync::mpsc::Receiver<tasker_client::TaskEvent>>,
) -> Option<tasker_client::TaskEvent> {
    match progress {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
