use capsule_local::configuration::config::Config;
use capsule_local::container_management::{ContainerManager, DockerRuntime};
use capsule_local::error_handling::types::{CliError, LogStreamError};
use capsule_local::log_streaming::{LogOrigin, LogRecord, LogStreamDemuxer};
use clap::{Parser, Subcommand};
use futures_util::{Stream, StreamExt};
use log::{debug, error, info, warn};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "capsule-local")]
#[command(version = "0.0.2")]
#[command(about = "Runs capsule containers against a local container runtime")]
struct Args {
    config_file: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull the image, ensure the project network and (re)create the container
    Deploy,
    /// Print the container's stdout/stderr
    Logs {
        /// Keep streaming until the container exits or Ctrl-C
        #[arg(short, long)]
        follow: bool,
        /// Container to read from, defaults to the configured one
        instance: Option<String>,
    },
    /// List containers whose name starts with the configured name
    Instances,
    /// Force-remove every container whose name starts with the configured name
    Teardown,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    if args.config_file.is_empty() {
        error!("No configuration file found");
        std::process::exit(1);
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    if let Err(e) = run(args, &cancel).await {
        error!("{}, exiting...", e);
        std::process::exit(1);
    }
}

async fn run(args: Args, cancel: &CancellationToken) -> Result<(), CliError> {
    info!("Importing configuration");
    let config = Config::from_file(Path::new(args.config_file.as_str()))?;
    info!("Configuration imported successfully");

    let runtime = Arc::new(DockerRuntime::connect(&config.runtime).await?);

    match args.command {
        Command::Deploy => {
            let manager = ContainerManager::new(runtime);
            let result = manager
                .deploy(
                    &config.project_id,
                    &config.container,
                    config.registry.as_ref(),
                    cancel,
                )
                .await?;
            print_json(&result);
            if !result.started {
                warn!("Container {} was created but did not start", result.name);
            }
        }
        Command::Logs { follow, instance } => {
            let name = instance.unwrap_or_else(|| config.container.name.clone());
            let demuxer = LogStreamDemuxer::new(runtime);
            let records = demuxer.attach(&name, follow, cancel);
            info!("[{}] Streaming logs of {}", records.id(), name);
            print_records(records, &mut std::io::stdout(), &mut std::io::stderr()).await?;
        }
        Command::Instances => {
            let manager = ContainerManager::new(runtime);
            let instances = manager.instances(&config.container.name, cancel).await?;
            print_json(&instances);
        }
        Command::Teardown => {
            let manager = ContainerManager::new(runtime);
            let removed = manager.teardown(&config.container.name, cancel).await?;
            info!("Removed {} containers", removed);
        }
    }
    Ok(())
}

/// Copies records to the matching output until the stream ends, is
/// cancelled, or an output stops accepting writes (e.g. a closed pipe).
async fn print_records<S>(
    mut records: S,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<(), CliError>
where
    S: Stream<Item = Result<LogRecord, LogStreamError>> + Unpin,
{
    while let Some(record) = records.next().await {
        let record = match record {
            Ok(record) => record,
            // Ctrl-C ends a followed stream normally.
            Err(e) if e.is_cancelled() => break,
            Err(e) => return Err(e.into()),
        };
        let out: &mut dyn Write = match record.origin {
            LogOrigin::Stdout => &mut *stdout,
            LogOrigin::Stderr => &mut *stderr,
        };
        if let Err(e) = write_record(out, &record) {
            debug!("Output closed, detaching from logs: {}", e);
            break;
        }
    }
    Ok(())
}

fn write_record(out: &mut dyn Write, record: &LogRecord) -> std::io::Result<()> {
    if let Some(ts) = record.timestamp {
        write!(out, "{} ", ts.to_rfc3339())?;
    }
    out.write_all(&record.payload)?;
    out.flush()
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Unable to render output: {}", e),
    }
}
