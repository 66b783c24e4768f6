use capsule_local::configuration::RuntimeSettings;
use capsule_local::container_management::types::{ConfigFile, ContainerSpec, PortMapping};
use capsule_local::container_management::{ContainerManager, DockerRuntime};
use capsule_local::log_streaming::{LogOrigin, LogStreamDemuxer};
use futures_util::StreamExt;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting local deploy demo");

    let runtime = match DockerRuntime::connect(&RuntimeSettings::default()).await {
        Ok(runtime) => Arc::new(runtime),
        Err(e) => {
            error!("Failed to reach the container runtime (is Docker running?): {}", e);
            return Err(e.into());
        }
    };
    let manager = ContainerManager::new(runtime.clone());
    let cancel = CancellationToken::new();

    // A web server with an injected page, published on 8080
    let spec = ContainerSpec {
        name: "demo-web-0".to_string(),
        image: "nginx:alpine".to_string(),
        ports: vec![PortMapping {
            container_port: 80,
            host_port: Some(8080),
            protocol: "tcp".to_string(),
        }],
        files: vec![ConfigFile::new(
            "/usr/share/nginx/html/index.html",
            &b"<h1>hello from capsule-local</h1>\n"[..],
        )],
        ..Default::default()
    };

    let result = manager.deploy("capsule-demo", &spec, None, &cancel).await?;
    info!(
        "Deployed {} on network {} (replaced={}, started={})",
        result.name, result.network, result.replaced, result.started
    );

    // Follow the logs for a few seconds, then stop
    let demuxer = LogStreamDemuxer::new(runtime);
    let mut records = demuxer.attach(&spec.name, true, &cancel);
    let follow_for = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(follow_for);
    loop {
        tokio::select! {
            _ = &mut follow_for => {
                records.cancel();
                break;
            }
            next = records.next() => match next {
                Some(Ok(record)) => {
                    let tag = match record.origin {
                        LogOrigin::Stdout => "out",
                        LogOrigin::Stderr => "err",
                    };
                    info!("[{}] {}", tag, String::from_utf8_lossy(&record.payload).trim_end());
                }
                Some(Err(e)) => {
                    warn!("Log stream ended: {}", e);
                    break;
                }
                None => break,
            }
        }
    }

    let stats = manager.get_container_stats();
    info!(
        "Stats: created={} replaced={} failed_starts={}",
        stats.total_created, stats.total_replaced, stats.failed_starts
    );

    let removed = manager.teardown("demo-web-", &cancel).await?;
    info!("Removed {} demo containers", removed);
    Ok(())
}
