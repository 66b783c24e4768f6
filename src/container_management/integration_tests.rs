#[cfg(test)]
mod integration_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::StreamExt;
    use serial_test::serial;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use crate::configuration::types::RuntimeSettings;
    use crate::container_management::types::{ConfigFile, ContainerSpec};
    use crate::container_management::{ContainerManager, ContainerRuntime, DockerRuntime};
    use crate::log_streaming::{LogOrigin, LogStreamDemuxer};

    const PROJECT: &str = "capsule-it";
    const PREFIX: &str = "capsule-it-";

    fn create_test_spec(name: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: "busybox:1.36".to_string(),
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "cat /etc/capsule/motd; echo oops >&2; sleep 30".to_string(),
            ],
            files: vec![ConfigFile::new("/etc/capsule/motd", &b"hello capsule"[..])],
            ..Default::default()
        }
    }

    async fn connect() -> Option<Arc<DockerRuntime>> {
        match DockerRuntime::connect(&RuntimeSettings::default()).await {
            Ok(runtime) => Some(Arc::new(runtime)),
            Err(e) => {
                println!("Docker not reachable, skipping: {}", e);
                None
            }
        }
    }

    async fn cleanup(manager: &ContainerManager) {
        let _ = manager.teardown(PREFIX, &CancellationToken::new()).await;
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a running Docker daemon and registry access"]
    async fn test_deploy_end_to_end() {
        let Some(runtime) = connect().await else {
            return;
        };
        let manager = ContainerManager::new(runtime.clone());
        let cancel = CancellationToken::new();
        cleanup(&manager).await;

        let name = format!("{}web", PREFIX);
        let result = timeout(
            Duration::from_secs(120),
            manager.deploy(PROJECT, &create_test_spec(&name), None, &cancel),
        )
        .await
        .expect("deploy timed out")
        .expect("deploy failed");

        assert_eq!(result.name, name);
        assert!(result.started);
        assert!(result.network_attached);

        // Redeploying replaces the same-named container.
        let again = manager
            .deploy(PROJECT, &create_test_spec(&name), None, &cancel)
            .await
            .expect("redeploy failed");
        assert!(again.replaced);

        let instances = manager.instances(PREFIX, &cancel).await.unwrap();
        assert_eq!(instances.len(), 1);

        assert_eq!(manager.teardown(PREFIX, &cancel).await.unwrap(), 1);
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a running Docker daemon and registry access"]
    async fn test_logs_carry_injected_file_and_both_origins() {
        let Some(runtime) = connect().await else {
            return;
        };
        let manager = ContainerManager::new(runtime.clone());
        let cancel = CancellationToken::new();
        cleanup(&manager).await;

        let name = format!("{}logs", PREFIX);
        manager
            .deploy(PROJECT, &create_test_spec(&name), None, &cancel)
            .await
            .expect("deploy failed");
        tokio::time::sleep(Duration::from_secs(2)).await;

        let demuxer = LogStreamDemuxer::new(runtime.clone());
        let records: Vec<_> = demuxer
            .attach(&name, false, &cancel)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()
            .expect("log stream failed");

        assert!(records
            .iter()
            .any(|r| r.origin == LogOrigin::Stdout && r.payload.starts_with(b"hello capsule")));
        assert!(records
            .iter()
            .any(|r| r.origin == LogOrigin::Stderr && r.payload.starts_with(b"oops")));
        assert!(records.iter().all(|r| r.timestamp.is_some()));

        cleanup(&manager).await;
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a running Docker daemon"]
    async fn test_missing_container_errors() {
        let Some(runtime) = connect().await else {
            return;
        };
        let err = runtime
            .remove_container("capsule-it-does-not-exist", true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let manager = ContainerManager::new(runtime);
        let instances = manager
            .instances("capsule-it-does-not-exist", &CancellationToken::new())
            .await
            .unwrap();
        assert!(instances.is_empty());
    }
}
