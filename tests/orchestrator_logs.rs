// tests/orchestrator_logs.rs

mod common;
use crate::common::{ServiceConfigBuilder, init_tracing};

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use herd::home::HomeDirs;
use herd::orchestrator::{Orchestrator, StartOptions, StopOptions};
use herd::services::{ServiceContext, ServiceTree};
use herd::tracker::TaskState;
use herd::types::OperationConfig;
use herd_test_utils::builders::ConfigFileBuilder;
use herd_test_utils::follower::RecordingFollower;
use herd_test_utils::with_timeout;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn follows_logs_of_a_group_with_prefixes() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigFileBuilder::new()
        .with_service(
            "alpha",
            ServiceConfigBuilder::new("echo hello-alpha; sleep 30")
                .log_text("hello-alpha")
                .build(),
        )
        .with_service(
            "beta",
            ServiceConfigBuilder::new("echo hello-beta; sleep 30")
                .log_text("hello-beta")
                .build(),
        )
        .with_group("both", &["alpha", "beta"])
        .build_at(dir.path().join("herd.toml"));

    let follower = Arc::new(RecordingFollower::new());
    let out = SharedBuf::default();
    let orch = Orchestrator::new(
        Some(ServiceTree::from_config(&config).unwrap()),
        ServiceContext::new(HomeDirs::new(dir.path().join("home")).unwrap()),
        OperationConfig::default(),
        follower.clone(),
    )
    .with_io(&b""[..], out.clone());

    with_timeout(orch.start(&names(&["both"]), &StartOptions::default()))
        .await
        .unwrap();
    assert_eq!(follower.state("both"), Some(TaskState::Success));
    assert_eq!(follower.state("both > alpha > Start"), Some(TaskState::Success));
    assert_eq!(follower.state("both > beta > Start"), Some(TaskState::Success));
    assert_eq!(follower.done_calls(), 1);

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        stopper.cancel();
    });
    with_timeout(orch.log_until(&names(&["both"]), cancel))
        .await
        .unwrap();

    let printed = out.contents();
    assert!(printed.contains("[alpha] hello-alpha"), "{printed}");
    assert!(printed.contains("[beta] hello-beta"), "{printed}");

    with_timeout(orch.stop(
        &[],
        &StopOptions {
            force: true,
            ..Default::default()
        },
    ))
    .await
    .unwrap();
    assert!(orch.context().store.list().is_empty());
}

#[tokio::test]
async fn excluded_services_are_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigFileBuilder::new()
        .with_service("kept", ServiceConfigBuilder::new("sleep 30").wait_ms(100).build())
        .with_service("skipped", ServiceConfigBuilder::new("sleep 30").wait_ms(100).build())
        .with_group("pair", &["kept", "skipped"])
        .build_at(dir.path().join("herd.toml"));

    let follower = Arc::new(RecordingFollower::new());
    let orch = Orchestrator::new(
        Some(ServiceTree::from_config(&config).unwrap()),
        ServiceContext::new(HomeDirs::new(dir.path().join("home")).unwrap()),
        OperationConfig::default(),
        follower.clone(),
    )
    .with_io(&b""[..], Vec::<u8>::new());

    let opts = StartOptions {
        exclude: vec!["skipped".into()],
        ..Default::default()
    };
    with_timeout(orch.start(&names(&["pair"]), &opts)).await.unwrap();
    assert_eq!(follower.state("pair > kept > Start"), Some(TaskState::Success));
    assert_eq!(follower.state("pair > skipped"), None);

    let running = orch.status(&[], false).await.unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].name, "kept");

    with_timeout(orch.stop(&names(&["pair"]), &StopOptions::default()))
        .await
        .unwrap();
    assert!(orch.status(&[], false).await.unwrap().is_empty());
}
