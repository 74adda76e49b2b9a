//! Process signals as a control-plane transport
//!
//! Kept in its own test binary: it signals the test process itself.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{CountingUpdater, FakeRecorder, MemoryJobStore};
use kaede::job_scheduling::{Scheduler, SchedulerState};
use kaede::services::signals::SignalAdapter;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn send_signal(name: &str) {
    let status = tokio::process::Command::new("kill")
        .arg(format!("-{name}"))
        .arg(std::process::id().to_string())
        .status()
        .await
        .unwrap();
    assert!(status.success());
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_signals_drive_reload_update_and_stop() {
    let store = Arc::new(MemoryJobStore::new());
    store.schedule(1, Duration::from_secs(3600));
    let updater = Arc::new(CountingUpdater::default());
    let scheduler = Arc::new(
        Scheduler::setup(store.clone(), Arc::new(FakeRecorder::new()))
            .with_updater(updater.clone()),
    );
    let handle = scheduler.handle();
    let signals = SignalAdapter::spawn(handle.clone()).unwrap();

    let task = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.start().await }
    });
    tokio::time::timeout(TIMEOUT, handle.wait_for_state(SchedulerState::Running))
        .await
        .unwrap();
    assert_eq!(store.loads(), 1);
    assert_eq!(handle.list_scheduled().await.len(), 1);

    send_signal("HUP").await;
    wait_until("reload", || store.loads() >= 2).await;

    send_signal("USR1").await;
    wait_until("sync", || updater.calls() == 1).await;
    wait_until("reload after sync", || store.loads() >= 3).await;

    send_signal("TERM").await;
    let result = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(handle.state(), SchedulerState::Terminated);

    signals.shutdown(Duration::from_secs(1)).await;
}
