// tests/supervisor_shutdown.rs

mod common;

use std::time::Duration;

use pocket_cloud_server::engine::{ProcessNotification, SupervisorEvent};
use pocket_cloud_server::errors::SupervisorError;
use pocket_cloud_server::types::ServiceState;

use crate::common::builders::registry_of;
use crate::common::{events_until_stopped, labels, with_timeout, FakeLauncher, HarnessBuilder};

fn count(labels: &[String], wanted: &str) -> usize {
    labels.iter().filter(|l| l.as_str() == wanted).count()
}

#[tokio::test]
async fn stop_asks_every_service_once_and_reports_one_stop() {
    let mut h = HarnessBuilder::new(registry_of(&["a", "b", "c"])).start();
    h.until_all_on(3).await;

    h.handle.stop().await;
    h.handle.stop().await;

    let events = events_until_stopped(&mut h.events).await;
    let names = labels(&events);

    for svc in ["a", "b", "c"] {
        assert_eq!(count(&names, &format!("stop-service({svc})")), 1);
        assert_eq!(count(&names, &format!("service-state({svc}, OFF)")), 1);
        assert_eq!(h.launcher.stop_requests(svc), 1);
        assert_eq!(h.status.get(svc), Some(ServiceState::Off));
    }
    assert_eq!(count(&names, "stop"), 1);
    assert!(matches!(events.last(), Some(SupervisorEvent::Stopped(None))));

    with_timeout(h.handle.join()).await.unwrap();
}

#[tokio::test]
async fn stop_service_events_come_first_in_registry_order() {
    let mut h = HarnessBuilder::new(registry_of(&["a", "b", "c"])).start();
    h.until_all_on(3).await;

    h.handle.stop().await;
    let events = events_until_stopped(&mut h.events).await;

    assert_eq!(
        labels(&events[..3]),
        vec!["stop-service(a)", "stop-service(b)", "stop-service(c)"]
    );
}

#[tokio::test]
async fn dropping_the_handle_stops_everything() {
    let mut h = HarnessBuilder::new(registry_of(&["a", "b"])).start();
    h.until_all_on(2).await;

    let launcher = h.launcher.clone();
    drop(h.handle);

    let events = events_until_stopped(&mut h.events).await;
    assert!(matches!(events.last(), Some(SupervisorEvent::Stopped(None))));
    assert_eq!(launcher.stop_requests("a"), 1);
    assert_eq!(launcher.stop_requests("b"), 1);
}

#[tokio::test]
async fn unresponsive_service_hits_the_shutdown_timeout() {
    let launcher = FakeLauncher::new().ignore_stop("b");
    let mut h = HarnessBuilder::new(registry_of(&["a", "b"]))
        .launcher(launcher)
        .shutdown_timeout(Duration::from_millis(200))
        .start();
    h.until_all_on(2).await;

    h.handle.stop().await;
    let events = events_until_stopped(&mut h.events).await;

    match events.last() {
        Some(SupervisorEvent::Stopped(Some(SupervisorError::ShutdownTimeout { pending, timeout, errors }))) => {
            assert_eq!(pending, &vec!["b".to_string()]);
            assert_eq!(*timeout, Duration::from_millis(200));
            assert!(errors.is_empty());
        }
        other => panic!("expected shutdown timeout, got {other:?}"),
    }
    assert_eq!(h.status.get("a"), Some(ServiceState::Off));
    assert_eq!(h.status.get("b"), Some(ServiceState::On));
}

#[tokio::test]
async fn shutdown_timeout_keeps_earlier_service_errors() {
    let launcher = FakeLauncher::new().ignore_stop("b");
    let mut h = HarnessBuilder::new(registry_of(&["a", "b"]))
        .launcher(launcher)
        .shutdown_timeout(Duration::from_millis(200))
        .start();
    h.until_all_on(2).await;

    h.launcher.crash("a", 4).await;
    crate::common::events_until(&mut h.events, |e| matches!(e, SupervisorEvent::Error(_))).await;

    h.handle.stop().await;
    let events = events_until_stopped(&mut h.events).await;

    match events.last() {
        Some(SupervisorEvent::Stopped(Some(err @ SupervisorError::ShutdownTimeout { pending, errors, .. }))) => {
            assert_eq!(pending, &vec!["b".to_string()]);
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].service, "a");
            assert!(err.to_string().contains("exited with code 4"), "got: {err}");
        }
        other => panic!("expected shutdown timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn huge_shutdown_timeout_waits_without_a_deadline() {
    let mut h = HarnessBuilder::new(registry_of(&["a"]))
        .shutdown_timeout(Duration::from_secs(u64::MAX))
        .start();
    h.until_all_on(1).await;

    h.handle.stop().await;
    let events = events_until_stopped(&mut h.events).await;
    assert!(matches!(events.last(), Some(SupervisorEvent::Stopped(None))));

    with_timeout(h.handle.join()).await.unwrap();
}

#[tokio::test]
async fn error_during_shutdown_is_aggregated() {
    let launcher = FakeLauncher::new().ignore_stop("a");
    let mut h = HarnessBuilder::new(registry_of(&["a"]))
        .launcher(launcher)
        .start();
    h.until_all_on(1).await;

    h.handle.stop().await;
    assert_eq!(
        crate::common::next_event(&mut h.events).await.to_string(),
        "stop-service(a)"
    );

    h.launcher
        .notify("a", ProcessNotification::Error("lost contact".to_string()))
        .await;
    h.launcher.notify("a", ProcessNotification::Exit).await;

    let events = events_until_stopped(&mut h.events).await;
    let names = labels(&events);
    assert_eq!(
        names,
        vec![
            "service-state(a, ERROR)",
            "error(ServiceError a: lost contact)",
            "stop(1 service error(s): ServiceError a: lost contact)",
        ]
    );
}

#[tokio::test]
async fn stop_before_anything_started_finishes_immediately() {
    let mut h = HarnessBuilder::new(registry_of(&["a"]))
        .launcher(FakeLauncher::new().manual_start())
        .start();

    // No `Started` notification: the monitor has no state yet.
    let startup = crate::common::events_until(&mut h.events, |e| {
        matches!(e, SupervisorEvent::Started)
    })
    .await;
    assert_eq!(labels(&startup), vec!["start-service(a)", "start-api", "start"]);

    h.handle.stop().await;
    let events = events_until_stopped(&mut h.events).await;
    assert_eq!(
        labels(&events),
        vec!["stop-service(a)", "service-state(a, OFF)", "stop"]
    );
}
