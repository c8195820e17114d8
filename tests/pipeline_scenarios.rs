//! Delivery pipeline scenarios
//!
//! End-to-end behavior of submit / reconcile against fake endpoints:
//! sink isolation, offline handling, deadline races, retry budget, and
//! durability of the retry queue across restarts.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{frozen_clock, submission, Behavior, FakeTransport};
use graduation_invite::delivery::{
    run_reconciler, Connectivity, DeliveryPipeline, Encoding, PipelineSettings,
};
use graduation_invite::storage::{InMemoryStore, KeyValueStore, SledStore, QUEUE_KEY};
use graduation_invite::{QueuedSubmission, RemoteStatus};
use tokio_util::sync::CancellationToken;

fn pipeline_with(store: Arc<dyn KeyValueStore>, settings: PipelineSettings) -> DeliveryPipeline {
    DeliveryPipeline::new(store, settings)
        .unwrap()
        .with_clock(frozen_clock())
}

fn persisted_queue(store: &dyn KeyValueStore) -> Vec<QueuedSubmission> {
    store
        .get(QUEUE_KEY)
        .unwrap()
        .map(|bytes| serde_json::from_slice(&bytes).unwrap())
        .unwrap_or_default()
}

async fn reopen(path: &std::path::Path) -> SledStore {
    // The previous queue actor releases the database once it sees its channel close
    for _ in 0..100 {
        if let Ok(store) = SledStore::open(path) {
            return store;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("database at {} never released", path.display());
}

// ============================================================================
// Submit
// ============================================================================

#[tokio::test]
async fn remote_disabled_keeps_submission_local_only() {
    let p = pipeline_with(Arc::new(InMemoryStore::new()), PipelineSettings::default());

    let result = p.submit(submission("An", "student")).await;

    assert!(result.local_ok);
    assert!(result.analytics_ok);
    assert!(!result.remote_ok);
    assert!(!result.queued_for_retry);
    assert_eq!(result.remote, RemoteStatus::Disabled);

    let stats = p.statistics().await.unwrap();
    assert_eq!(stats.total_submissions, 1);
    assert_eq!(stats.pending_submissions, 0);
}

#[tokio::test]
async fn offline_without_queueing_skips_remote() {
    let settings = PipelineSettings {
        queue_when_offline: false,
        ..PipelineSettings::default()
    };
    let transport = FakeTransport::new(Behavior::Succeed);
    let p = pipeline_with(Arc::new(InMemoryStore::new()), settings)
        .with_transport(transport.clone())
        .with_connectivity(Connectivity::new(false));

    let result = p.submit(submission("An", "student")).await;

    assert!(result.local_ok);
    assert!(!result.remote_ok);
    assert!(!result.queued_for_retry);
    assert_eq!(result.remote, RemoteStatus::Offline);
    assert!(transport.calls().is_empty());
    assert!(p.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn offline_submission_is_queued_by_default() {
    let transport = FakeTransport::new(Behavior::Succeed);
    let p = pipeline_with(Arc::new(InMemoryStore::new()), PipelineSettings::default())
        .with_transport(transport.clone())
        .with_connectivity(Connectivity::new(false));

    let result = p.submit(submission("An", "student")).await;

    assert_eq!(result.remote, RemoteStatus::Offline);
    assert!(result.queued_for_retry);
    assert!(transport.calls().is_empty());
    assert_eq!(p.pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn online_submission_is_delivered_or_queued() {
    for behavior in [Behavior::Succeed, Behavior::Fail] {
        let p = pipeline_with(Arc::new(InMemoryStore::new()), PipelineSettings::default())
            .with_transport(FakeTransport::new(behavior));
        let result = p.submit(submission("An", "student")).await;
        assert!(
            result.remote_ok || result.queued_for_retry,
            "{behavior:?}: neither delivered nor queued"
        );
        assert!(!(result.remote_ok && result.queued_for_retry));
    }
}

#[tokio::test]
async fn sink_failing_twice_queues_and_persists() {
    let store = Arc::new(InMemoryStore::new());
    let transport = FakeTransport::new(Behavior::Fail);
    let p = pipeline_with(store.clone(), PipelineSettings::default()).with_transport(transport.clone());

    let before = persisted_queue(store.as_ref()).len();
    let result = p.submit(submission("An", "student")).await;

    assert!(result.local_ok);
    assert!(!result.remote_ok);
    assert!(result.queued_for_retry);
    assert!(matches!(result.remote, RemoteStatus::Failed { .. }));
    assert_eq!(
        transport.calls(),
        vec![
            ("An".to_string(), Encoding::Json),
            ("An".to_string(), Encoding::FormField)
        ]
    );
    assert_eq!(persisted_queue(store.as_ref()).len(), before + 1);
}

#[tokio::test]
async fn full_local_store_only_degrades_local_flag() {
    // Too small for any log blob; the queue is never written when delivery succeeds
    let store = Arc::new(InMemoryStore::with_quota(16));
    let p = pipeline_with(store, PipelineSettings::default())
        .with_transport(FakeTransport::new(Behavior::Succeed));

    let result = p.submit(submission("An", "student")).await;

    assert!(!result.local_ok);
    assert!(result.remote_ok);
    assert_eq!(p.statistics().await.unwrap().total_submissions, 0);
}

#[tokio::test(start_paused = true)]
async fn slow_endpoint_loses_the_deadline_race() {
    let transport = FakeTransport::new(Behavior::Hang(Duration::from_secs(10)));
    let p = pipeline_with(Arc::new(InMemoryStore::new()), PipelineSettings::default())
        .with_transport(transport.clone());

    let started = tokio::time::Instant::now();
    let result = p.submit(submission("An", "student")).await;

    // Two attempts, each cut at the 2 s pipeline deadline
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5), "{elapsed:?}");
    assert!(result.queued_for_retry);
    match result.remote {
        RemoteStatus::Failed { reason } => assert!(reason.contains("Timed out"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_in_flight_attempt() {
    let shutdown = CancellationToken::new();
    let transport = FakeTransport::new(Behavior::Hang(Duration::from_secs(1)));
    let p = pipeline_with(Arc::new(InMemoryStore::new()), PipelineSettings::default())
        .with_transport(transport.clone())
        .with_shutdown(shutdown.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.cancel();
    });
    let result = p.submit(submission("An", "student")).await;
    trigger.await.unwrap();

    assert!(transport.was_cancelled());
    assert!(result.queued_for_retry);
}

#[tokio::test]
async fn log_keeps_last_hundred_in_order() {
    let p = pipeline_with(Arc::new(InMemoryStore::new()), PipelineSettings::default());
    for i in 0..120 {
        p.submit(submission(&format!("Guest {i}"), "outsider")).await;
    }

    let csv = p.export_csv().unwrap();
    let rows: Vec<_> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 100);
    assert!(rows[0].contains("\"Guest 20\""));
    assert!(rows[99].contains("\"Guest 119\""));
}

#[tokio::test]
async fn export_of_empty_log_is_empty() {
    let p = pipeline_with(Arc::new(InMemoryStore::new()), PipelineSettings::default());
    assert_eq!(p.export_csv().unwrap(), "");
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn reconnect_drains_each_entry_once() {
    let store = Arc::new(InMemoryStore::new());
    let transport = FakeTransport::new(Behavior::Succeed);
    let connectivity = Connectivity::new(false);
    let p = pipeline_with(store.clone(), PipelineSettings::default())
        .with_transport(transport.clone())
        .with_connectivity(connectivity.clone());

    let names = ["A1", "B2", "C3", "D4"];
    for name in names {
        p.submit(submission(name, "student")).await;
    }
    assert_eq!(p.pending().await.unwrap().len(), 4);

    connectivity.set_online(true);
    let report = p.on_reconnect().await;

    assert_eq!(report.attempted, 4);
    assert_eq!(report.delivered, 4);
    assert_eq!(report.requeued + report.dropped, 0);
    for name in names {
        assert_eq!(transport.calls_for(name), 1, "{name} attempted more than once");
    }
    assert!(p.pending().await.unwrap().is_empty());
    assert!(persisted_queue(store.as_ref()).is_empty());
}

#[tokio::test]
async fn reconciler_drains_when_link_comes_back() {
    let transport = FakeTransport::new(Behavior::Succeed);
    let connectivity = Connectivity::new(false);
    let p = Arc::new(
        pipeline_with(Arc::new(InMemoryStore::new()), PipelineSettings::default())
            .with_transport(transport.clone())
            .with_connectivity(connectivity.clone()),
    );

    p.submit(submission("An", "student")).await;
    p.submit(submission("Binh", "outsider")).await;

    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_reconciler(p.clone(), cancel.clone()));

    // Still offline: nothing is attempted
    tokio::task::yield_now().await;
    assert!(transport.calls().is_empty());

    connectivity.set_online(true);
    tokio::time::timeout(Duration::from_secs(5), async {
        while !p.pending().await.unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queue never drained");

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(transport.calls_for("An"), 1);
    assert_eq!(transport.calls_for("Binh"), 1);
}

#[tokio::test(start_paused = true)]
async fn overlapping_drains_send_each_entry_once() {
    let store = Arc::new(InMemoryStore::new());
    let transport = FakeTransport::new(Behavior::Hang(Duration::from_secs(1)));
    let connectivity = Connectivity::new(false);
    let p = pipeline_with(store.clone(), PipelineSettings::default())
        .with_transport(transport.clone())
        .with_connectivity(connectivity.clone());

    p.submit(submission("An", "student")).await;
    p.submit(submission("Binh", "outsider")).await;
    connectivity.set_online(true);

    // A third trigger lands while the first drain is still sending "An"
    let late = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let persisted_mid_drain = persisted_queue(store.as_ref()).len();
        (persisted_mid_drain, p.on_reconnect().await)
    };
    let (first, second, (persisted_mid_drain, third)) =
        tokio::join!(p.on_reconnect(), p.on_reconnect(), late);

    assert_eq!(persisted_mid_drain, 2, "in-flight entries must stay persisted");
    assert_eq!(first.attempted + second.attempted + third.attempted, 2);
    assert_eq!(first.delivered + second.delivered + third.delivered, 2);
    assert_eq!(transport.calls_for("An"), 1);
    assert_eq!(transport.calls_for("Binh"), 1);
    assert!(p.pending().await.unwrap().is_empty());
    assert!(persisted_queue(store.as_ref()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn abandoned_drain_still_completes() {
    let store = Arc::new(InMemoryStore::new());
    let transport = FakeTransport::new(Behavior::Hang(Duration::from_secs(60)));
    let connectivity = Connectivity::new(false);
    let p = pipeline_with(store.clone(), PipelineSettings::default())
        .with_transport(transport.clone())
        .with_connectivity(connectivity.clone());

    p.submit(submission("An", "student")).await;
    connectivity.set_online(true);

    // Caller gives up, as an HTTP client disconnecting from POST /queue/drain
    let abandoned = tokio::time::timeout(Duration::from_millis(500), p.on_reconnect()).await;
    assert!(abandoned.is_err());
    assert_eq!(persisted_queue(store.as_ref()).len(), 1);

    // Both attempts hit the 2 s deadline, then the drain requeues the entry
    tokio::time::sleep(Duration::from_secs(5)).await;
    let pending = p.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].attempts, 1);

    transport.set_behavior(Behavior::Succeed);
    let report = p.on_reconnect().await;
    assert_eq!((report.attempted, report.delivered), (1, 1));
    assert!(p.pending().await.unwrap().is_empty());
    assert!(persisted_queue(store.as_ref()).is_empty());
}

#[tokio::test]
async fn failed_entries_go_back_to_the_tail() {
    let transport = FakeTransport::new(Behavior::Fail);
    let p = pipeline_with(Arc::new(InMemoryStore::new()), PipelineSettings::default())
        .with_transport(transport.clone());
    for name in ["A1", "B2", "C3"] {
        p.submit(submission(name, "student")).await;
    }

    transport.set_behavior(Behavior::Succeed);
    transport.always_fail("A1");
    let report = p.on_reconnect().await;

    assert_eq!((report.delivered, report.requeued), (2, 1));
    let pending = p.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].submission.name(), "A1");
    assert_eq!(pending[0].attempts, 1);
}

#[tokio::test]
async fn entries_are_dropped_after_max_retries() {
    let settings = PipelineSettings {
        max_retries: 3,
        ..PipelineSettings::default()
    };
    let p = pipeline_with(Arc::new(InMemoryStore::new()), settings)
        .with_transport(FakeTransport::new(Behavior::Fail));
    p.submit(submission("An", "student")).await;

    assert_eq!(p.on_reconnect().await.requeued, 1);
    assert_eq!(p.on_reconnect().await.requeued, 1);
    let last = p.on_reconnect().await;
    assert_eq!(last.dropped, 1);
    assert!(p.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn submit_failure_during_drain_is_not_lost() {
    let store = Arc::new(InMemoryStore::new());
    let transport = FakeTransport::new(Behavior::Fail);
    let p = Arc::new(
        pipeline_with(store.clone(), PipelineSettings::default()).with_transport(transport.clone()),
    );
    p.submit(submission("A1", "student")).await;
    p.submit(submission("B2", "student")).await;

    // Queued entries now succeed slowly; the new one always fails
    transport.set_behavior(Behavior::Hang(Duration::from_millis(100)));
    transport.always_fail("C3");

    let drain = {
        let p = p.clone();
        tokio::spawn(async move { p.on_reconnect().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let result = p.submit(submission("C3", "student")).await;
    let report = drain.await.unwrap();

    assert!(result.queued_for_retry);
    assert_eq!(report.delivered, 2);
    let pending: Vec<_> = p
        .pending()
        .await
        .unwrap()
        .iter()
        .map(|e| e.submission.name().to_string())
        .collect();
    assert_eq!(pending, vec!["C3"]);
    assert_eq!(persisted_queue(store.as_ref()).len(), 1);
}

#[tokio::test]
async fn queue_survives_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("submissions.db");

    {
        let store = Arc::new(SledStore::open(&path).unwrap());
        let p = pipeline_with(store, PipelineSettings::default())
            .with_transport(FakeTransport::new(Behavior::Fail));
        p.submit(submission("An", "student")).await;
        p.submit(submission("Binh", "outsider")).await;
        assert_eq!(p.pending().await.unwrap().len(), 2);
    }

    let store = Arc::new(reopen(&path).await);
    let transport = FakeTransport::new(Behavior::Succeed);
    let p = pipeline_with(store, PipelineSettings::default()).with_transport(transport.clone());

    let stats = p.statistics().await.unwrap();
    assert_eq!(stats.total_submissions, 2);
    assert_eq!(stats.pending_submissions, 2);

    let report = p.on_reconnect().await;
    assert_eq!(report.delivered, 2);
    assert_eq!(transport.calls_for("Binh"), 1);
}
