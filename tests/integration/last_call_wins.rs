use crate::integration::support::{harness, Consultation, ENTITY};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use vaultsync::error::{ApiError, ErrorKind};
use vaultsync::executor::{CancellableExecutor, Settlement};
use vaultsync::records::{Record, RecordQuery};

type Committed = Arc<Mutex<Vec<Vec<String>>>>;

fn seed(h: &crate::integration::support::Harness) {
    for (id, title) in [("c1", "Anxiety follow-up"), ("c2", "Back pain"), ("c3", "Anxiety intake")] {
        h.backend
            .seed_record(ENTITY, serde_json::to_value(Consultation::new(id, title)).unwrap());
    }
}

#[tokio::test(start_paused = true)]
async fn slower_earlier_search_never_overwrites_a_later_one() {
    let h = harness();
    seed(&h);
    let gateway = h.gateway();
    let executor = CancellableExecutor::new(Duration::from_secs(30));
    let committed: Committed = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::<ApiError>::new()));

    let search = |term: &'static str| {
        let gateway = gateway.clone();
        let committed = committed.clone();
        let errors = errors.clone();
        executor.run(
            move |_token| async move { gateway.fetch_page(&RecordQuery::search(term)).await },
            move |page| {
                committed
                    .lock()
                    .push(page.items.iter().map(|c| c.id().to_string()).collect())
            },
            move |err| errors.lock().push(err),
        )
    };

    // The first listing is slow, the second answers immediately.
    h.backend.delay_next("getConsultations", Duration::from_millis(800));
    let first = search("anxiety");
    let second = search("back");

    assert_eq!(second.settled().await, Settlement::Succeeded);
    assert_eq!(first.settled().await, Settlement::Superseded);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(*committed.lock(), vec![vec!["c2".to_string()]]);
    assert!(errors.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn result_finishing_after_a_newer_call_started_is_dropped() {
    let executor = CancellableExecutor::new(Duration::from_secs(30));
    let committed = Arc::new(Mutex::new(Vec::new()));
    let (release_first, first_rx) = oneshot::channel::<&'static str>();

    let record = |label: &'static str| {
        let committed = committed.clone();
        move |value: &'static str| committed.lock().push(format!("{}:{}", label, value))
    };

    // The first task ignores its token and resolves after the second call starts.
    let first = executor.run(
        move |_token| async move { first_rx.await.map_err(|_| ApiError::Superseded) },
        record("first"),
        |_| {},
    );
    let second = executor.run(
        |_token| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("fresh")
        },
        record("second"),
        |_| {},
    );
    let _ = release_first.send("stale");

    assert_eq!(first.settled().await, Settlement::Superseded);
    assert_eq!(second.settled().await, Settlement::Succeeded);
    assert_eq!(*committed.lock(), vec!["second:fresh".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn deadline_fires_once_and_late_resolution_is_ignored() {
    let executor = CancellableExecutor::new(Duration::from_secs(60));
    let errors = Arc::new(Mutex::new(Vec::<ErrorKind>::new()));
    let successes = Arc::new(Mutex::new(0u32));
    let (late, never) = oneshot::channel::<u32>();

    let handle = {
        let errors = errors.clone();
        let successes = successes.clone();
        executor.execute(
            move |_token| async move { never.await.map_err(|_| ApiError::Superseded) },
            move |_| *successes.lock() += 1,
            move |err| errors.lock().push(err.kind()),
            Duration::from_millis(30_000),
        )
    };

    assert_eq!(handle.settled().await, Settlement::TimedOut);
    assert_eq!(*errors.lock(), vec![ErrorKind::Timeout]);

    // The task was dropped with its receiver; resolving it now goes nowhere.
    assert!(late.send(7).is_err());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(errors.lock().len(), 1);
    assert_eq!(*successes.lock(), 0);
}

#[tokio::test(start_paused = true)]
async fn closing_the_view_drops_the_pending_listing() {
    let h = harness();
    seed(&h);
    let gateway = h.gateway();
    let executor = CancellableExecutor::new(Duration::from_secs(30));
    let committed = Arc::new(Mutex::new(0usize));

    h.backend.delay_next("getConsultations", Duration::from_millis(500));
    let handle = {
        let committed = committed.clone();
        executor.run(
            move |_token| async move { gateway.fetch_page(&RecordQuery::default()).await },
            move |_| *committed.lock() += 1,
            |_| {},
        )
    };
    executor.cancel();

    assert!(handle.is_cancelled());
    assert_eq!(handle.settled().await, Settlement::Superseded);
    assert_eq!(*committed.lock(), 0);
}
