use crate::integration::support::{harness, Consultation, ENTITY};
use std::collections::HashSet;
use vaultsync::error::ErrorKind;
use vaultsync::optimistic::OptimisticEngine;
use vaultsync::records::RecordQuery;
use vaultsync::store::RecordStore;

fn loaded(ids: &[&str]) -> OptimisticEngine<Consultation> {
    OptimisticEngine::new(RecordStore::with_records(
        ids.iter().map(|id| Consultation::new(id, "Untitled")).collect(),
    ))
}

#[tokio::test]
async fn one_failed_save_restores_every_record_in_the_batch() {
    let h = harness();
    let engine = loaded(&["c1", "c2", "c3", "c4"]);
    let gateway = h.gateway();
    let before = engine.store().snapshot();
    let mut changes = engine.store().subscribe();

    h.backend.fail_next(&format!("save{}", ENTITY), 1);
    let targets: HashSet<String> = ["c1", "c2", "c3"].iter().map(|s| s.to_string()).collect();
    let err = engine
        .apply_update(
            &targets,
            |record| Consultation {
                title: "Reviewed".to_string(),
                ..record.clone()
            },
            |record| {
                let gateway = gateway.clone();
                async move { gateway.save_record(&record).await }
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    assert_eq!(*engine.store().snapshot(), *before);
    // Subscribers saw the optimistic state and then the rollback.
    assert!(changes.has_changed().unwrap());
    assert_eq!(*changes.borrow_and_update().clone(), *before);
}

#[tokio::test]
async fn successful_batch_is_visible_locally_and_remotely() {
    let h = harness();
    let engine = loaded(&["c1", "c2"]);
    let gateway = h.gateway();

    let targets: HashSet<String> = ["c1", "c2"].iter().map(|s| s.to_string()).collect();
    engine
        .apply_update(
            &targets,
            |record| Consultation {
                title: "Reviewed".to_string(),
                ..record.clone()
            },
            |record| {
                let gateway = gateway.clone();
                async move { gateway.save_record(&record).await }
            },
        )
        .await
        .unwrap();

    assert!(engine
        .store()
        .snapshot()
        .iter()
        .all(|c| c.title == "Reviewed"));
    assert_eq!(h.backend.record(ENTITY, "c2").unwrap()["title"], "Reviewed");
}

#[tokio::test]
async fn failed_insert_removes_the_new_record_again() {
    let h = harness();
    let engine = loaded(&["c1"]);
    let gateway = h.gateway();
    let before = engine.store().snapshot();

    h.backend.fail_next(&format!("save{}", ENTITY), 1);
    let result = engine
        .apply_insert(Consultation::new("c9", "Walk-in"), |record| async move {
            gateway.save_record(&record).await
        })
        .await;

    assert!(result.is_err());
    assert_eq!(*engine.store().snapshot(), *before);
}

#[tokio::test]
async fn failed_delete_brings_the_records_back() {
    let h = harness();
    let engine = loaded(&["c1", "c2"]);
    let gateway = h.gateway();
    let before = engine.store().snapshot();

    // Neither record exists remotely, so both deletes are rejected.
    let targets: HashSet<String> = ["c1", "c2"].iter().map(|s| s.to_string()).collect();
    let result = engine
        .apply_delete(&targets, |id| {
            let gateway = gateway.clone();
            async move { gateway.delete_record(&id).await }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(*engine.store().snapshot(), *before);
}

#[tokio::test]
async fn loading_a_page_replaces_the_collection() {
    let h = harness();
    for id in ["c1", "c2", "c3"] {
        h.backend
            .seed_record(ENTITY, serde_json::to_value(Consultation::new(id, "Seeded")).unwrap());
    }
    let engine = loaded(&["stale"]);

    let page = h
        .gateway()
        .fetch_page(&RecordQuery {
            page: 1,
            page_size: 2,
            search: None,
        })
        .await
        .unwrap();
    assert!(page.has_more());
    engine.load_page(page.items);

    let ids: Vec<String> = engine.store().snapshot().iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec!["c1".to_string(), "c2".to_string()]);
}
