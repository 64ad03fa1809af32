use crate::integration::support::{harness, Consultation, ConsultationNotes, ENTITY, PRIMARY, SHARD};
use serde_json::{json, Value};
use std::collections::HashSet;
use vaultsync::attachment::AttachmentList;
use vaultsync::error::{ApiError, ErrorKind};
use vaultsync::optimistic::OptimisticEngine;
use vaultsync::records::Record;
use vaultsync::store::RecordStore;

fn notes(text: &str) -> ConsultationNotes {
    ConsultationNotes {
        notes: text.to_string(),
        attachments: AttachmentList::new(),
    }
}

#[tokio::test]
async fn first_write_assigns_a_ref_that_reads_back_the_same_blob() {
    let h = harness();
    let record = Consultation::new("c1", "Intake");
    assert!(record.content_ref().is_unassigned());

    let write = h
        .locator()
        .write_content(ENTITY, &record, &notes("first visit"))
        .await
        .unwrap();

    assert!(!write.new_ref.content_id.is_empty());
    assert_ne!(&write.new_ref, record.content_ref());
    assert!(write.relocated);
    let back: Option<ConsultationNotes> = h.locator().read_content(&write.new_ref).await.unwrap();
    assert_eq!(back, Some(notes("first visit")));
}

#[tokio::test]
async fn migrated_blob_is_read_from_its_new_node() {
    let h = harness();
    let engine = OptimisticEngine::new(RecordStore::with_records(vec![Consultation::new(
        "c1", "Intake",
    )]));
    let sync = h.sync();

    let original = sync.commit(&engine, "c1", &notes("v1")).await.unwrap();
    assert_eq!(original.node_url.as_deref(), Some(PRIMARY));

    h.backend.migrate_next_write();
    let moved = sync.commit(&engine, "c1", &notes("v2")).await.unwrap();

    assert_eq!(moved.node_url.as_deref(), Some(SHARD));
    assert_ne!(moved.content_id, original.content_id);
    assert!(!h.backend.has_file(PRIMARY, &original.content_id));

    // Local and remote records both follow the move.
    assert_eq!(engine.store().get("c1").unwrap().content_ref(), &moved);
    let saved = h.backend.record(ENTITY, "c1").unwrap();
    assert_eq!(saved["vaultId"], Value::String(moved.content_id.clone()));
    assert_eq!(saved["nodeUrl"], SHARD);

    let back: Option<ConsultationNotes> = sync.load(&engine, "c1").await.unwrap();
    assert_eq!(back, Some(notes("v2")));
    let last_read = h.backend.requests_for("getFileContent").pop().unwrap();
    assert_eq!(last_read.node, SHARD);
}

#[tokio::test]
async fn stale_ref_after_migration_does_not_read_as_empty() {
    let h = harness();
    let engine = OptimisticEngine::new(RecordStore::with_records(vec![Consultation::new(
        "c1", "Intake",
    )]));
    let sync = h.sync();
    let stale = sync.commit(&engine, "c1", &notes("v1")).await.unwrap();
    h.backend.migrate_next_write();
    sync.commit(&engine, "c1", &notes("v2")).await.unwrap();

    let result: Result<Option<ConsultationNotes>, _> = h.locator().read_content(&stale).await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::NetworkFailure);
}

#[tokio::test]
async fn unsaved_pointer_surfaces_partial_failure_and_can_be_retried() {
    let h = harness();
    let engine = OptimisticEngine::new(RecordStore::with_records(vec![Consultation::new(
        "c1", "Intake",
    )]));
    let sync = h.sync();
    let record = engine.store().get("c1").unwrap();

    // Content lands; both pointer save attempts are rejected.
    let write = h
        .locator()
        .write_content(ENTITY, &record, &notes("v1"))
        .await
        .unwrap();
    h.backend.fail_next(&format!("save{}", ENTITY), 2);
    let err = sync
        .retry_ref(&engine, "c1", write.new_ref.clone())
        .await
        .unwrap_err();

    let new_ref = match err {
        ApiError::PartialFailure { new_ref, .. } => new_ref,
        other => panic!("expected PartialFailure, got {:?}", other),
    };
    assert_eq!(new_ref, write.new_ref);
    assert!(engine.store().get("c1").unwrap().content_ref().is_unassigned());

    let saved = sync.retry_ref(&engine, "c1", new_ref.clone()).await.unwrap();
    assert_eq!(engine.store().get("c1").unwrap().content_ref(), &saved);
    assert_eq!(h.backend.record(ENTITY, "c1").unwrap()["vaultId"], json!(saved.content_id));
}

#[tokio::test]
async fn deleting_a_record_removes_it_and_its_blob() {
    let h = harness();
    let engine = OptimisticEngine::new(RecordStore::with_records(vec![Consultation::new(
        "c1", "Intake",
    )]));
    let content = h.sync().commit(&engine, "c1", &notes("v1")).await.unwrap();
    let gateway = h.gateway();

    let targets = HashSet::from(["c1".to_string()]);
    engine
        .apply_delete(&targets, |id| {
            let gateway = gateway.clone();
            async move { gateway.delete_record(&id).await }
        })
        .await
        .unwrap();

    assert!(engine.store().is_empty());
    assert!(h.backend.record(ENTITY, "c1").is_none());
    assert!(!h.backend.has_file(PRIMARY, &content.content_id));
}
