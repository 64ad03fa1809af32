use crate::integration::support::{harness, Consultation, ConsultationNotes, PRIMARY, SHARD};
use parking_lot::RwLock;
use serde_json::Value;
use vaultsync::attachment::{AttachmentList, AttachmentRef, UploadFile};
use vaultsync::optimistic::OptimisticEngine;
use vaultsync::records::Record;
use vaultsync::store::RecordStore;

fn pdf(name: &str) -> UploadFile {
    UploadFile::new(name, "application/pdf", b"%PDF-1.7".to_vec())
}

#[tokio::test]
async fn deletes_follow_each_attachment_to_its_own_node() {
    let h = harness();
    let manager = h.attachments();
    let list = RwLock::new(AttachmentList::new());

    let early = manager.attach(&list, pdf("early.pdf"), "Early").await.unwrap();

    // The primary fills up; the backend starts placing new files on the shard.
    h.backend.set_node_capacity(Some(0));
    let engine = OptimisticEngine::new(RecordStore::with_records(vec![Consultation::new(
        "c1", "Intake",
    )]));
    h.sync()
        .commit(&engine, "c1", &serde_json::json!({"notes": ""}))
        .await
        .unwrap();
    let late = manager.attach(&list, pdf("late.pdf"), "Late").await.unwrap();

    assert_eq!(early.node_url.as_deref(), Some(PRIMARY));
    assert_eq!(late.node_url.as_deref(), Some(SHARD));

    assert!(manager.detach(&list, &early.file_id).await);
    assert!(manager.detach(&list, &late.file_id).await);

    let deletes = h.backend.requests_for("deleteRemoteFiles");
    assert_eq!(deletes.len(), 2);
    assert_eq!(deletes[0].node, PRIMARY);
    assert_eq!(deletes[1].node, SHARD);
    assert!(!h.backend.has_file(PRIMARY, &early.file_id));
    assert!(!h.backend.has_file(SHARD, &late.file_id));
    assert!(list.read().is_empty());
}

#[tokio::test]
async fn attachment_without_node_is_dropped_locally_without_a_request() {
    let h = harness();
    let legacy = AttachmentRef {
        file_id: "file-legacy".to_string(),
        node_url: None,
        mime_type: "image/png".to_string(),
        label: "Old scan".to_string(),
        preview_url: None,
    };
    let list = RwLock::new(AttachmentList::from_refs(vec![legacy]));

    assert!(!h.attachments().detach(&list, "file-legacy").await);
    assert!(list.read().is_empty());
    assert!(h.backend.requests_for("deleteRemoteFiles").is_empty());
}

#[tokio::test]
async fn pending_placeholders_never_reach_the_content_payload() {
    let h = harness();
    let engine = OptimisticEngine::new(RecordStore::with_records(vec![Consultation::new(
        "c1", "Intake",
    )]));
    let manager = h.attachments();
    let list = RwLock::new(AttachmentList::new());
    let kept = manager.attach(&list, pdf("referral.pdf"), "Referral").await.unwrap();
    list.write()
        .insert_pending("uploading.png", "image/png", Some("file:///tmp/uploading.png".to_string()));

    let blob = ConsultationNotes {
        notes: "see referral".to_string(),
        attachments: list.read().clone(),
    };
    let content_ref = h.sync().commit(&engine, "c1", &blob).await.unwrap();

    let write = h
        .backend
        .requests_for("saveConsultation")
        .into_iter()
        .find(|r| r.payload.get("content").is_some())
        .unwrap();
    let sent: Value = serde_json::from_str(write.payload["content"].as_str().unwrap()).unwrap();
    let attachments = sent["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0]["fileId"], Value::String(kept.file_id.clone()));
    assert!(!write.payload["content"].as_str().unwrap().contains("uploading"));

    let back: Option<ConsultationNotes> = h.locator().read_content(&content_ref).await.unwrap();
    let back = back.unwrap();
    assert_eq!(back.attachments.pending_count(), 0);
    assert_eq!(back.attachments.committed().collect::<Vec<_>>(), vec![&kept]);
}

#[tokio::test]
async fn committed_blob_round_trips_unchanged() {
    let h = harness();
    let engine = OptimisticEngine::new(RecordStore::with_records(vec![Consultation::new(
        "c1", "Intake",
    )]));
    let manager = h.attachments();
    let list = RwLock::new(AttachmentList::new());
    manager.attach(&list, pdf("a.pdf"), "A").await.unwrap();
    manager.attach(&list, pdf("b.pdf"), "B").await.unwrap();

    let blob = ConsultationNotes {
        notes: "two files".to_string(),
        attachments: list.into_inner(),
    };
    h.sync().commit(&engine, "c1", &blob).await.unwrap();

    let back: Option<ConsultationNotes> = h.sync().load(&engine, "c1").await.unwrap();
    assert_eq!(back, Some(blob));
    assert!(!engine.store().get("c1").unwrap().content_ref().is_unassigned());
}

#[tokio::test]
async fn purging_a_consultation_reclaims_files_on_every_node() {
    let h = harness();
    let manager = h.attachments();
    let refs = vec![
        AttachmentRef {
            file_id: "p1".to_string(),
            node_url: Some(PRIMARY.to_string()),
            mime_type: "application/pdf".to_string(),
            label: "p1".to_string(),
            preview_url: None,
        },
        AttachmentRef {
            file_id: "s1".to_string(),
            node_url: Some(SHARD.to_string()),
            mime_type: "application/pdf".to_string(),
            label: "s1".to_string(),
            preview_url: None,
        },
    ];

    let report = manager.purge(&refs).await;

    assert_eq!(report.reclaimed.len(), 2);
    let mut nodes: Vec<String> = h
        .backend
        .requests_for("deleteRemoteFiles")
        .into_iter()
        .map(|r| r.node)
        .collect();
    nodes.sort();
    assert_eq!(nodes, vec![PRIMARY.to_string(), SHARD.to_string()]);
}
