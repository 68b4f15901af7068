// tests/ledger.rs
use greenloop_sdk::ledger::{EvidenceLedger, EvidenceStore, PersistenceStatus};
use greenloop_sdk::notify::{ChannelNotifier, Notification, NotificationLevel, Notifier};
use greenloop_sdk::record::{EvidenceKind, Metadata};
use greenloop_sdk::storage::{EvidenceStorage, FileStorage, MemoryStorage, EVIDENCE_STORAGE_KEY};
use greenloop_sdk::{global_store, init_global_store, reset_global_store};
use parking_lot::Mutex;
use std::sync::{mpsc, Arc};
use std::time::Duration;

fn memory_store(bound: usize) -> (EvidenceStore, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (EvidenceStore::open(storage.clone(), bound), storage)
}

#[test]
fn ledger_is_newest_first_and_bounded() {
    let (store, _) = memory_store(5);
    for i in 0..8 {
        store.add_evidence("file", format!("0.0.{}", i), format!("doc {}", i), None, None);
        assert_eq!(store.len(), (i + 1).min(5));
    }

    let ids: Vec<String> = store.records().iter().map(|r| r.evidence_id().to_string()).collect();
    assert_eq!(ids, vec!["0.0.7", "0.0.6", "0.0.5", "0.0.4", "0.0.3"]);
}

#[test]
fn hundred_and_one_appends_drop_the_oldest() {
    let (store, _) = memory_store(100);
    for i in 0..101 {
        store.add_evidence("transaction", format!("0xtx{}", i), "tx", None, None);
    }
    assert_eq!(store.len(), 100);
    assert!(store.records().iter().all(|r| r.evidence_id() != "0xtx0"));
    assert_eq!(store.latest().unwrap().evidence_id(), "0xtx100");
}

#[test]
fn clear_always_empties() {
    let (store, storage) = memory_store(10);
    store.clear_evidence();
    assert!(store.is_empty());

    store.add_evidence("token", "0.0.1", "a", None, None);
    store.add_evidence("token", "0.0.2", "b", None, None);
    store.clear_evidence();
    store.clear_evidence();
    assert!(store.is_empty());
    assert_eq!(storage.raw(EVIDENCE_STORAGE_KEY).as_deref(), Some("[]"));
}

#[test]
fn filters_preserve_order_and_do_not_mutate() {
    let (store, _) = memory_store(10);
    store.add_evidence("file", "0.0.10", "first file", None, Some("Proof Upload"));
    store.add_evidence("token", "0.0.20", "badge", None, Some("ClaimsHelper"));
    store.add_evidence("file", "0.0.11", "second file", None, Some("Proof Upload"));
    let before = store.records();
    let revision = store.revision();

    let files = store.evidence_by_kind(&EvidenceKind::File);
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|r| r.kind() == &EvidenceKind::File));
    assert_eq!(files[0].evidence_id(), "0.0.11");
    assert_eq!(files[1].evidence_id(), "0.0.10");

    assert!(store.evidence_by_kind(&EvidenceKind::TopicMessage).is_empty());
    assert_eq!(store.records(), before);
    assert_eq!(store.revision(), revision);
}

#[test]
fn claims_helper_token_scenario() {
    let (store, _) = memory_store(100);
    store.add_evidence("file", "0.0.700567", "Soil report", None, Some("Proof Upload"));
    store.add_evidence("token", "0.0.600222#1", "Badge", None, Some("ClaimsHelper"));

    let claims = store.evidence_by_source("ClaimsHelper");
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].evidence_id(), "0.0.600222#1");
    assert_eq!(claims[0].label(), "Badge");
}

#[test]
fn file_record_links_to_explorer() {
    let (store, _) = memory_store(10);
    let record = store.add_evidence("file", "0.0.700567", "Upload", None, None);
    assert!(record.hashscan_url().ends_with("/file/0.0.700567"));
    assert_eq!(record.source(), "GreenLoop");
}

#[test]
fn unknown_kind_is_accepted() {
    let (store, _) = memory_store(10);
    let record = store.add_evidence("contract", "0.0.5", "Deployed", None, None);
    assert_eq!(record.kind(), &EvidenceKind::Unknown("contract".to_string()));
    assert_eq!(record.hashscan_url(), "https://hashscan.io/testnet");
}

#[test]
fn rapid_appends_are_not_lost() {
    let (store, _) = memory_store(100);
    let a = store.clone();
    let b = store.clone();
    let ra = a.add_evidence("file", "0.0.1", "same", None, None);
    let rb = b.add_evidence("file", "0.0.1", "same", None, None);

    assert_eq!(store.len(), 2);
    assert_ne!(ra.id(), rb.id());
}

#[test]
fn concurrent_appends_from_threads_all_land() {
    let (store, _) = memory_store(1000);
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    store.add_evidence("transaction", format!("0x{}-{}", t, i), "tx", None, None);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(store.len(), 100);
}

#[test]
fn corrupted_storage_loads_empty() {
    let storage = Arc::new(MemoryStorage::with_value(EVIDENCE_STORAGE_KEY, "{not json"));
    let store = EvidenceStore::open(storage, 100);
    assert!(store.is_empty());
    assert_eq!(store.persistence_status(), PersistenceStatus::InSync);
}

#[test]
fn reload_restores_records_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()));

    let mut metadata = Metadata::new();
    metadata.insert("lotId".to_string(), serde_json::json!("LOT-9"));
    {
        let store = EvidenceStore::open(storage.clone(), 100);
        store.add_evidence(
            "topic-message",
            "0.0.4242",
            "NDVI reading",
            Some(metadata),
            Some("Proof Upload"),
        );
        store.add_evidence("file", "0.0.700567", "Photo", None, Some("Proof Upload"));
    }

    let reloaded = EvidenceStore::open(storage.clone(), 100);
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.latest().unwrap().evidence_id(), "0.0.700567");
    let message = &reloaded.evidence_by_kind(&EvidenceKind::TopicMessage)[0];
    assert_eq!(message.metadata()["lotId"], "LOT-9");

    // Reopening with a smaller bound keeps only the newest
    let smaller = EvidenceStore::open(storage, 1);
    assert_eq!(smaller.len(), 1);
    assert_eq!(smaller.latest().unwrap().evidence_id(), "0.0.700567");
}

#[test]
fn persistence_failure_keeps_memory_and_reports_divergence() {
    let (store, storage) = memory_store(10);
    store.add_evidence("file", "0.0.1", "saved", None, None);
    let persisted = storage.raw(EVIDENCE_STORAGE_KEY);

    storage.set_fail_writes(true);
    let record = store.add_evidence("file", "0.0.2", "not saved", None, None);
    assert_eq!(store.len(), 2);
    assert_eq!(store.latest().unwrap().id(), record.id());
    assert!(store.persistence_status().is_diverged());
    assert_eq!(storage.raw(EVIDENCE_STORAGE_KEY), persisted);

    storage.set_fail_writes(false);
    store.add_evidence("file", "0.0.3", "saved again", None, None);
    assert_eq!(store.persistence_status(), PersistenceStatus::InSync);
    let written = storage.read(EVIDENCE_STORAGE_KEY).unwrap().unwrap();
    assert!(written.contains("0.0.2"));
}

#[test]
fn mutations_emit_notifications() {
    let (notifier, mut rx) = ChannelNotifier::new();
    let ledger =
        EvidenceLedger::open(Arc::new(MemoryStorage::new()), 10).with_notifier(Arc::new(notifier));
    let store = EvidenceStore::new(ledger);

    store.add_evidence("file", "0.0.700567", "Soil report", None, None);
    let toast = rx.try_recv().unwrap();
    assert_eq!(toast.level, NotificationLevel::Evidence);
    assert_eq!(toast.description, "Soil report");
    assert!(toast.link.unwrap().ends_with("/file/0.0.700567"));
    assert_eq!(toast.copy_value.as_deref(), Some("0.0.700567"));

    store.clear_evidence();
    assert_eq!(rx.try_recv().unwrap().level, NotificationLevel::Success);
}

/// Reads the store back from inside `notify`, as a toast renderer does
#[derive(Default)]
struct ReadingNotifier {
    store: Mutex<Option<EvidenceStore>>,
    seen_len: Mutex<Vec<usize>>,
}

impl Notifier for ReadingNotifier {
    fn notify(&self, _notification: Notification) {
        let store = self.store.lock().clone();
        if let Some(store) = store {
            self.seen_len.lock().push(store.len());
        }
    }
}

#[test]
fn notifier_may_read_the_store() {
    let notifier = Arc::new(ReadingNotifier::default());
    let ledger = EvidenceLedger::open(Arc::new(MemoryStorage::new()), 10)
        .with_notifier(notifier.clone());
    let store = EvidenceStore::new(ledger);
    *notifier.store.lock() = Some(store.clone());

    let (done_tx, done_rx) = mpsc::channel();
    let worker = std::thread::spawn(move || {
        store.add_evidence("file", "0.0.700567", "Soil report", None, None);
        store.add_evidence("token", "0.0.600222", "Badge", None, None);
        store.clear_evidence();
        let _ = done_tx.send(());
    });

    done_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("store mutation blocked inside notify");
    worker.join().unwrap();
    assert_eq!(*notifier.seen_len.lock(), vec![1, 2, 0]);
    notifier.store.lock().take();
}

#[test]
fn pagination_over_ledger() {
    let (store, _) = memory_store(100);
    for i in 0..12 {
        store.add_evidence("transaction", format!("0x{}", i), "tx", None, None);
    }
    let page = store.page(2, 5);
    assert_eq!(page.total, 12);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items[0].evidence_id(), "0x6");
}

#[test]
fn global_store_lifecycle() {
    reset_global_store();
    assert!(global_store().is_none());

    let (store, _) = memory_store(10);
    assert!(init_global_store(store.clone()).is_none());
    global_store().unwrap().add_evidence("token", "0.0.1", "Badge", None, None);
    assert_eq!(store.len(), 1);

    reset_global_store();
    assert!(global_store().is_none());
}
