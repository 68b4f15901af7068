// src/ledger.rs
// Bounded, newest-first evidence ledger persisted to local storage.

use crate::hashscan::HashscanResolver;
use crate::notify::{LogNotifier, Notification, Notifier};
use crate::record::{EvidenceKind, EvidenceRecord, Metadata, NewEvidence};
use crate::storage::{EvidenceStorage, EVIDENCE_STORAGE_KEY};
use chrono::Utc;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Records kept when no bound is configured
pub const DEFAULT_LEDGER_BOUND: usize = 100;

/// Whether the persisted copy matches memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PersistenceStatus {
    InSync,
    /// Last write failed; memory is authoritative until the next good write
    Diverged { error: String },
}

impl PersistenceStatus {
    pub fn is_diverged(&self) -> bool {
        matches!(self, PersistenceStatus::Diverged { .. })
    }
}

/// One page of a larger list. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl<T: Clone> Page<T> {
    pub fn from_slice(all: &[T], page: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let page = page.max(1);
        let total = all.len();
        let total_pages = total.div_ceil(page_size);
        let start = (page - 1).saturating_mul(page_size).min(total);
        let end = start.saturating_add(page_size).min(total);

        Self {
            items: all[start..end].to_vec(),
            page,
            page_size,
            total,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// The evidence ledger itself. Not shared; see [`EvidenceStore`] for the
/// cloneable handle UI code passes around.
pub struct EvidenceLedger {
    /// Newest first
    records: Vec<EvidenceRecord>,
    bound: usize,
    storage: Arc<dyn EvidenceStorage>,
    notifier: Arc<dyn Notifier>,
    resolver: HashscanResolver,
    append_seq: u64,
    status: PersistenceStatus,
}

impl EvidenceLedger {
    /// Open the ledger, loading whatever `storage` holds. A missing or
    /// unreadable value starts an empty ledger.
    pub fn open(storage: Arc<dyn EvidenceStorage>, bound: usize) -> Self {
        let bound = bound.max(1);
        let mut records = load_records(storage.as_ref());
        if records.len() > bound {
            info!(
                "Loaded ledger holds {} records, truncating to bound {}",
                records.len(),
                bound
            );
            records.truncate(bound);
        }

        Self {
            records,
            bound,
            storage,
            notifier: Arc::new(LogNotifier),
            resolver: HashscanResolver::default(),
            append_seq: 0,
            status: PersistenceStatus::InSync,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_resolver(mut self, resolver: HashscanResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Append a record and announce it. Never fails; persistence problems
    /// only show up in [`EvidenceLedger::persistence_status`].
    pub fn add_evidence(
        &mut self,
        kind: impl Into<EvidenceKind>,
        evidence_id: impl Into<String>,
        label: impl Into<String>,
        metadata: Option<Metadata>,
        source: Option<&str>,
    ) -> EvidenceRecord {
        self.append(new_evidence(kind, evidence_id, label, metadata, source))
    }

    pub fn append(&mut self, new: NewEvidence) -> EvidenceRecord {
        let (record, notifications) = self.append_quiet(new);
        self.announce(notifications);
        record
    }

    /// Drop every record. Idempotent.
    pub fn clear_evidence(&mut self) {
        let notifications = self.clear_quiet();
        self.announce(notifications);
    }

    /// Mutate without notifying; the caller emits the returned
    /// notifications once it holds no lock on the ledger.
    fn append_quiet(&mut self, new: NewEvidence) -> (EvidenceRecord, Vec<Notification>) {
        self.append_seq += 1;
        let record = EvidenceRecord::build(new, &self.resolver, self.append_seq, Utc::now());

        self.records.insert(0, record.clone());
        if self.records.len() > self.bound {
            self.records.truncate(self.bound);
        }
        debug!(
            "Evidence appended: {} {} ({} records)",
            record.kind(),
            record.evidence_id(),
            self.records.len()
        );

        let warning = self.persist();
        let mut notifications = vec![Notification::evidence(&record)];
        notifications.extend(warning);
        (record, notifications)
    }

    fn clear_quiet(&mut self) -> Vec<Notification> {
        let dropped = self.records.len();
        self.records.clear();
        let warning = self.persist();
        info!("Evidence ledger cleared ({} records dropped)", dropped);
        let mut notifications = vec![Notification::success(
            "Evidence cleared",
            "All evidence records have been removed",
        )];
        notifications.extend(warning);
        notifications
    }

    fn announce(&self, notifications: Vec<Notification>) {
        emit(self.notifier.as_ref(), notifications);
    }

    pub fn evidence_by_kind(&self, kind: &EvidenceKind) -> Vec<EvidenceRecord> {
        self.records
            .iter()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn evidence_by_source(&self, source: &str) -> Vec<EvidenceRecord> {
        self.records
            .iter()
            .filter(|r| r.source() == source)
            .cloned()
            .collect()
    }

    pub fn records(&self) -> &[EvidenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&EvidenceRecord> {
        self.records.first()
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn page(&self, page: usize, page_size: usize) -> Page<EvidenceRecord> {
        Page::from_slice(&self.records, page, page_size)
    }

    /// Distinct sources in first-seen (newest first) order
    pub fn sources(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for record in &self.records {
            if !seen.iter().any(|s| s == record.source()) {
                seen.push(record.source().to_string());
            }
        }
        seen
    }

    pub fn persistence_status(&self) -> &PersistenceStatus {
        &self.status
    }

    pub fn resolver(&self) -> &HashscanResolver {
        &self.resolver
    }

    /// Write the ledger out. Returns a warning the first time memory and
    /// storage diverge.
    fn persist(&mut self) -> Option<Notification> {
        let result = serde_json::to_string(&self.records)
            .map_err(crate::error::SdkError::from)
            .and_then(|json| self.storage.write(EVIDENCE_STORAGE_KEY, &json));

        match result {
            Ok(()) => {
                if self.status.is_diverged() {
                    info!("Evidence ledger persisted again, storage back in sync");
                }
                self.status = PersistenceStatus::InSync;
                None
            }
            Err(e) => {
                warn!("Failed to persist evidence ledger: {}", e);
                let first = !self.status.is_diverged();
                self.status = PersistenceStatus::Diverged { error: e.to_string() };
                first.then(|| {
                    Notification::warning(
                        "Evidence not saved",
                        &format!("Kept in memory only: {}", e),
                    )
                })
            }
        }
    }
}

fn new_evidence(
    kind: impl Into<EvidenceKind>,
    evidence_id: impl Into<String>,
    label: impl Into<String>,
    metadata: Option<Metadata>,
    source: Option<&str>,
) -> NewEvidence {
    let new = NewEvidence::new(kind, evidence_id, label).metadata(metadata.unwrap_or_default());
    match source {
        Some(source) => new.source(source),
        None => new,
    }
}

fn load_records(storage: &dyn EvidenceStorage) -> Vec<EvidenceRecord> {
    let raw = match storage.read(EVIDENCE_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Failed to read persisted evidence, starting empty: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<EvidenceRecord>>(&raw) {
        Ok(records) => {
            info!("Loaded {} evidence records from storage", records.len());
            records
        }
        Err(e) => {
            warn!("Persisted evidence is corrupted, starting empty: {}", e);
            Vec::new()
        }
    }
}

/// Cloneable shared handle over one [`EvidenceLedger`].
///
/// Every mutation bumps a revision counter; consumers call
/// [`EvidenceStore::subscribe`] and re-render when it changes.
/// Notifications go out after the write lock is released, so a notifier
/// may read the store.
#[derive(Clone)]
pub struct EvidenceStore {
    inner: Arc<RwLock<EvidenceLedger>>,
    revision: Arc<watch::Sender<u64>>,
}

impl EvidenceStore {
    pub fn new(ledger: EvidenceLedger) -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(ledger)),
            revision: Arc::new(tx),
        }
    }

    pub fn open(storage: Arc<dyn EvidenceStorage>, bound: usize) -> Self {
        Self::new(EvidenceLedger::open(storage, bound))
    }

    pub fn add_evidence(
        &self,
        kind: impl Into<EvidenceKind>,
        evidence_id: impl Into<String>,
        label: impl Into<String>,
        metadata: Option<Metadata>,
        source: Option<&str>,
    ) -> EvidenceRecord {
        self.append(new_evidence(kind, evidence_id, label, metadata, source))
    }

    pub fn append(&self, new: NewEvidence) -> EvidenceRecord {
        let (record, notifier, notifications) = {
            let mut ledger = self.inner.write();
            let (record, notifications) = ledger.append_quiet(new);
            (record, ledger.notifier.clone(), notifications)
        };
        self.bump();
        emit(notifier.as_ref(), notifications);
        record
    }

    pub fn clear_evidence(&self) {
        let (notifier, notifications) = {
            let mut ledger = self.inner.write();
            let notifications = ledger.clear_quiet();
            (ledger.notifier.clone(), notifications)
        };
        self.bump();
        emit(notifier.as_ref(), notifications);
    }

    pub fn evidence_by_kind(&self, kind: &EvidenceKind) -> Vec<EvidenceRecord> {
        self.inner.read().evidence_by_kind(kind)
    }

    pub fn evidence_by_source(&self, source: &str) -> Vec<EvidenceRecord> {
        self.inner.read().evidence_by_source(source)
    }

    /// Snapshot of the ledger, newest first
    pub fn records(&self) -> Vec<EvidenceRecord> {
        self.inner.read().records().to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn latest(&self) -> Option<EvidenceRecord> {
        self.inner.read().latest().cloned()
    }

    pub fn bound(&self) -> usize {
        self.inner.read().bound()
    }

    pub fn page(&self, page: usize, page_size: usize) -> Page<EvidenceRecord> {
        self.inner.read().page(page, page_size)
    }

    pub fn sources(&self) -> Vec<String> {
        self.inner.read().sources()
    }

    pub fn persistence_status(&self) -> PersistenceStatus {
        self.inner.read().persistence_status().clone()
    }

    pub fn resolver(&self) -> HashscanResolver {
        self.inner.read().resolver().clone()
    }

    /// Current revision; increments on every mutation
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

fn emit(notifier: &dyn Notifier, notifications: Vec<Notification>) {
    for notification in notifications {
        notifier.notify(notification);
    }
}

static GLOBAL_STORE: Lazy<RwLock<Option<EvidenceStore>>> = Lazy::new(|| RwLock::new(None));

/// Install the process-wide store, returning the one it replaces
pub fn init_global_store(store: EvidenceStore) -> Option<EvidenceStore> {
    GLOBAL_STORE.write().replace(store)
}

/// The process-wide store, if one was installed
pub fn global_store() -> Option<EvidenceStore> {
    GLOBAL_STORE.read().clone()
}

/// Remove the process-wide store (app shutdown, between tests)
pub fn reset_global_store() {
    GLOBAL_STORE.write().take();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ChannelNotifier, NotificationLevel, NullNotifier};
    use crate::storage::MemoryStorage;

    fn ledger(bound: usize) -> EvidenceLedger {
        EvidenceLedger::open(Arc::new(MemoryStorage::new()), bound)
            .with_notifier(Arc::new(NullNotifier))
    }

    #[test]
    fn test_page_bounds() {
        let items: Vec<u32> = (0..7).collect();
        let first = Page::from_slice(&items, 1, 3);
        assert_eq!(first.items, vec![0, 1, 2]);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next());

        let last = Page::from_slice(&items, 3, 3);
        assert_eq!(last.items, vec![6]);
        assert!(!last.has_next());

        let past = Page::from_slice(&items, 9, 3);
        assert!(past.items.is_empty());
        assert_eq!(Page::from_slice(&items, 0, 0).items, vec![0]);
    }

    #[test]
    fn test_page_size_near_usize_max() {
        let items: Vec<u32> = (0..7).collect();
        let all = Page::from_slice(&items, 1, usize::MAX);
        assert_eq!(all.items, items);
        assert_eq!(all.total_pages, 1);
        assert!(!all.has_next());

        let second = Page::from_slice(&items, 2, usize::MAX);
        assert!(second.items.is_empty());
        assert_eq!(Page::from_slice(&items, usize::MAX, usize::MAX).total, 7);

        let empty: Vec<u32> = Vec::new();
        assert_eq!(Page::from_slice(&empty, 1, usize::MAX).total_pages, 0);
    }

    #[test]
    fn test_same_evidence_id_gets_distinct_ids() {
        let mut ledger = ledger(10);
        let a = ledger.add_evidence("file", "0.0.1", "first", None, None);
        let b = ledger.add_evidence("file", "0.0.1", "second", None, None);
        assert_ne!(a.id(), b.id());
        assert_eq!(ledger.latest().map(|r| r.id()), Some(b.id()));
    }

    #[test]
    fn test_sources_first_seen_order() {
        let mut ledger = ledger(10);
        ledger.add_evidence("file", "0.0.1", "a", None, Some("Proof Upload"));
        ledger.add_evidence("token", "0.0.2", "b", None, Some("ClaimsHelper"));
        ledger.add_evidence("file", "0.0.3", "c", None, Some("Proof Upload"));
        ledger.add_evidence("file", "0.0.4", "d", None, None);
        assert_eq!(
            ledger.sources(),
            vec!["GreenLoop", "Proof Upload", "ClaimsHelper"]
        );
    }

    #[test]
    fn test_store_revision_bumps() {
        let store = EvidenceStore::new(ledger(5));
        let rx = store.subscribe();
        store.add_evidence("token", "0.0.9", "Badge", None, None);
        store.clear_evidence();
        assert_eq!(store.revision(), 2);
        assert_eq!(*rx.borrow(), 2);
    }

    #[test]
    fn test_divergence_warns_once() {
        let storage = Arc::new(MemoryStorage::new());
        let (notifier, mut rx) = ChannelNotifier::new();
        let mut ledger =
            EvidenceLedger::open(storage.clone(), 10).with_notifier(Arc::new(notifier));

        storage.set_fail_writes(true);
        ledger.add_evidence("file", "0.0.1", "a", None, None);
        assert_eq!(rx.try_recv().unwrap().level, NotificationLevel::Evidence);
        let warning = rx.try_recv().unwrap();
        assert_eq!(warning.level, NotificationLevel::Warning);
        assert!(warning.description.contains("memory"));

        ledger.add_evidence("file", "0.0.2", "b", None, None);
        assert_eq!(rx.try_recv().unwrap().level, NotificationLevel::Evidence);
        assert!(rx.try_recv().is_err());

        storage.set_fail_writes(false);
        ledger.clear_evidence();
        assert_eq!(rx.try_recv().unwrap().level, NotificationLevel::Success);
        assert!(rx.try_recv().is_err());
        assert!(!ledger.persistence_status().is_diverged());
    }
}
