// Surfacing of ledger state: transient toasts and the inspector panel.
// Neither owns records; both read snapshots from the store.

use crate::error::{Result, SdkError};
use crate::ledger::{EvidenceStore, Page};
use crate::record::{EvidenceKind, EvidenceRecord};
use log::{info, warn};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// How long a toast stays up unless dismissed
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(6);

/// Where "copy id" puts text
pub trait Clipboard: Send + Sync {
    fn set_text(&self, text: &str) -> Result<()>;
}

/// Clipboard that keeps the last copied value, for terminals and tests
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        *self.contents.lock() = Some(text.to_string());
        Ok(())
    }
}

/// Clipboard that always fails, e.g. no display attached
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableClipboard;

impl Clipboard for UnavailableClipboard {
    fn set_text(&self, _text: &str) -> Result<()> {
        Err(SdkError::Clipboard("clipboard not available".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub id: u64,
    pub record: EvidenceRecord,
    pub created_at: Instant,
    pub duration: Duration,
}

impl Toast {
    pub fn title(&self) -> String {
        format!("{} {}", self.record.kind().icon(), self.record.kind().microcopy())
    }

    pub fn expires_at(&self) -> Instant {
        self.created_at + self.duration
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

/// Toasts for newly appended evidence
#[derive(Debug)]
pub struct ToastCenter {
    duration: Duration,
    last_seen_id: Option<String>,
    toasts: Vec<Toast>,
    next_id: u64,
}

impl Default for ToastCenter {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_DURATION)
    }
}

impl ToastCenter {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last_seen_id: None,
            toasts: Vec::new(),
            next_id: 0,
        }
    }

    /// Mark the current newest record as seen without showing it, so
    /// records loaded from storage do not pop up at startup.
    pub fn prime(&mut self, records: &[EvidenceRecord]) {
        self.last_seen_id = records.first().map(|r| r.id().to_string());
    }

    /// React to a store snapshot. Shows a toast only when the newest
    /// record differs from the last one seen; returns its toast id.
    pub fn observe(&mut self, records: &[EvidenceRecord]) -> Option<u64> {
        let newest = records.first()?;
        if self.last_seen_id.as_deref() == Some(newest.id()) {
            return None;
        }
        self.last_seen_id = Some(newest.id().to_string());

        self.next_id += 1;
        self.toasts.push(Toast {
            id: self.next_id,
            record: newest.clone(),
            created_at: Instant::now(),
            duration: self.duration,
        });
        Some(self.next_id)
    }

    /// Visible toasts, oldest first
    pub fn active(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn get(&self, toast_id: u64) -> Option<&Toast> {
        self.toasts.iter().find(|t| t.id == toast_id)
    }

    /// Close one toast. False if it was already gone.
    pub fn dismiss(&mut self, toast_id: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != toast_id);
        self.toasts.len() != before
    }

    /// Drop toasts whose time is up; returns how many went
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.toasts.len();
        self.toasts.retain(|t| !t.is_expired(now));
        before - self.toasts.len()
    }

    /// Explorer URL behind a toast's "open explorer" action
    pub fn open_explorer(&self, toast_id: u64) -> Option<String> {
        self.get(toast_id).map(|t| t.record.hashscan_url().to_string())
    }

    /// "Copy id" action. Clipboard failures are logged and reported as
    /// `false`, never raised.
    pub fn copy_id(&self, toast_id: u64, clipboard: &dyn Clipboard) -> bool {
        let Some(toast) = self.get(toast_id) else {
            return false;
        };
        match clipboard.set_text(toast.record.evidence_id()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to copy evidence id {}: {}", toast.record.evidence_id(), e);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Collapsed,
    Expanded,
}

/// Collapsible evidence inspector with search and filters.
///
/// Search, kind filter and source filter combine with AND.
#[derive(Debug, Clone)]
pub struct Inspector {
    state: PanelState,
    search: String,
    kind_filter: Option<EvidenceKind>,
    source_filter: Option<String>,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self {
            state: PanelState::Collapsed,
            search: String::new(),
            kind_filter: None,
            source_filter: None,
        }
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn is_expanded(&self) -> bool {
        self.state == PanelState::Expanded
    }

    pub fn toggle(&mut self) -> PanelState {
        self.state = match self.state {
            PanelState::Collapsed => PanelState::Expanded,
            PanelState::Expanded => PanelState::Collapsed,
        };
        self.state
    }

    pub fn expand(&mut self) {
        self.state = PanelState::Expanded;
    }

    pub fn collapse(&mut self) {
        self.state = PanelState::Collapsed;
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    pub fn kind_filter(&self) -> Option<&EvidenceKind> {
        self.kind_filter.as_ref()
    }

    pub fn set_kind_filter(&mut self, kind: Option<EvidenceKind>) {
        self.kind_filter = kind;
    }

    pub fn source_filter(&self) -> Option<&str> {
        self.source_filter.as_deref()
    }

    pub fn set_source_filter(&mut self, source: Option<String>) {
        self.source_filter = source;
    }

    pub fn clear_filters(&mut self) {
        self.search.clear();
        self.kind_filter = None;
        self.source_filter = None;
    }

    pub fn matches(&self, record: &EvidenceRecord) -> bool {
        let query = self.search.trim().to_lowercase();
        let search_ok = query.is_empty()
            || record.label().to_lowercase().contains(&query)
            || record.evidence_id().to_lowercase().contains(&query)
            || record.id().to_lowercase().contains(&query);

        let kind_ok = self.kind_filter.as_ref().map_or(true, |k| record.kind() == k);
        let source_ok = self
            .source_filter
            .as_deref()
            .map_or(true, |s| record.source() == s);

        search_ok && kind_ok && source_ok
    }

    /// Records passing every filter, in ledger order
    pub fn visible(&self, records: &[EvidenceRecord]) -> Vec<EvidenceRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    pub fn page(
        &self,
        records: &[EvidenceRecord],
        page: usize,
        page_size: usize,
    ) -> Page<EvidenceRecord> {
        Page::from_slice(&self.visible(records), page, page_size)
    }

    /// "Clear all" is offered whenever there is anything to clear
    pub fn can_clear(&self, records: &[EvidenceRecord]) -> bool {
        !records.is_empty()
    }

    /// Clear the whole ledger if it is non-empty; filters do not narrow it
    pub fn clear(&self, store: &EvidenceStore) -> bool {
        if store.is_empty() {
            return false;
        }
        info!("Inspector clearing {} evidence records", store.len());
        store.clear_evidence();
        true
    }
}
