pub mod config;
pub mod error;
pub mod feed;
pub mod hashscan;
pub mod ledger;
pub mod mock_chain;
pub mod notify;
pub mod record;
pub mod storage;
pub mod surface;

pub use config::GreenloopConfig;
pub use error::{Result, SdkError};
pub use feed::{
    FeedSource, FetchOutcome, HttpFeedSource, LiveFeed, LiveFeedEntry, LiveFeedPoller, PollerHandle,
};
pub use hashscan::{resolve_url, HashscanNetwork, HashscanResolver};
pub use ledger::{
    global_store, init_global_store, reset_global_store, EvidenceLedger, EvidenceStore, Page,
    PersistenceStatus, DEFAULT_LEDGER_BOUND,
};
pub use mock_chain::MockLedgerService;
pub use notify::{
    ChannelNotifier, LogNotifier, Notification, NotificationLevel, Notifier, NullNotifier,
};
pub use record::{EvidenceKind, EvidenceRecord, Metadata, NewEvidence};
pub use storage::{EvidenceStorage, FileStorage, MemoryStorage, EVIDENCE_STORAGE_KEY};
pub use surface::{Clipboard, Inspector, MemoryClipboard, PanelState, Toast, ToastCenter};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ledger::{EvidenceStore, Page};
    pub use crate::record::{EvidenceKind, EvidenceRecord, Metadata, NewEvidence};
    pub use crate::feed::{FeedSource, LiveFeed, LiveFeedPoller};
    pub use crate::surface::{Inspector, ToastCenter};
    pub use crate::error::{SdkError, Result};
}
