// Side-effect channel for ledger and feed events (toasts)

use crate::record::EvidenceRecord;
use log::{info, warn};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Evidence,
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
    /// Explorer link offered as "open explorer"
    pub link: Option<String>,
    /// Value offered as "copy id"
    pub copy_value: Option<String>,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: &str, description: &str) -> Self {
        Self {
            level,
            title: title.to_string(),
            description: description.to_string(),
            link: None,
            copy_value: None,
        }
    }

    /// Toast announcing a freshly appended record
    pub fn evidence(record: &EvidenceRecord) -> Self {
        Self {
            level: NotificationLevel::Evidence,
            title: format!("{} {}", record.kind().icon(), record.kind().microcopy()),
            description: record.label().to_string(),
            link: Some(record.hashscan_url().to_string()),
            copy_value: Some(record.evidence_id().to_string()),
        }
    }

    pub fn info(title: &str, description: &str) -> Self {
        Self::new(NotificationLevel::Info, title, description)
    }

    pub fn success(title: &str, description: &str) -> Self {
        Self::new(NotificationLevel::Success, title, description)
    }

    pub fn warning(title: &str, description: &str) -> Self {
        Self::new(NotificationLevel::Warning, title, description)
    }
}

/// Receives notifications emitted by the store and the feed
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Warning => warn!("{}: {}", n.title, n.description),
            _ => info!(
                "{}: {}{}",
                n.title,
                n.description,
                n.link.map(|l| format!(" ({})", l)).unwrap_or_default()
            ),
        }
    }
}

/// Drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// Forwards notifications to a UI task over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // Receiver gone means the UI shut down; nothing left to show
        let _ = self.tx.send(notification);
    }
}
