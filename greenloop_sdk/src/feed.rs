// src/feed.rs
// Live proof feed: a separately fetched list of server-side proof entries.
// Kept apart from the evidence ledger and never merged into it.

use crate::error::{Result, SdkError};
use crate::notify::{LogNotifier, Notification, Notifier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Default feed path on the dashboard server
pub const DEFAULT_FEED_PATH: &str = "/api/mirror-feed";

/// Default polling cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// One server-sourced proof entry. Every field tolerates absence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveFeedEntry {
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub lot_id: Option<String>,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default, deserialize_with = "de_sequence_number")]
    pub sequence_number: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub consensus_timestamp: Option<String>,
    #[serde(default)]
    pub raw_message: Option<String>,
}

/// Mirror nodes send sequence numbers as either numbers or strings
fn de_sequence_number<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(rename = "proofFeed", default)]
    proof_feed: Option<Vec<LiveFeedEntry>>,
}

/// Parse a feed body; a missing or null `proofFeed` is an empty feed
pub fn parse_feed(body: &str) -> Result<Vec<LiveFeedEntry>> {
    let response: FeedResponse = serde_json::from_str(body)?;
    Ok(response.proof_feed.unwrap_or_default())
}

/// Somewhere live feed entries come from
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<LiveFeedEntry>>;
}

/// `GET {base_url}{path}` over HTTP
#[derive(Clone)]
pub struct HttpFeedSource {
    url: String,
    client: Client,
}

impl HttpFeedSource {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, path, client))
    }

    /// Create a source with a custom reqwest client
    pub fn with_client(base_url: &str, path: &str, client: Client) -> Self {
        Self {
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Vec<LiveFeedEntry>> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SdkError::HttpStatus {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        let body = response.text().await?;
        parse_feed(&body)
    }
}

/// What happened to one fetch's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Entries replaced; holds the new entry count
    Applied(usize),
    /// A newer fetch already landed
    Stale,
    /// The feed was torn down before the response arrived
    Discarded,
}

/// Token for one in-flight fetch. Holding it keeps the loading flag set.
#[derive(Debug)]
pub struct FetchTicket {
    seq: u64,
    in_flight: Arc<AtomicUsize>,
}

impl FetchTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FeedState {
    entries: Vec<LiveFeedEntry>,
    last_updated: Option<DateTime<Utc>>,
    last_applied_seq: u64,
}

/// Shared live feed slot
#[derive(Clone)]
pub struct LiveFeed {
    state: Arc<RwLock<FeedState>>,
    next_seq: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    notifier: Arc<dyn Notifier>,
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveFeed {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(FeedState::default())),
            next_seq: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn entries(&self) -> Vec<LiveFeedEntry> {
        self.state.read().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// True while any fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_updated
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting results. In-flight fetches finish but are dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Start a fetch: takes the next sequence number and raises the
    /// loading flag until the ticket is completed or dropped.
    pub fn begin_fetch(&self) -> FetchTicket {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        FetchTicket {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst) + 1,
            in_flight: self.in_flight.clone(),
        }
    }

    /// Finish a fetch. Failures keep the previous entries.
    pub fn complete_fetch(
        &self,
        ticket: FetchTicket,
        result: Result<Vec<LiveFeedEntry>>,
    ) -> Result<FetchOutcome> {
        let seq = ticket.seq;

        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Live feed fetch #{} failed, keeping previous entries: {}", seq, e);
                return Err(e);
            }
        };

        let mut state = self.state.write();
        // close() may land while waiting for the guard
        if self.is_closed() {
            debug!("Live feed closed, discarding fetch #{}", seq);
            return Ok(FetchOutcome::Discarded);
        }
        if seq <= state.last_applied_seq {
            debug!(
                "Discarding stale live feed fetch #{} (last applied #{})",
                seq, state.last_applied_seq
            );
            return Ok(FetchOutcome::Stale);
        }

        let count = entries.len();
        state.entries = entries;
        state.last_applied_seq = seq;
        state.last_updated = Some(Utc::now());
        info!("Live feed updated: {} entries (fetch #{})", count, seq);
        Ok(FetchOutcome::Applied(count))
    }

    /// One fetch-and-replace against `source`
    pub async fn fetch_once(&self, source: &dyn FeedSource) -> Result<FetchOutcome> {
        let ticket = self.begin_fetch();
        let result = source.fetch().await;
        self.complete_fetch(ticket, result)
    }

    /// Manual refresh. Success is announced; failure goes back to the
    /// caller only.
    pub async fn refresh(&self, source: &dyn FeedSource) -> Result<FetchOutcome> {
        let outcome = self.fetch_once(source).await?;
        if outcome != FetchOutcome::Discarded {
            self.notifier.notify(Notification::info(
                "Live feed refreshed",
                &format!("{} proof entries", self.len()),
            ));
        }
        Ok(outcome)
    }
}

/// Spawns the timer that keeps a [`LiveFeed`] fresh
pub struct LiveFeedPoller;

impl LiveFeedPoller {
    /// Fetch immediately, then every `period`. Each tick runs its fetch in
    /// its own task so a slow response never delays the timer; the
    /// sequence guard in [`LiveFeed`] sorts out overlapping results.
    pub fn spawn(source: Arc<dyn FeedSource>, feed: LiveFeed, period: Duration) -> PollerHandle {
        let timer_feed = feed.clone();
        let timer_source = source.clone();

        let timer = tokio::spawn(async move {
            info!("Starting live feed poller (interval: {}s)", period.as_secs_f64());
            let mut ticker = interval(period.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if timer_feed.is_closed() {
                    break;
                }

                let feed = timer_feed.clone();
                let source = timer_source.clone();
                tokio::spawn(async move {
                    // Failures are already logged by the feed
                    let _ = feed.fetch_once(source.as_ref()).await;
                });
            }
        });

        PollerHandle { timer, feed, source }
    }
}

/// Owner of a running poller. Dropping it tears the poller down.
pub struct PollerHandle {
    timer: JoinHandle<()>,
    feed: LiveFeed,
    source: Arc<dyn FeedSource>,
}

impl PollerHandle {
    pub fn feed(&self) -> &LiveFeed {
        &self.feed
    }

    /// Fetch outside the timer cadence
    pub async fn refresh(&self) -> Result<FetchOutcome> {
        self.feed.refresh(self.source.as_ref()).await
    }

    pub fn shutdown(&self) {
        if !self.feed.is_closed() {
            info!("Stopping live feed poller");
        }
        self.feed.close();
        self.timer.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed_missing_key_is_empty() {
        assert!(parse_feed("{}").unwrap().is_empty());
        assert!(parse_feed(r#"{"proofFeed": null}"#).unwrap().is_empty());
        assert!(parse_feed("not json").is_err());
    }

    #[test]
    fn test_parse_feed_entries() {
        let body = r#"{"proofFeed": [
            {"type": "HCS", "lotId": "LOT-1", "topicId": "0.0.4242",
             "sequenceNumber": "17", "consensusTimestamp": "1700000000.000000001",
             "rawMessage": "{\"ndvi\":0.61}"},
            {"type": "HTS", "sequenceNumber": 3}
        ]}"#;
        let entries = parse_feed(body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].lot_id.as_deref(), Some("LOT-1"));
        assert_eq!(entries[0].sequence_number, Some(17));
        assert_eq!(entries[1].sequence_number, Some(3));
        assert_eq!(entries[1].topic_id, None);
    }

    #[test]
    fn test_close_while_waiting_for_state_discards() {
        let feed = LiveFeed::new();
        let ticket = feed.begin_fetch();

        let guard = feed.state.write();
        let completing = {
            let feed = feed.clone();
            std::thread::spawn(move || {
                feed.complete_fetch(ticket, Ok(vec![LiveFeedEntry::default()]))
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        feed.close();
        drop(guard);

        let outcome = completing.join().unwrap().unwrap();
        assert_eq!(outcome, FetchOutcome::Discarded);
        assert!(feed.is_empty());
        assert!(!feed.is_loading());
    }

    #[test]
    fn test_http_source_url_join() {
        let source =
            HttpFeedSource::with_client("http://localhost:3000/", DEFAULT_FEED_PATH, Client::new());
        assert_eq!(source.url(), "http://localhost:3000/api/mirror-feed");
    }
}
