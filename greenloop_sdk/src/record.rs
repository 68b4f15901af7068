use crate::hashscan::HashscanResolver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form key/value details attached to an evidence record
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Source tag used when a flow does not name itself
pub const DEFAULT_SOURCE: &str = "GreenLoop";

/// Kind of on-chain proof an evidence record points at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EvidenceKind {
    Transaction,
    File,
    TopicMessage,
    Token,
    /// Anything outside the closed set. Kept verbatim so it round-trips.
    Unknown(String),
}

impl EvidenceKind {
    /// All known kinds, in display order
    pub const KNOWN: [EvidenceKind; 4] = [
        EvidenceKind::Transaction,
        EvidenceKind::File,
        EvidenceKind::TopicMessage,
        EvidenceKind::Token,
    ];

    /// Parse a wire name. Never fails.
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "transaction" => EvidenceKind::Transaction,
            "file" => EvidenceKind::File,
            "topic-message" => EvidenceKind::TopicMessage,
            "token" => EvidenceKind::Token,
            other => EvidenceKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EvidenceKind::Transaction => "transaction",
            EvidenceKind::File => "file",
            EvidenceKind::TopicMessage => "topic-message",
            EvidenceKind::Token => "token",
            EvidenceKind::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, EvidenceKind::Unknown(_))
    }

    /// Short badge shown next to the record
    pub fn icon(&self) -> &'static str {
        match self {
            EvidenceKind::Transaction => "TX",
            EvidenceKind::File => "FILE",
            EvidenceKind::TopicMessage => "HCS",
            EvidenceKind::Token => "HTS",
            EvidenceKind::Unknown(_) => "•",
        }
    }

    /// Path segment on the explorer, `None` for unknown kinds
    pub fn explorer_path(&self) -> Option<&'static str> {
        match self {
            EvidenceKind::Transaction => Some("transaction"),
            EvidenceKind::File => Some("file"),
            EvidenceKind::TopicMessage => Some("topic"),
            EvidenceKind::Token => Some("token"),
            EvidenceKind::Unknown(_) => None,
        }
    }

    /// Human readable description used in toasts
    pub fn microcopy(&self) -> &'static str {
        match self {
            EvidenceKind::Transaction => "Transaction submitted to Hedera",
            EvidenceKind::File => "File stored on Hedera File Service",
            EvidenceKind::TopicMessage => "Message published to HCS topic",
            EvidenceKind::Token => "Token activity on Hedera Token Service",
            EvidenceKind::Unknown(_) => "Evidence recorded",
        }
    }
}

impl From<String> for EvidenceKind {
    fn from(s: String) -> Self {
        EvidenceKind::parse(&s)
    }
}

impl From<&str> for EvidenceKind {
    fn from(s: &str) -> Self {
        EvidenceKind::parse(s)
    }
}

impl From<EvidenceKind> for String {
    fn from(kind: EvidenceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged proof of an on-chain style action.
///
/// Records are built by the ledger at append time and never change after
/// that; only read accessors are exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    id: String,
    kind: EvidenceKind,
    evidence_id: String,
    label: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default = "default_source")]
    source: String,
    timestamp: DateTime<Utc>,
    hashscan_url: String,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

/// Caller supplied part of a record
#[derive(Debug, Clone)]
pub struct NewEvidence {
    pub kind: EvidenceKind,
    pub evidence_id: String,
    pub label: String,
    pub metadata: Metadata,
    pub source: Option<String>,
}

impl NewEvidence {
    pub fn new(
        kind: impl Into<EvidenceKind>,
        evidence_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            evidence_id: evidence_id.into(),
            label: label.into(),
            metadata: Metadata::new(),
            source: None,
        }
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl EvidenceRecord {
    /// Build a record. `seq` disambiguates appends that share an evidence id
    /// and a millisecond.
    pub(crate) fn build(
        new: NewEvidence,
        resolver: &HashscanResolver,
        seq: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let hashscan_url = resolver.resolve(&new.kind, &new.evidence_id);
        let id = format!(
            "{}-{}-{}-{}",
            new.kind,
            new.evidence_id,
            now.timestamp_millis(),
            seq
        );
        let source = match new.source {
            Some(s) if !s.trim().is_empty() => s,
            _ => default_source(),
        };

        Self {
            id,
            kind: new.kind,
            evidence_id: new.evidence_id,
            label: new.label,
            metadata: new.metadata,
            source,
            timestamp: now,
            hashscan_url,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &EvidenceKind {
        &self.kind
    }

    pub fn evidence_id(&self) -> &str {
        &self.evidence_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn hashscan_url(&self) -> &str {
        &self.hashscan_url
    }

    /// Toast / inspector description: kind microcopy followed by the label
    pub fn description(&self) -> String {
        format!("{}: {}", self.kind.microcopy(), self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        for kind in EvidenceKind::KNOWN.iter() {
            assert_eq!(&EvidenceKind::parse(kind.as_str()), kind);
        }
        assert_eq!(EvidenceKind::parse("topic-message"), EvidenceKind::TopicMessage);
    }

    #[test]
    fn test_unknown_kind_degrades() {
        let kind = EvidenceKind::parse("contract");
        assert_eq!(kind, EvidenceKind::Unknown("contract".to_string()));
        assert!(!kind.is_known());
        assert_eq!(kind.icon(), "•");
        assert_eq!(kind.explorer_path(), None);
        assert_eq!(kind.microcopy(), "Evidence recorded");
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let resolver = HashscanResolver::default();
        let record = EvidenceRecord::build(
            NewEvidence::new(EvidenceKind::File, "0.0.700567", "Soil report")
                .meta("lotId", "LOT-7")
                .source("Proof Upload"),
            &resolver,
            1,
            Utc::now(),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "file");
        assert_eq!(json["evidenceId"], "0.0.700567");
        assert_eq!(json["source"], "Proof Upload");
        assert_eq!(json["metadata"]["lotId"], "LOT-7");
        assert!(json["hashscanUrl"].as_str().unwrap().ends_with("/file/0.0.700567"));

        let back: EvidenceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_blank_source_falls_back() {
        let record = EvidenceRecord::build(
            NewEvidence::new("token", "0.0.1", "Badge").source("  "),
            &HashscanResolver::default(),
            0,
            Utc::now(),
        );
        assert_eq!(record.source(), DEFAULT_SOURCE);
        assert!(record.id().starts_with("token-0.0.1-"));
    }
}
