use crate::error::SdkError;
use crate::record::EvidenceKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Explorer host, networks are path prefixes below it
pub const HASHSCAN_HOST: &str = "https://hashscan.io";

/// Explorer network a resolver points at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashscanNetwork {
    Mainnet,
    #[default]
    Testnet,
    Previewnet,
}

impl HashscanNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashscanNetwork::Mainnet => "mainnet",
            HashscanNetwork::Testnet => "testnet",
            HashscanNetwork::Previewnet => "previewnet",
        }
    }
}

impl fmt::Display for HashscanNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashscanNetwork {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(HashscanNetwork::Mainnet),
            "testnet" => Ok(HashscanNetwork::Testnet),
            "previewnet" => Ok(HashscanNetwork::Previewnet),
            other => Err(SdkError::InvalidConfig(format!("unknown network '{}'", other))),
        }
    }
}

/// Maps evidence ids to explorer URLs for one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashscanResolver {
    base_url: String,
}

impl Default for HashscanResolver {
    fn default() -> Self {
        Self::new(HashscanNetwork::default())
    }
}

impl HashscanResolver {
    pub fn new(network: HashscanNetwork) -> Self {
        Self {
            base_url: format!("{}/{}", HASHSCAN_HOST, network),
        }
    }

    /// Resolver for a self-hosted or mirrored explorer
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{path}/{id}` for known kinds, the bare base otherwise
    pub fn resolve(&self, kind: &EvidenceKind, id: &str) -> String {
        match kind.explorer_path() {
            Some(path) => format!("{}/{}/{}", self.base_url, path, id),
            None => self.base_url.clone(),
        }
    }
}

/// Resolve against the default (testnet) explorer
pub fn resolve_url(kind: &EvidenceKind, id: &str) -> String {
    HashscanResolver::default().resolve(kind, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_kinds() {
        assert_eq!(
            resolve_url(&EvidenceKind::File, "0.0.700567"),
            "https://hashscan.io/testnet/file/0.0.700567"
        );
        assert_eq!(
            resolve_url(&EvidenceKind::TopicMessage, "0.0.4242"),
            "https://hashscan.io/testnet/topic/0.0.4242"
        );
        assert_eq!(
            resolve_url(&EvidenceKind::Token, "0.0.600222#1"),
            "https://hashscan.io/testnet/token/0.0.600222#1"
        );
        assert!(resolve_url(&EvidenceKind::Transaction, "0xabc").ends_with("/transaction/0xabc"));
    }

    #[test]
    fn test_unknown_kind_returns_base() {
        let resolver = HashscanResolver::new(HashscanNetwork::Mainnet);
        let kind = EvidenceKind::parse("contract");
        assert_eq!(resolver.resolve(&kind, "0.0.1"), "https://hashscan.io/mainnet");
        assert_eq!(resolver.resolve(&kind, "0.0.1"), resolver.base_url());
    }

    #[test]
    fn test_custom_base_and_network_parse() {
        let resolver = HashscanResolver::with_base_url("http://explorer.local/");
        assert_eq!(
            resolver.resolve(&EvidenceKind::File, "0.0.9"),
            "http://explorer.local/file/0.0.9"
        );
        assert_eq!("PreviewNet".parse::<HashscanNetwork>().unwrap(), HashscanNetwork::Previewnet);
        assert!("devnet".parse::<HashscanNetwork>().is_err());
        assert_eq!(HashscanNetwork::default(), HashscanNetwork::Testnet);
    }
}
