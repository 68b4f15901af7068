// Mock ledger service used by the demo upload and claims flows.
// Ids and hashes are random; nothing leaves the process.

use crate::ledger::EvidenceStore;
use crate::record::{EvidenceKind, EvidenceRecord, Metadata, NewEvidence};
use chrono::Utc;
use parking_lot::Mutex;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Shard/realm prefix of every generated entity id
const ENTITY_PREFIX: &str = "0.0.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReceipt {
    pub file_id: String,
    pub transaction_hash: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceipt {
    pub topic_id: String,
    pub sequence_number: u64,
    pub transaction_hash: String,
    pub consensus_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReceipt {
    pub token_id: String,
    pub name: String,
    pub symbol: String,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub token_id: String,
    pub to: String,
    pub amount: u64,
    pub transaction_hash: String,
}

/// Stand-in for the Hedera services the dashboard talks to
#[derive(Debug, Default)]
pub struct MockLedgerService {
    topic_sequences: Mutex<HashMap<String, u64>>,
}

impl MockLedgerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_file(&self, contents: &[u8]) -> FileReceipt {
        FileReceipt {
            file_id: random_entity_id(),
            transaction_hash: random_hash(),
            size: contents.len(),
        }
    }

    /// Sequence numbers count up per topic starting at 1
    pub fn submit_message(&self, topic_id: &str, _message: &str) -> MessageReceipt {
        let sequence_number = {
            let mut sequences = self.topic_sequences.lock();
            let seq = sequences.entry(topic_id.to_string()).or_insert(0);
            *seq += 1;
            *seq
        };
        let now = Utc::now();

        MessageReceipt {
            topic_id: topic_id.to_string(),
            sequence_number,
            transaction_hash: random_hash(),
            consensus_timestamp: format!("{}.{:09}", now.timestamp(), now.timestamp_subsec_nanos()),
        }
    }

    pub fn create_token(&self, name: &str, symbol: &str) -> TokenReceipt {
        TokenReceipt {
            token_id: random_entity_id(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            transaction_hash: random_hash(),
        }
    }

    pub fn transfer_token(&self, token_id: &str, to: &str, amount: u64) -> TransferReceipt {
        TransferReceipt {
            token_id: token_id.to_string(),
            to: to.to_string(),
            amount,
            transaction_hash: random_hash(),
        }
    }

    // ========== Evidence-producing flows ==========

    /// Upload proof: store the file, then log it as `file` evidence
    pub fn record_file_upload(
        &self,
        store: &EvidenceStore,
        contents: &[u8],
        label: &str,
        source: &str,
        lot_id: Option<&str>,
    ) -> (FileReceipt, EvidenceRecord) {
        let receipt = self.create_file(contents);
        let mut metadata = base_metadata("File Upload", &receipt.transaction_hash);
        metadata.insert("size".to_string(), json!(receipt.size));
        if let Some(lot) = lot_id {
            metadata.insert("lotId".to_string(), json!(lot));
        }

        let record = store.append(
            NewEvidence::new(EvidenceKind::File, receipt.file_id.clone(), label)
                .metadata(metadata)
                .source(source),
        );
        (receipt, record)
    }

    /// Anchor a message on a topic, then log it as `topic-message` evidence
    pub fn record_topic_message(
        &self,
        store: &EvidenceStore,
        topic_id: &str,
        message: &str,
        label: &str,
        source: &str,
    ) -> (MessageReceipt, EvidenceRecord) {
        let receipt = self.submit_message(topic_id, message);
        let mut metadata = base_metadata("Topic Message", &receipt.transaction_hash);
        metadata.insert("sequenceNumber".to_string(), json!(receipt.sequence_number));
        metadata.insert(
            "consensusTimestamp".to_string(),
            json!(receipt.consensus_timestamp),
        );

        let record = store.append(
            NewEvidence::new(EvidenceKind::TopicMessage, topic_id, label)
                .metadata(metadata)
                .source(source),
        );
        (receipt, record)
    }

    pub fn record_token_creation(
        &self,
        store: &EvidenceStore,
        name: &str,
        symbol: &str,
        source: &str,
    ) -> (TokenReceipt, EvidenceRecord) {
        let receipt = self.create_token(name, symbol);
        let mut metadata = base_metadata("Token Created", &receipt.transaction_hash);
        metadata.insert("symbol".to_string(), json!(symbol));

        let record = store.append(
            NewEvidence::new(EvidenceKind::Token, receipt.token_id.clone(), name)
                .metadata(metadata)
                .source(source),
        );
        (receipt, record)
    }

    /// Transfers are logged as `transaction` evidence keyed by their hash
    pub fn record_token_transfer(
        &self,
        store: &EvidenceStore,
        token_id: &str,
        to: &str,
        amount: u64,
        source: &str,
    ) -> (TransferReceipt, EvidenceRecord) {
        let receipt = self.transfer_token(token_id, to, amount);
        let mut metadata = base_metadata("Token Transfer", &receipt.transaction_hash);
        metadata.insert("tokenId".to_string(), json!(token_id));
        metadata.insert("to".to_string(), json!(to));
        metadata.insert("amount".to_string(), json!(amount));

        let record = store.append(
            NewEvidence::new(
                EvidenceKind::Transaction,
                receipt.transaction_hash.clone(),
                format!("Transfer {} of {}", amount, token_id),
            )
            .metadata(metadata)
            .source(source),
        );
        (receipt, record)
    }
}

fn base_metadata(action: &str, transaction_hash: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("action".to_string(), json!(action));
    metadata.insert("transactionHash".to_string(), json!(transaction_hash));
    metadata.insert("recordedAt".to_string(), json!(Utc::now().to_rfc3339()));
    metadata
}

fn random_entity_id() -> String {
    let num: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("{}{}", ENTITY_PREFIX, num)
}

fn random_hash() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}
