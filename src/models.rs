//!
//! Contains canonical models for blocks and contract logs.
//! These models are used by the [`BlockStream`][crate::stream::BlockStream]
//! and [`BlockStreamProcessor`][crate::processor::BlockStreamProcessor]
//! to abstract the source of blocks and events.
//!
//! When implementing a new block stream, you will typically
//! convert the native representations of logs and blocks
//! into these generic models.

use alloy_primitives::{Address, Bytes, LogData, B256};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Generic struct for a contract log coming from a block stream.
/// The topics are kept in separate slots, as an EVM log carries at most
/// four of them and the first one identifies the event signature.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Event {
    #[serde(default)]
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
    pub contract: Address,
    pub topic_0: Option<B256>,
    #[serde(default)]
    pub topic_1: Option<B256>,
    #[serde(default)]
    pub topic_2: Option<B256>,
    #[serde(default)]
    pub topic_3: Option<B256>,
    #[serde(default)]
    pub log_data: Bytes,
}

impl Event {
    /// Builds an event from encoded log data, as produced by
    /// `SolEvent::encode_log_data`. Topics beyond the fourth are ignored.
    pub fn from_log_data(
        contract: Address,
        tx_hash: B256,
        log_index: u64,
        log: LogData,
    ) -> Self {
        let mut topics = log.topics().iter().copied();
        Event {
            block_number: 0,
            tx_hash,
            log_index,
            contract,
            topic_0: topics.next(),
            topic_1: topics.next(),
            topic_2: topics.next(),
            topic_3: topics.next(),
            log_data: log.data,
        }
    }

    /// Returns the topics present on the log, in order.
    /// Stops at the first empty slot.
    pub fn topics(&self) -> Vec<B256> {
        [self.topic_0, self.topic_1, self.topic_2, self.topic_3]
            .into_iter()
            .map_while(|topic| topic)
            .collect()
    }
}

/// Generic struct for blocks coming from a block stream.
/// Only the events relevant to the stream's filter need to be present.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Block {
    pub number: u64,
    pub hash: B256,
    pub timestamp: Option<chrono::DateTime<Utc>>,
    pub events: Vec<Event>,
}

/// Notice that a previously delivered block is no longer canonical.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DropBlock {
    pub number: u64,
    pub hash: B256,
}

/// A single item pushed through a block stream.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    Block(Block),
    DropBlock(DropBlock),
}

impl From<Block> for StreamMessage {
    fn from(block: Block) -> Self {
        StreamMessage::Block(block)
    }
}

impl From<DropBlock> for StreamMessage {
    fn from(drop: DropBlock) -> Self {
        StreamMessage::DropBlock(drop)
    }
}
