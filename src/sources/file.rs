//! A block stream that replays blocks and drop notices from a file.

use std::{fs::File, path::Path};

use alloy_primitives::B256;
use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampSeconds};
use tokio::sync::mpsc::Receiver;

use crate::{
    filter::EventFilter,
    models::{Block, DropBlock, Event, StreamMessage},
    stream::BlockStream,
};

#[serde_as]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FileBlock {
    pub number: u64,
    #[serde(default)]
    pub hash: B256,
    #[serde_as(as = "Option<TimestampSeconds<i64>>")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl From<FileBlock> for Block {
    fn from(file_block: FileBlock) -> Self {
        let number = file_block.number;
        Block {
            number,
            hash: file_block.hash,
            timestamp: file_block.timestamp,
            events: file_block
                .events
                .into_iter()
                .map(|event| Event {
                    block_number: number,
                    ..event
                })
                .collect(),
        }
    }
}

/// One entry of a block file, tagged with `type: block` or `type: drop_block`.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileMessage {
    Block(FileBlock),
    DropBlock(DropBlock),
}

impl From<FileMessage> for StreamMessage {
    fn from(message: FileMessage) -> Self {
        match message {
            FileMessage::Block(block) => StreamMessage::Block(block.into()),
            FileMessage::DropBlock(drop) => StreamMessage::DropBlock(drop),
        }
    }
}

/// Replays a fixed list of messages read from a JSON or YAML file.
/// The start block and filter are not applied here, the processor
/// applies both on its side.
#[derive(Debug)]
pub struct FileBlockStream {
    messages: Vec<FileMessage>,
}

impl FileBlockStream {
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let file_path = file_path.as_ref();
        let file = File::open(file_path)
            .with_context(|| format!("Unable to open {}", file_path.display()))?;

        // Determine file extension
        let extension = file_path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("");

        let messages: Vec<FileMessage> = match extension {
            "json" => serde_json::from_reader(&file).context("Error deserializing JSON")?,
            "yaml" | "yml" => {
                serde_yaml::from_reader(&file).context("Error deserializing YAML")?
            }
            _ => bail!("Unsupported file type: {}", file_path.display()),
        };

        Ok(FileBlockStream { messages })
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl BlockStream for FileBlockStream {
    async fn start(
        &mut self,
        _from_block: u64,
        _filter: EventFilter,
    ) -> Result<Receiver<StreamMessage>, anyhow::Error> {
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        let messages = self.messages.clone();
        tokio::spawn(async move {
            for message in messages {
                if tx.send(message.into()).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    // no task is kept around, so no need to do anything on stop
    async fn stop(&mut self) {}
}
