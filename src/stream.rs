//! Has a trait that abstracts a stream of blocks coming
//! from any source, like an RPC node, a file, or a channel.

use crate::{filter::EventFilter, models::StreamMessage};
use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::mpsc::Receiver;

/// A trait that abstracts a stream of blocks coming
/// from any source, like an RPC node, a file, or a channel.
/// The stream is started by calling [`BlockStream::start`], which returns
/// a [`tokio::sync::mpsc::Receiver`] that the [`BlockStreamProcessor`][crate::processor::BlockStreamProcessor]
/// awaits on to receive blocks and drop notices.
///
/// `from_block` and `filter` are hints: a remote source uses them to
/// narrow what it fetches, while a fixed source like a file may ignore
/// them, since the processor applies both again on its side.
///
/// If the stream is finished, which can happen when processing
/// a finite source such as a file, the stream should simply close
/// the channel and the processor will exit gracefully.
///
/// If the processor fails, it drops the receiver, which a stream can implicitly
/// use to detect that it no longer needs to fetch blocks.
#[async_trait]
pub trait BlockStream: Debug {
    // Starts the stream. This may involve spawning a new task,
    // which pushes blocks to the channel that is returned.
    async fn start(
        &mut self,
        from_block: u64,
        filter: EventFilter,
    ) -> Result<Receiver<StreamMessage>, anyhow::Error>;

    // Explicitly stop the stream
    async fn stop(&mut self);
}
