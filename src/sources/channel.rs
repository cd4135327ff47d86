use crate::{filter::EventFilter, models::StreamMessage, stream::BlockStream};
use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

/// A block stream that receives blocks from a channel.
/// This is useful for controlled testing, as it allows you
/// to send blocks and drop notices to the stream as you wish.
#[derive(Debug)]
pub struct ChannelBlockStream {
    receiver: Option<Receiver<StreamMessage>>,
}

impl ChannelBlockStream {
    pub fn new(capacity: u64) -> (Self, Sender<StreamMessage>) {
        let (sender, receiver) = tokio::sync::mpsc::channel(capacity as usize);
        (
            ChannelBlockStream {
                receiver: Some(receiver),
            },
            sender,
        )
    }
}

#[async_trait]
impl BlockStream for ChannelBlockStream {
    async fn start(
        &mut self,
        _from_block: u64,
        _filter: EventFilter,
    ) -> Result<Receiver<StreamMessage>, anyhow::Error> {
        self.receiver
            .take()
            .ok_or_else(|| anyhow::anyhow!("Channel stream was already started"))
    }

    async fn stop(&mut self) {}
}
