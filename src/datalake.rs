//! The capability interface implemented by every datalake.
//!
//! A datalake is the state handed to its event handlers. It decides which
//! events it wants to see per block, registers a handler per topic, and
//! gets notified at the end of each block and around dropped blocks.

use async_trait::async_trait;

use crate::{
    event_handler::{HandlerRegistry, State},
    filter::EventFilter,
    models::{Block, DropBlock},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatalakeProperties {
    pub id: String,
    /// Blocks below this number are ignored by the processor.
    pub initial_block_number: u64,
}

#[async_trait]
pub trait Datalake: State {
    fn properties(&self) -> DatalakeProperties;

    /// The filter events of `block_number` are selected with.
    /// `is_new_block` is false when the block number was seen before,
    /// which happens when blocks are replayed after a drop.
    fn filter_for_block(&self, block_number: u64, is_new_block: bool)
        -> EventFilter;

    /// Builds the registry that dispatches events to this datalake's handlers.
    fn handler_registry(&self) -> HandlerRegistry;

    /// The last block a previous run finished, if the datalake keeps one.
    /// Processing resumes right after it.
    async fn load_checkpoint(&self) -> Result<Option<u64>, anyhow::Error> {
        Ok(None)
    }

    /// Records that every block up to `block_number` was processed.
    async fn save_checkpoint(&mut self, _block_number: u64) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn process_end_of_block(
        &mut self,
        _block: &Block,
    ) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn process_before_drop_block(
        &mut self,
        _drop: &DropBlock,
    ) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn process_after_drop_block(
        &mut self,
        _drop: &DropBlock,
    ) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
