//! Tracks one wallet's balance and allowances on a plain ERC20 token.

use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;

use crate::{
    datalake::{Datalake, DatalakeProperties},
    datalakes::wallet::{WalletConfig, WalletTracker},
    error::EventHandlerError,
    event_handler::{EventHandlerContext, HandlerRegistry},
    filter::EventFilter,
    macros::event_handler,
    store::{load_checkpoint, save_checkpoint, Store},
    trace::CallTraceSource,
};

sol! {
    #[derive(Debug)]
    event Transfer(address indexed from, address indexed to, uint256 value);
    #[derive(Debug)]
    event Approval(address indexed owner, address indexed spender, uint256 value);
}

pub struct Erc20Datalake {
    tracker: WalletTracker,
}

impl Erc20Datalake {
    pub fn new(
        config: WalletConfig,
        store: Box<dyn Store>,
        tracer: Box<dyn CallTraceSource>,
    ) -> Self {
        Self {
            tracker: WalletTracker::new(config, store, tracer),
        }
    }

    pub fn tracker(&self) -> &WalletTracker {
        &self.tracker
    }
}

#[async_trait]
impl Datalake for Erc20Datalake {
    fn properties(&self) -> DatalakeProperties {
        DatalakeProperties {
            id: "erc20-allowances".to_string(),
            initial_block_number: self.tracker.config().initial_block_number,
        }
    }

    fn filter_for_block(&self, _block_number: u64, _is_new_block: bool) -> EventFilter {
        EventFilter::new(
            vec![self.tracker.config().contract],
            vec![Transfer::SIGNATURE_HASH, Approval::SIGNATURE_HASH],
        )
    }

    fn handler_registry(&self) -> HandlerRegistry {
        let contract = self.tracker.config().contract;
        let mut registry = HandlerRegistry::new();
        registry.add_handler(contract, Transfer::SIGNATURE_HASH, handle_transfer);
        registry.add_handler(contract, Approval::SIGNATURE_HASH, handle_approval);
        registry
    }

    async fn load_checkpoint(&self) -> Result<Option<u64>, anyhow::Error> {
        load_checkpoint(self.tracker.store(), &self.properties().id).await
    }

    async fn save_checkpoint(&mut self, block_number: u64) -> Result<(), anyhow::Error> {
        let id = self.properties().id;
        save_checkpoint(self.tracker.store_mut(), &id, block_number).await
    }
}

#[event_handler]
async fn handle_transfer(
    context: EventHandlerContext<Erc20Datalake>,
    event: Transfer,
) -> Result<(), EventHandlerError> {
    log::debug!("{:?}", event);
    context
        .state
        .tracker
        .on_transfer(context.event.tx_hash, event.from, event.to, event.value)
        .await
}

#[event_handler]
async fn handle_approval(
    context: EventHandlerContext<Erc20Datalake>,
    event: Approval,
) -> Result<(), EventHandlerError> {
    log::debug!("{:?}", event);
    context
        .state
        .tracker
        .on_approval(context.event.tx_hash, event.owner, event.spender, event.value)
        .await
}
