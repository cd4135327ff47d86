//! Tracks one wallet's balance and allowances on Wrapped Ether.
//!
//! Besides the ERC20 `Transfer` and `Approval` events, WETH emits a
//! `Deposit` when ether is wrapped, which mints to the depositor.

use alloy_primitives::{address, Address};
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
    event Transfer(address indexed src, address indexed dst, uint256 wad);
    #[derive(Debug)]
    event Approval(address indexed src, address indexed guy, uint256 wad);
    #[derive(Debug)]
    event Deposit(address indexed dst, uint256 wad);
}

pub const WALLET_ADDRESS: Address = address!("E67ddd0Ef25BC9d6A2A55b4b5946140B9e570121");
/// WETH on Sepolia.
pub const WETH_CONTRACT: Address = address!("fFf9976782d46CC05630D1f6eBAb18b2324d6B14");
pub const WETH_START_BLOCK: u64 = 4_567_462;

pub struct AllowancesDatalake {
    tracker: WalletTracker,
}

impl AllowancesDatalake {
    pub fn new(
        config: WalletConfig,
        store: Box<dyn Store>,
        tracer: Box<dyn CallTraceSource>,
    ) -> Self {
        Self {
            tracker: WalletTracker::new(config, store, tracer),
        }
    }

    /// The monitored wallet on Sepolia WETH.
    pub fn sepolia_config() -> WalletConfig {
        WalletConfig {
            wallet: WALLET_ADDRESS,
            contract: WETH_CONTRACT,
            initial_block_number: WETH_START_BLOCK,
        }
    }

    pub fn tracker(&self) -> &WalletTracker {
        &self.tracker
    }
}

#[async_trait]
impl Datalake for AllowancesDatalake {
    fn properties(&self) -> DatalakeProperties {
        DatalakeProperties {
            id: "weth-allowances".to_string(),
            initial_block_number: self.tracker.config().initial_block_number,
        }
    }

    fn filter_for_block(&self, _block_number: u64, _is_new_block: bool) -> EventFilter {
        EventFilter::new(
            vec![self.tracker.config().contract],
            vec![
                Transfer::SIGNATURE_HASH,
                Approval::SIGNATURE_HASH,
                Deposit::SIGNATURE_HASH,
            ],
        )
    }

    fn handler_registry(&self) -> HandlerRegistry {
        let contract = self.tracker.config().contract;
        let mut registry = HandlerRegistry::new();
        registry.add_handler(contract, Transfer::SIGNATURE_HASH, handle_transfer);
        registry.add_handler(contract, Approval::SIGNATURE_HASH, handle_approval);
        registry.add_handler(contract, Deposit::SIGNATURE_HASH, handle_deposit);
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
    context: EventHandlerContext<AllowancesDatalake>,
    event: Transfer,
) -> Result<(), EventHandlerError> {
    log::debug!("{:?}", event);
    context
        .state
        .tracker
        .on_transfer(context.event.tx_hash, event.src, event.dst, event.wad)
        .await
}

#[event_handler]
async fn handle_approval(
    context: EventHandlerContext<AllowancesDatalake>,
    event: Approval,
) -> Result<(), EventHandlerError> {
    log::debug!("{:?}", event);
    context
        .state
        .tracker
        .on_approval(context.event.tx_hash, event.src, event.guy, event.wad)
        .await
}

#[event_handler]
async fn handle_deposit(
    context: EventHandlerContext<AllowancesDatalake>,
    event: Deposit,
) -> Result<(), EventHandlerError> {
    log::debug!("{:?}", event);
    context
        .state
        .tracker
        .on_deposit(context.event.tx_hash, event.dst, event.wad)
        .await
}
