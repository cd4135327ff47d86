use alloy_primitives::{Address, B256};
#[cfg(feature = "rpc")]
use alloy_rpc_types_eth::Filter;
use serde::{Deserialize, Serialize};

use crate::models::Event;

/// Selects events by emitting contract and topic-0.
/// An empty list matches anything for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub contract: Vec<Address>,
    pub topic_0: Vec<B256>,
}

impl EventFilter {
    pub fn new(contract: Vec<Address>, topic_0: Vec<B256>) -> Self {
        Self { contract, topic_0 }
    }

    pub fn matches(&self, event: &Event) -> bool {
        let contract_matches =
            self.contract.is_empty() || self.contract.contains(&event.contract);
        let topic_matches = self.topic_0.is_empty()
            || event
                .topic_0
                .is_some_and(|topic| self.topic_0.contains(&topic));
        contract_matches && topic_matches
    }

    /// The `eth_getLogs` filter selecting the same logs in a block range.
    #[cfg(feature = "rpc")]
    pub fn to_log_filter(&self, from_block: u64, to_block: u64) -> Filter {
        Filter::new()
            .address(self.contract.clone())
            .event_signature(self.topic_0.clone())
            .from_block(from_block)
            .to_block(to_block)
    }
}
