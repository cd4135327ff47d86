//! Keeps the candidates of a voting contract and their vote counts.

use alloy_primitives::{address, Address, U256};
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    datalake::{Datalake, DatalakeProperties},
    error::EventHandlerError,
    event_handler::{EventHandlerContext, HandlerRegistry},
    filter::EventFilter,
    macros::event_handler,
    store::{load_checkpoint, save_checkpoint, Store, Table},
};

sol! {
    #[derive(Debug)]
    event NewCandidate(uint256 indexed candidateId, string name);
    #[derive(Debug)]
    event VoteEvent(uint256 indexed candidateId);
}

/// The voting contract on Sepolia.
pub const VOTING_CONTRACT: Address = address!("7CA293451A1131D67A7dAAA0a852D5564366b7bf");
pub const VOTING_START_BLOCK: u64 = 4_274_183;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingConfig {
    pub contract: Address,
    pub initial_block_number: u64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            contract: VOTING_CONTRACT,
            initial_block_number: VOTING_START_BLOCK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(rename = "_candidateId")]
    pub candidate_id: U256,
    #[serde(rename = "_name")]
    pub name: String,
    #[serde(rename = "numVotes")]
    pub num_votes: u64,
}

pub const CANDIDATES: Table<CandidateRecord> = Table::new("candidate");

pub struct VotingDatalake {
    config: VotingConfig,
    store: Box<dyn Store>,
}

impl VotingDatalake {
    pub fn new(config: VotingConfig, store: Box<dyn Store>) -> Self {
        Self { config, store }
    }

    pub async fn candidate(&self, candidate_id: U256) -> Result<Option<CandidateRecord>, anyhow::Error> {
        CANDIDATES
            .get(&*self.store, &candidate_id.to_string())
            .await
    }
}

#[async_trait]
impl Datalake for VotingDatalake {
    fn properties(&self) -> DatalakeProperties {
        DatalakeProperties {
            id: "voting".to_string(),
            initial_block_number: self.config.initial_block_number,
        }
    }

    fn filter_for_block(&self, _block_number: u64, _is_new_block: bool) -> EventFilter {
        EventFilter::new(
            vec![self.config.contract],
            vec![NewCandidate::SIGNATURE_HASH, VoteEvent::SIGNATURE_HASH],
        )
    }

    fn handler_registry(&self) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.add_handler(
            self.config.contract,
            NewCandidate::SIGNATURE_HASH,
            handle_new_candidate,
        );
        registry.add_handler(self.config.contract, VoteEvent::SIGNATURE_HASH, handle_vote);
        registry
    }

    async fn load_checkpoint(&self) -> Result<Option<u64>, anyhow::Error> {
        load_checkpoint(&*self.store, &self.properties().id).await
    }

    async fn save_checkpoint(&mut self, block_number: u64) -> Result<(), anyhow::Error> {
        let id = self.properties().id;
        save_checkpoint(&mut *self.store, &id, block_number).await
    }
}

#[event_handler]
async fn handle_new_candidate(
    context: EventHandlerContext<VotingDatalake>,
    event: NewCandidate,
) -> Result<(), EventHandlerError> {
    log::debug!("{:?}", event);
    let record = CandidateRecord {
        candidate_id: event.candidateId,
        name: event.name,
        num_votes: 0,
    };
    CANDIDATES
        .set(
            &mut *context.state.store,
            &record.candidate_id.to_string(),
            &record,
        )
        .await
        .map_err(EventHandlerError::UnrecoverableError)?;
    log::info!("candidate {} registered as {}", record.candidate_id, record.name);
    Ok(())
}

#[event_handler]
async fn handle_vote(
    context: EventHandlerContext<VotingDatalake>,
    event: VoteEvent,
) -> Result<(), EventHandlerError> {
    log::debug!("{:?}", event);
    let key = event.candidateId.to_string();
    let Some(mut candidate) = CANDIDATES
        .get(&*context.state.store, &key)
        .await
        .map_err(EventHandlerError::UnrecoverableError)?
    else {
        return Ok(());
    };
    candidate.num_votes += 1;
    CANDIDATES
        .set(&mut *context.state.store, &key, &candidate)
        .await
        .map_err(EventHandlerError::UnrecoverableError)?;
    log::info!("candidate {} has {} votes", key, candidate.num_votes);
    Ok(())
}
