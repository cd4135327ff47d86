//! Replays recorded WETH blocks from a file through the allowances
//! datalake and prints the resulting balance and allowance.
//! Runs offline: no node and no call traces.

use std::{env, time::Duration};

use alloy_primitives::{address, Address, B256};
use async_trait::async_trait;
use evm_event_stream::{
    datalakes::allowances::AllowancesDatalake,
    processor::BlockStreamProcessor,
    sources::file::FileBlockStream,
    store::MemoryStore,
    trace::{CallFrame, CallTraceSource},
};

const SPENDER: Address = address!("3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD");

/// Recorded blocks carry no traces.
struct NoTraces;

#[async_trait]
impl CallTraceSource for NoTraces {
    async fn transaction_calls(&self, _tx_hash: B256) -> Result<Vec<CallFrame>, anyhow::Error> {
        Ok(Vec::new())
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env::set_var("RUST_LOG", "info");
    env_logger::init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/data/weth_blocks.yaml".to_string());
    let stream = FileBlockStream::new(&path)?;

    let datalake = AllowancesDatalake::new(
        AllowancesDatalake::sepolia_config(),
        Box::new(MemoryStore::new()),
        Box::new(NoTraces),
    );
    let mut processor = BlockStreamProcessor::new(stream, datalake)
        .default_logger_with_report_interval(Duration::from_secs(60));
    processor.run().await?;

    let datalake = processor.into_datalake();
    let tracker = datalake.tracker();
    log::info!("balance: {:?}", tracker.balance().await?);
    log::info!("allowance of {}: {:?}", SPENDER, tracker.allowance(SPENDER).await?);
    Ok(())
}
