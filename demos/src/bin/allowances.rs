//! Follows the WETH balance and allowances of a wallet on Sepolia.
//!
//! Needs `RPC_URL` and `NETWORK=sepolia`, or `CONTRACT_ADDRESS` on another
//! network. The node behind `TRACE_RPC_URL` (or `RPC_URL`) must serve
//! `debug_traceTransaction`.

use demos::{block_stream, call_tracer, init_logging, open_store, require_sepolia_or};
use evm_event_stream::{
    datalakes::allowances::AllowancesDatalake, processor::BlockStreamProcessor,
    settings::Settings,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let settings = Settings::init()?;
    init_logging(&settings);
    require_sepolia_or(&settings, settings.contract_address, "CONTRACT_ADDRESS")?;

    let mut config = AllowancesDatalake::sepolia_config();
    if let Some(wallet) = settings.wallet_address {
        config.wallet = wallet;
    }
    if let Some(contract) = settings.contract_address {
        config.contract = contract;
    }
    if let Some(start_block) = settings.start_block {
        config.initial_block_number = start_block;
    }

    let datalake = AllowancesDatalake::new(
        config,
        open_store(&settings).await?,
        Box::new(call_tracer(&settings)?),
    );
    BlockStreamProcessor::new(block_stream(&settings)?, datalake)
        .run()
        .await?;
    Ok(())
}
