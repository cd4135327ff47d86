//! Tallies the votes of the voting contract on Sepolia.

use demos::{block_stream, init_logging, open_store, require_sepolia_or};
use evm_event_stream::{
    datalakes::voting::{VotingConfig, VotingDatalake},
    processor::BlockStreamProcessor,
    settings::Settings,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let settings = Settings::init()?;
    init_logging(&settings);
    require_sepolia_or(&settings, settings.contract_address, "CONTRACT_ADDRESS")?;

    let mut config = VotingConfig::default();
    if let Some(contract) = settings.contract_address {
        config.contract = contract;
    }
    if let Some(start_block) = settings.start_block {
        config.initial_block_number = start_block;
    }

    let datalake = VotingDatalake::new(config, open_store(&settings).await?);
    BlockStreamProcessor::new(block_stream(&settings)?, datalake)
        .run()
        .await?;
    Ok(())
}
