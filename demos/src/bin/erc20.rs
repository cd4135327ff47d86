//! Follows the balance and allowances of a wallet on any ERC20 token.
//!
//! Needs `RPC_URL`, `NETWORK`, `WALLET_ADDRESS`, `CONTRACT_ADDRESS` and `START_BLOCK`.

use anyhow::Context;
use demos::{block_stream, call_tracer, init_logging, open_store};
use evm_event_stream::{
    datalakes::{erc20::Erc20Datalake, wallet::WalletConfig},
    processor::BlockStreamProcessor,
    settings::Settings,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let settings = Settings::init()?;
    init_logging(&settings);

    let config = WalletConfig {
        wallet: settings.wallet_address.context("WALLET_ADDRESS is required")?,
        contract: settings
            .contract_address
            .context("CONTRACT_ADDRESS is required")?,
        initial_block_number: settings.start_block.context("START_BLOCK is required")?,
    };

    let datalake = Erc20Datalake::new(
        config,
        open_store(&settings).await?,
        Box::new(call_tracer(&settings)?),
    );
    BlockStreamProcessor::new(block_stream(&settings)?, datalake)
        .run()
        .await?;
    Ok(())
}
