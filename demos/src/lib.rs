//! Helpers shared by the demo binaries.

use anyhow::bail;
use evm_event_stream::{
    settings::{Network, Settings},
    sources::rpc::RpcBlockStream,
    store::{MemoryStore, SqliteStore, Store},
    trace::RpcCallTracer,
};

pub fn init_logging(settings: &Settings) {
    env_logger::Builder::new()
        .filter_level(settings.log_level.to_level_filter())
        .init();
}

/// SQLite when `DATABASE_URL` is set, memory otherwise.
pub async fn open_store(settings: &Settings) -> Result<Box<dyn Store>, anyhow::Error> {
    match &settings.database_url {
        Some(database_url) => {
            log::info!("storing tables in {}", database_url);
            Ok(Box::new(SqliteStore::connect(database_url).await?))
        }
        None => {
            log::warn!("DATABASE_URL not set, tables are kept in memory");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

/// Polls `RPC_URL`, which has to serve the chain of `NETWORK`.
pub fn block_stream(settings: &Settings) -> Result<RpcBlockStream, anyhow::Error> {
    Ok(
        RpcBlockStream::new(&settings.rpc_url, settings.api_key.as_deref())?
            .chain_id(settings.network.chain_id())
            .confirmations(settings.confirmations),
    )
}

pub fn call_tracer(settings: &Settings) -> Result<RpcCallTracer, anyhow::Error> {
    RpcCallTracer::connect(&settings.trace_rpc_url, settings.api_key.as_deref())
}

/// The built-in contract addresses are Sepolia deployments.
/// On any other network, `override_address` has to replace them.
pub fn require_sepolia_or<T>(
    settings: &Settings,
    override_address: Option<T>,
    name: &str,
) -> Result<(), anyhow::Error> {
    if settings.network != Network::Sepolia && override_address.is_none() {
        bail!(
            "The default contract is deployed on sepolia, set {} for {:?}",
            name,
            settings.network
        );
    }
    Ok(())
}
