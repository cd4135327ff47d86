// Lets the handler macros refer to this crate by name from inside it too.
extern crate self as evm_event_stream;

pub mod block_handler;
pub mod datalake;
pub mod datalakes;
pub mod decoder;
pub mod error;
pub mod event_handler;
pub mod filter;
pub mod logger;
pub mod macros;
pub mod models;
pub mod processor;
#[cfg(feature = "rpc")]
pub mod rpc;
pub mod settings;
pub mod sources;
pub mod store;
pub mod stream;
pub mod trace;

pub use anyhow::anyhow;
pub use async_trait::async_trait;
