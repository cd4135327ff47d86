//! The datalakes shipped with the crate.
//!
//! - [`allowances`]: balance and allowances of one wallet on WETH.
//! - [`erc20`]: the same for a plain ERC20 token, which has no `Deposit` event.
//! - [`voting`]: candidates and vote counts of a voting contract.
//!
//! The two token datalakes share their ledger rules through [`wallet::WalletTracker`].

pub mod allowances;
pub mod erc20;
pub mod voting;
pub mod wallet;
