//! Re-exports proc macros for defining event and block handlers.
//!
//! These macros convert async functions with a correct signature
//! into a struct that implements the [`EventHandler`][crate::event_handler::EventHandler]
//! or [`BlockHandler`][crate::block_handler::BlockHandler]
//! trait.

pub use handler_macro::block_handler;
pub use handler_macro::event_handler;
