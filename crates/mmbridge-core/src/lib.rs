//! Core of the Mattermost adapter for a bot brain.
//!
//! This crate is intentionally transport-agnostic. The chat server lives
//! behind [`ports::ChatBackend`], implemented in `mmbridge-mattermost`; the
//! brain sees the adapter through the seams in [`brain`].

pub mod adapter;
pub mod brain;
pub mod config;
pub mod consumer;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod rooms;
pub mod sender;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::BotAdapter;
pub use errors::{Error, Result};
