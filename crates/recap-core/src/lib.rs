//! Core domain + application logic for the channel recap bot.
//!
//! This crate is intentionally framework-agnostic. Slack and the completion
//! service live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod identity;
pub mod logging;
pub mod messaging;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod selection;
pub mod transcript;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, RecapError, Result};
