//! Completion-service abstraction and the recap prompt.

pub mod client;
pub mod prompt;
