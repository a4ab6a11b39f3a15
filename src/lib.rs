//! Streaming tool-call decoding and dispatch for LLM conversations.
//!
//! - [`decoder`] turns provider stream events into text tokens and complete
//!   [`message::ToolInvocation`]s.
//! - [`tools`] holds the registry of callable tools.
//! - [`projector`] renders history into a provider's request format.
//! - [`agent`] runs turns, executes tools and extends the history.

pub mod agent;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod error;
pub mod message;
pub mod projector;
pub mod provider;
pub mod tools;
