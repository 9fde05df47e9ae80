//! Taleforge: Campaign Content Generation Pipeline
//!
//! Queues generation requests behind a bounded FIFO dispatcher, calls a
//! rate-limited text-generation provider with a hard timeout, recovers a
//! structured object from whatever text comes back, and reports progress to
//! polling clients.

pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod queue;
pub mod recovery;
pub mod service;
pub mod status;
