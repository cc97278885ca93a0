//! Execution gateway for exercising contract bytecode against a single in-memory world state.
//!
//! A [`Gateway`] admits at most one deploy or call at a time, builds the execution context from
//! the request and the genesis configuration, drives the EVM with the configured tracer and
//! measurement strategy, and commits the resulting state only when execution succeeds.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod config;
pub use config::*;

mod context;
pub use context::*;

mod diagnostics;
pub use diagnostics::*;

mod engine;
pub use engine::*;

mod error;
pub use error::*;

mod gate;
pub use gate::*;

mod pipeline;
pub use pipeline::*;

mod request;
pub use request::*;

mod revert;
pub use revert::*;

mod state;
pub use state::*;

mod stats;
pub use stats::*;

mod trace;
pub use trace::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Allocation counters in unit tests.
#[cfg(test)]
#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator::new();

pub use alloy_genesis;
pub use revm;
