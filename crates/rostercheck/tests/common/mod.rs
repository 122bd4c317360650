//! Shared test utilities for rostercheck integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a store and dispatcher to scripted backends
//! - Builders for provider inputs, reports and CSV uploads

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{ScriptedExtractor, ScriptedOracle, Step, TestHarness};
