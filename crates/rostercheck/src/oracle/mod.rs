//! Clients for the remote validation and extraction services.

pub mod client;
pub mod http;

pub use client::{ArchiveExtractor, ExtractionResult, ValidationOracle};
pub use http::HttpOracle;
