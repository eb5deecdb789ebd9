//! Content fetcher for the daily digest.
//!
//! This module provides the `ContentClient` that retrieves the digest
//! document once per session, and the `FetchError` taxonomy for the
//! ways that retrieval can fail.

pub mod client;
pub mod error;

pub use client::{resolve_against, ContentClient};
pub use error::FetchError;
