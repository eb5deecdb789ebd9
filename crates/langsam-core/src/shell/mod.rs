//! Offline cache for the application shell.
//!
//! This module provides:
//! - `CacheStorage`: generation-tagged stores, in memory or on disk
//! - `Network`: where fresh shell resources come from
//! - `spawn` / `ShellWorkerHandle`: the worker actor (install, activate, serve)

pub mod error;
pub mod network;
pub mod storage;
pub mod worker;

pub use error::ShellError;
pub use network::{HttpNetwork, Network, SHELL_REQUEST_TIMEOUT_SECS};
pub use storage::{
    CacheStorage, CachedData, CachedResponse, DiskCacheStorage, MemoryCacheStorage, ShellResponse,
};
pub use worker::{
    normalize_path, spawn, CacheHit, InstallReport, Intercept, ResponseSource, ShellConfig,
    ShellWorkerHandle, CACHE_VERSION, SHELL_MANIFEST,
};
