//! ObjDir Common - Shared types and utilities
//!
//! This crate provides the error definitions and configuration types
//! used across all ObjDir components.

pub mod config;
pub mod error;

pub use config::{
    CoalesceConfig, Config, DirCacheConfig, LoggingConfig, MetaCacheConfig, StoreConfig,
    WorkerConfig,
};
pub use error::{Error, Result};
