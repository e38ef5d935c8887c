//! waypost - Service discovery and KV coordination client
//!
//! This crate provides a client library and CLI for a distributed
//! service-discovery agent: a key/value store with typed values, session
//! leases, an advisory-lock primitive built on them, and service
//! registration against the local agent.
//!
//! # Overview
//!
//! The library presents the remote agent's flat HTTP API as typed
//! endpoint facades hanging off a [`Client`]. The KV namespace behaves
//! like an associative container whose values round-trip through a small
//! tagged [`Value`] model, and the lock primitive turns the KV
//! acquire/release protocol into a guard type with a `run-once` helper
//! for cluster-wide single execution.
//!
//! # Modules
//!
//! - [`api`] - Typed endpoint facades and the [`Client`]
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - Handlers behind the CLI subcommands
//! - [`config`] - Connection configuration and environment parsing
//! - [`error`] - Error types and CLI exit codes
//! - [`transport`] - HTTP transport and the transport trait seam
//! - [`value`] - Tagged value encoding for stored payloads

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod transport;
pub mod value;

// Re-exports for convenience
pub use api::{Client, Kv, Lock, Session};
pub use cli::Cli;
pub use config::ClientConfig;
pub use error::{exit_code, Result, WaypostError};
pub use value::Value;
