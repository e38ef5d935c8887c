//! Command-line interface definition for waypost.
//!
//! This module defines the CLI structure using clap derive macros,
//! including all subcommands and their arguments. Connection flags are
//! global and env-backed; flags that are not given fall back to the
//! values parsed from the environment in [`ClientConfig::from_env`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ClientConfig;

/// waypost - Service discovery and KV coordination client
///
/// A client for a distributed service-discovery agent: key/value
/// storage, service registration, and single-holder command execution
/// coordinated through sessions.
#[derive(Debug, Parser)]
#[command(name = "waypost")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// API scheme (http or https)
    #[arg(long, global = true)]
    pub api_scheme: Option<String>,

    /// Agent host to connect to
    #[arg(long, global = true)]
    pub api_host: Option<String>,

    /// Agent port to connect to
    #[arg(long, global = true)]
    pub api_port: Option<u16>,

    /// Datacenter to scope requests to
    #[arg(long, global = true)]
    pub datacenter: Option<String>,

    /// ACL token to send with requests
    #[arg(long, global = true, env = "WAYPOST_HTTP_TOKEN")]
    pub token: Option<String>,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the effective log level based on verbose/quiet flags.
    /// Returns: (level_name, is_quiet)
    pub fn log_level(&self) -> (&'static str, bool) {
        if self.quiet {
            return ("error", true);
        }

        let level = match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        (level, false)
    }

    /// Client configuration: environment values overridden by any
    /// connection flags given on the command line.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(scheme) = &self.api_scheme {
            config.scheme = scheme.clone();
        }
        if let Some(host) = &self.api_host {
            config.host = host.clone();
        }
        if let Some(port) = self.api_port {
            config.port = port;
        }
        if self.datacenter.is_some() {
            config.datacenter = self.datacenter.clone();
        }
        if self.token.is_some() {
            config.token = self.token.clone();
        }
        config
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Key/value store operations
    #[command(subcommand)]
    Kv(KvCommands),

    /// Register a service with the local agent
    Register(RegisterArgs),

    /// Deregister a service from the local agent
    Deregister(DeregisterArgs),

    /// Run a command on only one holder of a cluster-wide lock
    RunOnce(RunOnceArgs),
}

/// Key/value subcommands.
#[derive(Debug, Subcommand)]
pub enum KvCommands {
    /// Dump the KV store as JSON
    Backup(BackupArgs),

    /// Load a JSON dump into the KV store
    Restore(RestoreArgs),

    /// List all keys
    Ls(LsArgs),

    /// Create a folder marker
    Mkdir {
        /// Folder path to create
        path: String,
    },

    /// Print the value of a key
    Get(GetArgs),

    /// Set a key to a value
    Set {
        /// Key to set
        key: String,
        /// Value to store
        value: String,
    },

    /// Remove a key
    Rm(RmArgs),
}

/// Arguments for `kv backup`.
#[derive(Debug, Args)]
pub struct BackupArgs {
    /// Write the dump to a file instead of stdout
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Base64-encode values in the dump
    #[arg(short, long)]
    pub base64: bool,
}

/// Arguments for `kv restore`.
#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Read the dump from a file instead of stdin
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Values in the dump are base64-encoded
    #[arg(short, long)]
    pub base64: bool,

    /// Do not overwrite keys that already exist
    #[arg(short, long)]
    pub no_replace: bool,
}

/// Arguments for `kv ls`.
#[derive(Debug, Args)]
pub struct LsArgs {
    /// Long listing with value sizes
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for `kv get`.
#[derive(Debug, Args)]
pub struct GetArgs {
    /// Key, or prefix when --recurse is given
    pub key: String,

    /// Print every key under the prefix
    #[arg(short, long)]
    pub recurse: bool,

    /// Trim this many leading path segments from printed key names
    #[arg(short, long, default_value = "0")]
    pub trim: usize,
}

/// Arguments for `kv rm`.
#[derive(Debug, Args)]
pub struct RmArgs {
    /// Key, or prefix when --recurse is given
    pub key: String,

    /// Remove every key under the prefix
    #[arg(short, long)]
    pub recurse: bool,
}

/// Arguments for the `register` subcommand.
#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Service name
    pub name: String,

    /// Address to advertise for the service
    #[arg(short, long)]
    pub address: Option<String>,

    /// Port the service listens on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Service id (defaults to the service name)
    #[arg(short = 's', long)]
    pub service_id: Option<String>,

    /// Tags to attach to the service
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Health check for the service
    #[command(subcommand)]
    pub check: Option<CheckCommands>,
}

/// Health-check variants for `register`.
#[derive(Debug, Subcommand, PartialEq)]
pub enum CheckCommands {
    /// Run a script at a fixed interval
    Check {
        /// Interval between runs, in seconds
        interval: u64,
        /// Path to the check script
        path: String,
    },

    /// Poll a URL at a fixed interval
    Httpcheck {
        /// Interval between polls, in seconds
        interval: u64,
        /// URL to poll
        url: String,
    },

    /// Push-style TTL check
    Ttl {
        /// TTL in seconds
        duration: u64,
    },

    /// Register without any health check
    NoCheck,
}

/// Arguments for the `deregister` subcommand.
#[derive(Debug, Args)]
pub struct DeregisterArgs {
    /// Service id to remove
    pub service_id: String,
}

/// Arguments for the `run-once` subcommand.
#[derive(Debug, Args)]
pub struct RunOnceArgs {
    /// Lock name to contend on
    pub lock: String,

    /// Skip the run when the last one was fewer than this many seconds
    /// ago
    #[arg(short, long)]
    pub interval: Option<i64>,

    /// Session TTL in seconds backing the lock
    #[arg(long, default_value = "60")]
    pub ttl: u64,

    /// Command to run while holding the lock
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}
