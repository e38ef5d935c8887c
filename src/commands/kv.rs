//! Key/value subcommand handlers: backup, restore, listing, and the
//! single-key operations.
//!
//! Backups are a JSON array of `[key, flags, value]` triples. With
//! base64 mode the value is the base64 of the raw stored payload and any
//! payload round-trips exactly; without it the payload must be valid
//! UTF-8.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::api::kv::Kv;
use crate::api::Client;
use crate::cli::{BackupArgs, GetArgs, KvCommands, LsArgs, RestoreArgs, RmArgs};
use crate::error::{Result, WaypostError};

/// One stored key in a backup: `[key, flags, value]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry(pub String, pub u64, pub Option<String>);

/// Dispatches a `kv` subcommand.
pub async fn dispatch(client: &Client, subcmd: &KvCommands) -> Result<()> {
    let kv = client.kv();
    match subcmd {
        KvCommands::Backup(args) => backup(&kv, args).await,
        KvCommands::Restore(args) => restore(&kv, args).await,
        KvCommands::Ls(args) => ls(&kv, args).await,
        KvCommands::Mkdir { path } => kv.create_folder(path).await,
        KvCommands::Get(args) => get(&kv, args).await,
        KvCommands::Set { key, value } => kv.set(key, value.as_str()).await,
        KvCommands::Rm(args) => rm(&kv, args).await,
    }
}

async fn backup(kv: &Kv, args: &BackupArgs) -> Result<()> {
    let entries = collect_backup(kv, args.base64).await?;
    info!(keys = entries.len(), "Backing up KV store");

    match &args.file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            serde_json::to_writer(file, &entries)?;
        }
        None => println!("{}", serde_json::to_string(&entries)?),
    }
    Ok(())
}

async fn restore(kv: &Kv, args: &RestoreArgs) -> Result<()> {
    let entries: Vec<BackupEntry> = match &args.file {
        Some(path) => read_backup(path)?,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            serde_json::from_str(&raw)?
        }
    };

    let restored = apply_restore(kv, &entries, args.base64, !args.no_replace).await?;
    info!(keys = restored, total = entries.len(), "Restored KV store");
    Ok(())
}

async fn ls(kv: &Kv, args: &LsArgs) -> Result<()> {
    if args.long {
        for record in kv.records().await? {
            let size = record.value.as_ref().map(Vec::len).unwrap_or(0);
            println!("{:>10} {}", size, record.key);
        }
    } else {
        for key in kv.keys("").await? {
            println!("{}", key);
        }
    }
    Ok(())
}

async fn get(kv: &Kv, args: &GetArgs) -> Result<()> {
    if args.recurse {
        for (key, value) in kv.find(&args.key).await? {
            println!("{}\t{}", trim_key(&key, args.trim), value);
        }
    } else if let Some(value) = kv.try_get(&args.key).await? {
        println!("{}", value);
    }
    Ok(())
}

async fn rm(kv: &Kv, args: &RmArgs) -> Result<()> {
    debug!(key = %args.key, recurse = args.recurse, "Removing key");
    kv.delete(&args.key, args.recurse).await
}

/// Gathers every record into backup triples.
async fn collect_backup(kv: &Kv, base64: bool) -> Result<Vec<BackupEntry>> {
    let mut entries = Vec::new();
    for record in kv.records().await? {
        let value = match record.value {
            Some(payload) if base64 => {
                Some(base64::engine::general_purpose::STANDARD.encode(payload))
            }
            Some(payload) => Some(String::from_utf8(payload).map_err(|_| {
                WaypostError::validation(format!(
                    "value of '{}' is not UTF-8; use base64 mode",
                    record.key
                ))
            })?),
            None => None,
        };
        entries.push(BackupEntry(record.key, record.flags, value));
    }
    Ok(entries)
}

fn read_backup(path: &Path) -> Result<Vec<BackupEntry>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Writes backup triples into the store, preserving stored flags.
/// Returns the number of keys written; with `replace` unset, keys that
/// already exist are counted as skipped.
async fn apply_restore(
    kv: &Kv,
    entries: &[BackupEntry],
    base64: bool,
    replace: bool,
) -> Result<usize> {
    let mut restored = 0;
    for BackupEntry(key, flags, value) in entries {
        let payload = match value {
            Some(encoded) if base64 => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| {
                    WaypostError::validation(format!("invalid base64 for '{}': {}", key, e))
                })?,
            Some(text) => text.clone().into_bytes(),
            None => Vec::new(),
        };
        if kv.set_raw_record(key, *flags, payload, replace).await? {
            restored += 1;
        }
    }
    Ok(restored)
}

/// Drops the first `count` slash-delimited segments from a key name.
fn trim_key(key: &str, count: usize) -> String {
    if count == 0 {
        return key.to_string();
    }
    let segments: Vec<&str> = key.split('/').collect();
    if segments.len() <= count {
        return key.to_string();
    }
    segments[count..].join("/")
}
