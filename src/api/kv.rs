//! Key/value namespace view.
//!
//! Presents the remote flat keyspace as an associative, iterable
//! container: get/set/delete, existence probes, prefix search, and
//! directory-style listings. Keys are slash-delimited paths; a leading
//! slash is stripped here, not by the remote store.
//!
//! A key containing a literal `/` that is not meant as hierarchy is
//! indistinguishable from a nested path. Known limitation of the
//! slash-delimited namespace.
//!
//! Plain [`Kv::set`] is last-write-wins. Optimistic concurrency is opt-in
//! through [`Kv::set_record`], which performs a check-and-set against the
//! record's modify index.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::api::Endpoint;
use crate::error::{Result, WaypostError};
use crate::transport::Body;
use crate::value::Value;

/// A full record from the KV service, including the index fields used for
/// check-and-set writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KvRecord {
    pub key: String,
    /// Stored payload; `None` when the key holds an empty value.
    #[serde(default, with = "base64_bytes")]
    pub value: Option<Vec<u8>>,
    #[serde(default)]
    pub flags: u64,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
    #[serde(default)]
    pub lock_index: u64,
    /// Session holding this key's lock, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl KvRecord {
    /// Decodes the stored payload according to its flags tag.
    pub fn decoded_value(&self) -> Value {
        let payload = self.value.as_deref().unwrap_or(&[]);
        Value::decode(payload, self.flags)
    }
}

/// Serde helper: binary payloads travel base64-encoded in JSON bodies.
/// Event payloads use it too.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer
                .serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| {
                base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

/// The KV namespace view.
#[derive(Clone)]
pub struct Kv {
    endpoint: Endpoint,
}

impl Kv {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Strips a leading slash and rejects empty keys.
    fn normalize_key(key: &str) -> Result<String> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(WaypostError::validation("key must not be empty"));
        }
        Ok(key.to_string())
    }

    /// Prefixes may be empty (the whole namespace); only the leading slash
    /// is stripped.
    fn normalize_prefix(prefix: &str) -> String {
        prefix.trim_start_matches('/').to_string()
    }

    fn path(key: &str) -> String {
        format!("kv/{}", key)
    }

    /// Gets a value, failing with `NotFound` when the key is absent.
    pub async fn get(&self, key: &str) -> Result<Value> {
        let key = Self::normalize_key(key)?;
        self.try_get(&key)
            .await?
            .ok_or_else(|| WaypostError::not_found(key))
    }

    /// Gets a value, returning `None` when the key is absent. A key that
    /// exists with an empty payload decodes as `Value::String("")`, kept
    /// distinct from absence.
    pub async fn try_get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get_record(key).await?.map(|r| r.decoded_value()))
    }

    /// Gets the full record for a key, including flags and index fields.
    pub async fn get_record(&self, key: &str) -> Result<Option<KvRecord>> {
        let key = Self::normalize_key(key)?;
        let rows = self.endpoint.get_list(&Self::path(&key), &[]).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Gets the raw stored payload without decoding.
    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = Self::normalize_key(key)?;
        self.endpoint
            .get_raw(&Self::path(&key), &[("raw", "")])
            .await
    }

    /// Sets a value unconditionally (last-write-wins).
    pub async fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let key = Self::normalize_key(key)?;
        let (payload, flags) = value.into().encode()?;
        let flags = flags.to_string();

        debug!(key = %key, bytes = payload.len(), "Setting key");
        let accepted = self
            .endpoint
            .put_bool(&Self::path(&key), &[("flags", &flags)], Body::Bytes(payload))
            .await?;
        if !accepted {
            return Err(WaypostError::conflict(format!(
                "write to '{}' rejected by the store",
                key
            )));
        }
        Ok(())
    }

    /// Sets a full record through a check-and-set write against the
    /// current modify index.
    ///
    /// Returns `Ok(false)` without writing when the stored value already
    /// equals `value`, or when `replace` is false and the key exists.
    /// A concurrent writer racing the check is a `Conflict`.
    pub async fn set_record(
        &self,
        key: &str,
        flags: u64,
        value: Value,
        replace: bool,
    ) -> Result<bool> {
        let (payload, _) = value.encode()?;
        self.set_raw_record(key, flags, payload, replace).await
    }

    /// Check-and-set write of an already-encoded payload. Backup restore
    /// goes through here so stored flags and bytes survive verbatim.
    pub async fn set_raw_record(
        &self,
        key: &str,
        flags: u64,
        payload: Vec<u8>,
        replace: bool,
    ) -> Result<bool> {
        let key = Self::normalize_key(key)?;

        let index = match self.get_record(&key).await? {
            Some(existing) => {
                if existing.value.as_deref().unwrap_or(&[]) == payload.as_slice()
                    && existing.flags == flags
                {
                    return Ok(false);
                }
                if !replace {
                    return Ok(false);
                }
                existing.modify_index
            }
            None => 0,
        };

        let cas = index.to_string();
        let flags_param = flags.to_string();
        let accepted = self
            .endpoint
            .put_bool(
                &Self::path(&key),
                &[("cas", &cas), ("flags", &flags_param)],
                Body::Bytes(payload),
            )
            .await?;
        if !accepted {
            return Err(WaypostError::conflict(format!(
                "check-and-set on '{}' lost to a concurrent writer (index {})",
                key, index
            )));
        }
        Ok(true)
    }

    /// Deletes a key, or the whole prefix when `recurse` is set.
    /// Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str, recurse: bool) -> Result<()> {
        let key = Self::normalize_key(key)?;
        let extra: &[(&str, &str)] = if recurse { &[("recurse", "")] } else { &[] };

        debug!(key = %key, recurse = recurse, "Deleting key");
        self.endpoint.delete(&Self::path(&key), extra).await?;
        Ok(())
    }

    /// Existence probe via a key listing, without fetching the value.
    pub async fn contains(&self, key: &str) -> Result<bool> {
        let key = Self::normalize_key(key)?;
        let rows = self
            .endpoint
            .get_list(&Self::path(&key), &[("keys", "")])
            .await?;
        Ok(rows.iter().any(|row| row.as_str() == Some(key.as_str())))
    }

    /// Returns every key/value pair whose key starts with `prefix`,
    /// ordered ascending by key. An empty prefix returns everything.
    pub async fn find(&self, prefix: &str) -> Result<BTreeMap<String, Value>> {
        let prefix = Self::normalize_prefix(prefix);
        let rows = self
            .endpoint
            .get_list(&Self::path(&prefix), &[("recurse", "")])
            .await?;

        let mut results = BTreeMap::new();
        for row in rows {
            let record: KvRecord = serde_json::from_value(row)?;
            results.insert(record.key.clone(), record.decoded_value());
        }
        Ok(results)
    }

    /// One-level directory listing: keys under `prefix`, truncated after
    /// the first `separator` past the prefix (so `a/b/c` and `a/b/d` both
    /// list as `a/b/` under prefix `a/`).
    pub async fn find_keys(&self, prefix: &str, separator: &str) -> Result<Vec<String>> {
        let prefix = Self::normalize_prefix(prefix);
        let rows = self
            .endpoint
            .get_list(
                &Self::path(&prefix),
                &[("keys", ""), ("separator", separator)],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.as_str().map(String::from))
            .collect())
    }

    /// All key names under a prefix, ascending lexicographic.
    pub async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = Self::normalize_prefix(prefix);
        let rows = self
            .endpoint
            .get_list(&Self::path(&prefix), &[("keys", "")])
            .await?;
        let mut keys: Vec<String> = rows
            .into_iter()
            .filter_map(|row| row.as_str().map(String::from))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Every key/value pair in the namespace.
    pub async fn items(&self) -> Result<BTreeMap<String, Value>> {
        self.find("").await
    }

    /// Every record in the namespace, full fields. Used by backup.
    pub async fn records(&self) -> Result<Vec<KvRecord>> {
        let rows = self.endpoint.get_list("kv/", &[("recurse", "")]).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }

    /// Writes a folder marker: an empty value at `key` with a trailing
    /// separator. Purely a naming convention; the remote store has no
    /// folder entity.
    pub async fn create_folder(&self, key: &str) -> Result<()> {
        let key = Self::normalize_key(key)?;
        let key = if key.ends_with('/') {
            key
        } else {
            format!("{}/", key)
        };
        let accepted = self
            .endpoint
            .put_bool(&Self::path(&key), &[], Body::Empty)
            .await?;
        if !accepted {
            return Err(WaypostError::conflict(format!(
                "folder write to '{}' rejected by the store",
                key
            )));
        }
        Ok(())
    }

    /// Conditional lock-acquire write: succeeds only when the key is
    /// unlocked or already held by `session`.
    pub async fn acquire(&self, key: &str, session: &str) -> Result<bool> {
        self.acquire_with(key, session, Body::Empty).await
    }

    /// Lock-acquire carrying a payload to store under the key.
    pub(crate) async fn acquire_with(&self, key: &str, session: &str, body: Body) -> Result<bool> {
        let key = Self::normalize_key(key)?;
        self.endpoint
            .put_bool(&Self::path(&key), &[("acquire", session)], body)
            .await
    }

    /// Lock-release write for a key held by `session`.
    pub async fn release(&self, key: &str, session: &str) -> Result<bool> {
        let key = Self::normalize_key(key)?;
        self.endpoint
            .put_bool(&Self::path(&key), &[("release", session)], Body::Empty)
            .await
    }
}
