//! In-memory transport fake for tests.
//!
//! Emulates the subset of the remote contract the library depends on:
//! the `kv` endpoint (recurse/keys/separator/raw reads, cas/acquire/
//! release/flags writes, recursive delete) and the `session` endpoint
//! (create/destroy/renew/info/list). Indexes increment monotonically the
//! way the real store's Raft index does.

use async_trait::async_trait;
use base64::Engine;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{Result, WaypostError};
use crate::transport::{Body, Query, Transport};

#[derive(Debug, Clone)]
struct StoredRecord {
    value: Vec<u8>,
    flags: u64,
    create_index: u64,
    modify_index: u64,
    lock_index: u64,
    session: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<String, StoredRecord>,
    sessions: HashSet<String>,
    index: u64,
}

impl State {
    fn next_index(&mut self) -> u64 {
        self.index += 1;
        self.index
    }
}

/// In-memory stand-in for the remote store.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    /// Returns the session holding a key's lock, if any.
    pub fn lock_holder(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(key)
            .and_then(|r| r.session.clone())
    }

    fn record_json(key: &str, record: &StoredRecord) -> serde_json::Value {
        let value = if record.value.is_empty() {
            serde_json::Value::Null
        } else {
            json!(base64::engine::general_purpose::STANDARD.encode(&record.value))
        };
        let mut obj = json!({
            "Key": key,
            "Value": value,
            "Flags": record.flags,
            "CreateIndex": record.create_index,
            "ModifyIndex": record.modify_index,
            "LockIndex": record.lock_index,
        });
        if let Some(session) = &record.session {
            obj["Session"] = json!(session);
        }
        obj
    }
}

fn param<'a>(query: &'a Query, name: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn body_bytes(body: Body) -> Result<Vec<u8>> {
    match body {
        Body::Empty => Ok(Vec::new()),
        Body::Bytes(bytes) => Ok(bytes),
        Body::Json(value) => Ok(serde_json::to_vec(&value)?),
    }
}

/// Truncates a key after the first `separator` past `prefix`, giving the
/// one-level directory listing entry for that key.
fn truncate_at_separator(key: &str, prefix: &str, separator: &str) -> String {
    let remainder = &key[prefix.len()..];
    match remainder.find(separator) {
        Some(pos) => format!("{}{}", prefix, &remainder[..pos + separator.len()]),
        None => key.to_string(),
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get_json(&self, path: &str, query: &Query) -> Result<Option<serde_json::Value>> {
        let state = self.state.lock().unwrap();

        if let Some(key) = path.strip_prefix("kv/") {
            if param(query, "keys").is_some() {
                let mut keys: BTreeSet<String> = BTreeSet::new();
                for k in state.records.keys().filter(|k| k.starts_with(key)) {
                    match param(query, "separator") {
                        Some(sep) if !sep.is_empty() => {
                            keys.insert(truncate_at_separator(k, key, sep));
                        }
                        _ => {
                            keys.insert(k.clone());
                        }
                    }
                }
                if keys.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(json!(keys.iter().collect::<Vec<_>>())));
            }

            let rows: Vec<serde_json::Value> = if param(query, "recurse").is_some() {
                state
                    .records
                    .iter()
                    .filter(|(k, _)| k.starts_with(key))
                    .map(|(k, r)| Self::record_json(k, r))
                    .collect()
            } else {
                state
                    .records
                    .get(key)
                    .map(|r| vec![Self::record_json(key, r)])
                    .unwrap_or_default()
            };

            if rows.is_empty() {
                return Ok(None);
            }
            return Ok(Some(json!(rows)));
        }

        if let Some(id) = path.strip_prefix("session/info/") {
            if state.sessions.contains(id) {
                return Ok(Some(json!([{ "ID": id }])));
            }
            return Ok(None);
        }

        if path == "session/list" {
            let sessions: Vec<serde_json::Value> =
                state.sessions.iter().map(|id| json!({ "ID": id })).collect();
            return Ok(Some(json!(sessions)));
        }

        if path.starts_with("session/node/") {
            return Ok(Some(json!([])));
        }

        Err(WaypostError::transport(format!(
            "memory transport does not serve GET {}",
            path
        )))
    }

    async fn get_raw(&self, path: &str, query: &Query) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock().unwrap();
        if let Some(key) = path.strip_prefix("kv/") {
            let _ = query;
            return Ok(state.records.get(key).map(|r| r.value.clone()));
        }
        Err(WaypostError::transport(format!(
            "memory transport does not serve raw GET {}",
            path
        )))
    }

    async fn put(&self, path: &str, query: &Query, body: Body) -> Result<serde_json::Value> {
        let mut state = self.state.lock().unwrap();

        if path == "session/create" {
            if let Body::Json(payload) = &body {
                if let Some(ttl) = payload.get("TTL").and_then(|v| v.as_str()) {
                    let seconds: u64 = ttl
                        .strip_suffix('s')
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| {
                            WaypostError::transport(format!("invalid session TTL '{}'", ttl))
                        })?;
                    if !(10..=3600).contains(&seconds) {
                        return Err(WaypostError::transport(format!(
                            "session TTL {}s outside 10s..3600s",
                            seconds
                        )));
                    }
                }
            }
            let id = Uuid::new_v4().to_string();
            state.sessions.insert(id.clone());
            return Ok(json!({ "ID": id }));
        }

        if let Some(id) = path.strip_prefix("session/destroy/") {
            state.sessions.remove(id);
            // Release behavior: invalidation drops every lock the session held.
            for record in state.records.values_mut() {
                if record.session.as_deref() == Some(id) {
                    record.session = None;
                }
            }
            return Ok(json!(true));
        }

        if let Some(id) = path.strip_prefix("session/renew/") {
            if state.sessions.contains(id) {
                return Ok(json!([{ "ID": id }]));
            }
            return Err(WaypostError::not_found(path.to_string()));
        }

        if let Some(key) = path.strip_prefix("kv/") {
            if let Some(session_id) = param(query, "acquire") {
                if !state.sessions.contains(session_id) {
                    return Err(WaypostError::transport(format!(
                        "invalid session '{}'",
                        session_id
                    )));
                }
                let payload = body_bytes(body)?;
                let (create_index, lock_index, held_by) = match state.records.get(key) {
                    Some(r) => (r.create_index, r.lock_index, r.session.clone()),
                    None => (0, 0, None),
                };
                match held_by.as_deref() {
                    Some(holder) if holder != session_id => return Ok(json!(false)),
                    Some(_) => {}
                    None => {}
                }
                let fresh_acquire = held_by.is_none();
                let index = state.next_index();
                let record = StoredRecord {
                    value: payload,
                    flags: 0,
                    create_index: if create_index == 0 { index } else { create_index },
                    modify_index: index,
                    lock_index: if fresh_acquire { lock_index + 1 } else { lock_index },
                    session: Some(session_id.to_string()),
                };
                state.records.insert(key.to_string(), record);
                return Ok(json!(true));
            }

            if let Some(session_id) = param(query, "release") {
                if let Some(record) = state.records.get_mut(key) {
                    if record.session.as_deref() == Some(session_id) {
                        record.session = None;
                        return Ok(json!(true));
                    }
                }
                return Ok(json!(false));
            }

            if let Some(cas) = param(query, "cas") {
                let expected: u64 = cas.parse().map_err(|_| {
                    WaypostError::transport(format!("invalid cas value '{}'", cas))
                })?;
                let current = state.records.get(key).map(|r| r.modify_index);
                let ok = match current {
                    None => expected == 0,
                    Some(index) => expected == index,
                };
                if !ok {
                    return Ok(json!(false));
                }
            }

            let flags = match param(query, "flags") {
                Some(raw) => raw.parse().map_err(|_| {
                    WaypostError::transport(format!("invalid flags value '{}'", raw))
                })?,
                None => 0,
            };

            let payload = body_bytes(body)?;
            let index = state.next_index();
            let (create_index, lock_index, session) = match state.records.get(key) {
                Some(r) => (r.create_index, r.lock_index, r.session.clone()),
                None => (index, 0, None),
            };
            state.records.insert(
                key.to_string(),
                StoredRecord {
                    value: payload,
                    flags,
                    create_index,
                    modify_index: index,
                    lock_index,
                    session,
                },
            );
            return Ok(json!(true));
        }

        Err(WaypostError::transport(format!(
            "memory transport does not serve PUT {}",
            path
        )))
    }

    async fn delete(&self, path: &str, query: &Query) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if let Some(key) = path.strip_prefix("kv/") {
            if param(query, "recurse").is_some() {
                let doomed: Vec<String> = state
                    .records
                    .keys()
                    .filter(|k| k.starts_with(key))
                    .cloned()
                    .collect();
                for k in doomed {
                    state.records.remove(&k);
                }
            } else {
                state.records.remove(key);
            }
            return Ok(true);
        }
        Err(WaypostError::transport(format!(
            "memory transport does not serve DELETE {}",
            path
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_at_separator() {
        assert_eq!(truncate_at_separator("a/b/c", "a/", "/"), "a/b/");
        assert_eq!(truncate_at_separator("a/d", "a/", "/"), "a/d");
        assert_eq!(truncate_at_separator("foo/bar", "", "/"), "foo/");
    }

    #[tokio::test]
    async fn test_put_then_get_record() {
        let t = MemoryTransport::new();
        t.put("kv/foo", &vec![], Body::Bytes(b"bar".to_vec()))
            .await
            .unwrap();

        let rows = t.get_json("kv/foo", &vec![]).await.unwrap().unwrap();
        let row = &rows.as_array().unwrap()[0];
        assert_eq!(row["Key"], "foo");
        assert_eq!(
            row["Value"],
            json!(base64::engine::general_purpose::STANDARD.encode(b"bar"))
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let t = MemoryTransport::new();
        assert!(t.get_json("kv/absent", &vec![]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_index() {
        let t = MemoryTransport::new();
        t.put("kv/k", &vec![], Body::Bytes(b"v1".to_vec()))
            .await
            .unwrap();

        let stale = vec![("cas".to_string(), "999".to_string())];
        let result = t
            .put("kv/k", &stale, Body::Bytes(b"v2".to_vec()))
            .await
            .unwrap();
        assert_eq!(result, json!(false));
    }

    #[tokio::test]
    async fn test_session_destroy_releases_locks() {
        let t = MemoryTransport::new();
        let created = t
            .put("session/create", &vec![], Body::Json(json!({})))
            .await
            .unwrap();
        let session = created["ID"].as_str().unwrap().to_string();

        let acquire = vec![("acquire".to_string(), session.clone())];
        let ok = t.put("kv/lock", &acquire, Body::Empty).await.unwrap();
        assert_eq!(ok, json!(true));
        assert_eq!(t.lock_holder("lock"), Some(session.clone()));

        t.put(&format!("session/destroy/{}", session), &vec![], Body::Empty)
            .await
            .unwrap();
        assert_eq!(t.lock_holder("lock"), None);
    }
}
