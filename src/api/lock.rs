//! Advisory-lock primitive over KV sessions.
//!
//! Acquisition walks `UNLOCKED -> ACQUIRING -> HELD`; contention drops
//! straight back to `UNLOCKED` without an error. Release (`HELD ->
//! RELEASING -> UNLOCKED`) always runs the release write, deletes the lock
//! key, and destroys the session. The session's TTL is the backstop when a
//! holder dies without releasing; the expiry-vs-release boundary is an
//! accepted eventual-consistency window, not something the remote store
//! can make atomic.
//!
//! Locks are advisory: they exclude only participants that check them.

use std::future::Future;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::kv::Kv;
use crate::api::session::{Session, SessionBehavior, SessionOptions};
use crate::api::Endpoint;
use crate::error::Result;
use crate::transport::Body;
use crate::value::Value;

/// Default key prefix for lock keys.
pub const DEFAULT_PREFIX: &str = "waypost/locks";

/// Factory for lock acquisitions under a key prefix.
#[derive(Clone)]
pub struct Lock {
    endpoint: Endpoint,
    prefix: String,
}

impl Lock {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Overrides the key prefix for lock keys.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn kv(&self) -> Kv {
        Kv::new(self.endpoint.clone())
    }

    fn session(&self) -> Session {
        Session::new(self.endpoint.clone())
    }

    /// Attempts to acquire the named lock.
    ///
    /// Returns `Ok(None)` when another holder is active; that is expected
    /// contention, not an error. A transport failure during acquisition is
    /// surfaced after the freshly created session is destroyed best-effort.
    ///
    /// `name` defaults to a random key under the prefix. `ttl` (seconds)
    /// creates a one-shot session with that TTL as the backstop release;
    /// the session is never renewed here.
    pub async fn try_acquire(
        &self,
        name: Option<&str>,
        value: Option<Value>,
        ttl: Option<u64>,
    ) -> Result<Option<LockGuard>> {
        let key = format!(
            "{}/{}",
            self.prefix,
            name.map(String::from)
                .unwrap_or_else(|| Uuid::new_v4().to_string())
        );

        let session = self.session();
        let session_id = session
            .create(SessionOptions {
                name: Some(format!("waypost-lock:{}", key)),
                behavior: Some(SessionBehavior::Release),
                ttl,
                ..Default::default()
            })
            .await?;

        debug!(key = %key, session = %session_id, "Acquiring lock");

        let body = match value {
            Some(value) => Body::Bytes(value.encode()?.0),
            None => Body::Empty,
        };

        let acquired = match self.kv().acquire_with(&key, &session_id, body).await {
            Ok(acquired) => acquired,
            Err(e) => {
                // Acquisition failed in flight; don't leak the session.
                if let Err(destroy_err) = session.destroy(&session_id).await {
                    warn!(session = %session_id, error = %destroy_err,
                        "Failed to destroy session after acquisition error");
                }
                return Err(e);
            }
        };

        if !acquired {
            debug!(key = %key, "Lock is held by another session");
            session.destroy(&session_id).await?;
            return Ok(None);
        }

        debug!(key = %key, session = %session_id, "Lock acquired");
        Ok(Some(LockGuard {
            kv: self.kv(),
            session,
            key,
            session_id,
            released: false,
        }))
    }

    /// Acquires the lock, runs `action` while holding it, and releases on
    /// every exit path. Returns `Ok(None)` when the lock is contended and
    /// the action was not run.
    ///
    /// An error from the action propagates after a best-effort release;
    /// exactly one release happens per successful acquisition.
    pub async fn run_once<F, Fut, T>(
        &self,
        name: &str,
        ttl: Option<u64>,
        action: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = match self.try_acquire(Some(name), None, ttl).await? {
            Some(guard) => guard,
            None => return Ok(None),
        };

        let result = action().await;
        let released = guard.release().await;

        match (result, released) {
            (Ok(value), Ok(())) => Ok(Some(value)),
            (Ok(value), Err(e)) => {
                // The session TTL will reap the lock eventually.
                warn!(error = %e, "Lock release failed after successful action");
                Ok(Some(value))
            }
            (Err(e), _) => Err(e),
        }
    }
}

/// A held lock. Call [`LockGuard::release`] to give it up; a guard dropped
/// without releasing leaves the session TTL as the only release path.
pub struct LockGuard {
    kv: Kv,
    session: Session,
    key: String,
    session_id: String,
    released: bool,
}

impl LockGuard {
    /// The lock key, including the prefix.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The session holding the lock.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Releases the lock: release write, key cleanup, session destroy.
    /// Failures are reported but every step is still attempted.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        debug!(key = %self.key, session = %self.session_id, "Releasing lock");

        let mut first_error = None;

        if let Err(e) = self.kv.release(&self.key, &self.session_id).await {
            warn!(key = %self.key, error = %e, "Lock release write failed");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.kv.delete(&self.key, false).await {
            warn!(key = %self.key, error = %e, "Lock key cleanup failed");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.session.destroy(&self.session_id).await {
            warn!(session = %self.session_id, error = %e, "Session destroy failed");
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                key = %self.key,
                session = %self.session_id,
                "Lock guard dropped without release; session TTL is the backstop"
            );
        }
    }
}
