//! Lock primitive behavior tests against the in-memory transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::api::Client;
use crate::error::WaypostError;
use crate::transport::memory::MemoryTransport;
use crate::value::Value;

fn client() -> (Client, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let client = Client::with_transport(transport.clone(), None, None);
    (client, transport)
}

#[tokio::test]
async fn test_exactly_one_contender_wins() {
    let (client, transport) = client();
    let lock = client.lock();

    let first = lock.try_acquire(Some("job"), None, None).await.unwrap();
    assert!(first.is_some());

    let second = lock.try_acquire(Some("job"), None, None).await.unwrap();
    assert!(second.is_none());

    // The loser's session must not leak.
    assert_eq!(transport.session_count(), 1);

    first.unwrap().release().await.unwrap();

    let third = lock.try_acquire(Some("job"), None, None).await.unwrap();
    assert!(third.is_some());
    third.unwrap().release().await.unwrap();
}

#[tokio::test]
async fn test_release_cleans_up_key_and_session() {
    let (client, transport) = client();
    let lock = client.lock();

    let guard = lock.try_acquire(Some("job"), None, None).await.unwrap().unwrap();
    let key = guard.key().to_string();
    assert_eq!(key, "waypost/locks/job");
    assert_eq!(transport.lock_holder(&key), Some(guard.session_id().to_string()));

    guard.release().await.unwrap();

    assert_eq!(transport.session_count(), 0);
    assert!(!client.kv().contains(&key).await.unwrap());
}

#[tokio::test]
async fn test_custom_prefix() {
    let (client, _) = client();
    let lock = client.lock().with_prefix("jobs/locks");

    let guard = lock.try_acquire(Some("nightly"), None, None).await.unwrap().unwrap();
    assert_eq!(guard.key(), "jobs/locks/nightly");
    guard.release().await.unwrap();
}

#[tokio::test]
async fn test_lock_payload_is_stored() {
    let (client, _) = client();
    let lock = client.lock();

    let guard = lock
        .try_acquire(Some("job"), Some(Value::String("holder-a".to_string())), None)
        .await
        .unwrap()
        .unwrap();

    let stored = client.kv().get("waypost/locks/job").await.unwrap();
    assert_eq!(stored, Value::String("holder-a".to_string()));
    guard.release().await.unwrap();
}

#[tokio::test]
async fn test_run_once_runs_action_and_releases() {
    let (client, transport) = client();
    let calls = Arc::new(AtomicUsize::new(0));

    let counted = calls.clone();
    let result = client
        .lock()
        .run_once("job", None, move || async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await
        .unwrap();

    assert_eq!(result, Some(7));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.session_count(), 0);
}

#[tokio::test]
async fn test_run_once_skips_when_contended() {
    let (client, _) = client();
    let lock = client.lock();

    let holder = lock.try_acquire(Some("job"), None, None).await.unwrap().unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let result = lock
        .run_once("job", None, move || async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    holder.release().await.unwrap();
}

#[tokio::test]
async fn test_run_once_releases_when_action_fails() {
    let (client, transport) = client();

    let result: crate::error::Result<Option<()>> = client
        .lock()
        .run_once("job", None, || async {
            Err(WaypostError::validation("action blew up"))
        })
        .await;

    assert!(result.is_err());
    // Release still happened: no session, lock free for the next caller.
    assert_eq!(transport.session_count(), 0);

    let retry = client.lock().try_acquire(Some("job"), None, None).await.unwrap();
    assert!(retry.is_some());
    retry.unwrap().release().await.unwrap();
}

#[tokio::test]
async fn test_reacquire_same_name_after_release_is_fresh() {
    let (client, _) = client();
    let lock = client.lock();

    let first = lock.try_acquire(Some("job"), None, None).await.unwrap().unwrap();
    let first_session = first.session_id().to_string();
    first.release().await.unwrap();

    let second = lock.try_acquire(Some("job"), None, None).await.unwrap().unwrap();
    assert_ne!(second.session_id(), first_session);
    second.release().await.unwrap();
}

#[tokio::test]
async fn test_invalid_ttl_is_validation_error() {
    let (client, transport) = client();

    let result = client.lock().try_acquire(Some("job"), None, Some(5)).await;
    assert!(matches!(result, Err(WaypostError::Validation { .. })));
    assert_eq!(transport.session_count(), 0);
}

#[tokio::test]
async fn test_anonymous_lock_gets_random_key() {
    let (client, _) = client();
    let lock = client.lock();

    let a = lock.try_acquire(None, None, None).await.unwrap().unwrap();
    let b = lock.try_acquire(None, None, None).await.unwrap().unwrap();
    assert_ne!(a.key(), b.key());

    a.release().await.unwrap();
    b.release().await.unwrap();
}
