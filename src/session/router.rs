//! Session routing and per-session exclusivity.
//!
//! The router resolves (or mints) session ids and hands out one exclusive
//! lease per id. Runs on different ids proceed concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::config::BusyPolicy;
use crate::error::{Result, SqlMaticError};

use super::SessionManager;

/// Exclusive hold on a session id. Released on drop.
#[derive(Debug)]
pub struct SessionLease {
    session_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl SessionLease {
    /// The session this lease covers.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Maps session ids to the shared store and serializes runs per id.
pub struct SessionRouter {
    store: Arc<SessionManager>,
    leases: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    policy: BusyPolicy,
}

impl SessionRouter {
    /// Create a router over `store` with the given busy policy.
    pub fn new(store: Arc<SessionManager>, policy: BusyPolicy) -> Self {
        Self {
            store,
            leases: Mutex::new(HashMap::new()),
            policy,
        }
    }

    /// The underlying conversation store.
    pub fn store(&self) -> &Arc<SessionManager> {
        &self.store
    }

    /// Busy policy in effect.
    pub fn policy(&self) -> BusyPolicy {
        self.policy
    }

    /// Use the supplied id when it is non-blank, otherwise mint a new one.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use sqlmatic::config::BusyPolicy;
    /// use sqlmatic::session::{SessionManager, SessionRouter};
    ///
    /// let router = SessionRouter::new(Arc::new(SessionManager::new_memory()), BusyPolicy::Queue);
    /// assert_eq!(router.resolve(Some("web-1")), "web-1");
    /// assert_ne!(router.resolve(None), router.resolve(Some("  ")));
    /// ```
    pub fn resolve(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Acquire the exclusive lease for `session_id`.
    ///
    /// Under `queue` this waits for the current holder; under `reject` it
    /// fails with `SessionBusy` when the session is held.
    pub async fn acquire(&self, session_id: &str) -> Result<SessionLease> {
        loop {
            let lock = self.lock_for(session_id)?;

            let guard = match self.policy {
                BusyPolicy::Queue => Arc::clone(&lock).lock_owned().await,
                BusyPolicy::Reject => Arc::clone(&lock)
                    .try_lock_owned()
                    .map_err(|_| SqlMaticError::SessionBusy(session_id.to_string()))?,
            };

            // Evicted while we waited: retry on the current lock.
            if !self.is_current(session_id, &lock)? {
                debug!(session_id = %session_id, "Lease entry replaced while waiting, retrying");
                continue;
            }

            debug!(session_id = %session_id, "Session lease acquired");
            return Ok(SessionLease {
                session_id: session_id.to_string(),
                _guard: guard,
            });
        }
    }

    /// Remove a session from the store and forget its lease entry.
    ///
    /// Takes the lease first, so an in-flight run is never evicted. Under
    /// `queue` this waits for the holder; under `reject` it fails with
    /// `SessionBusy`.
    pub async fn evict(&self, session_id: &str) -> Result<()> {
        let lease = self.acquire(session_id).await?;
        self.leases
            .lock()
            .map_err(|_| SqlMaticError::Session("lease table poisoned".into()))?
            .remove(session_id);
        self.store.delete(session_id).await?;
        drop(lease);
        debug!(session_id = %session_id, "Session evicted");
        Ok(())
    }

    fn lock_for(&self, session_id: &str) -> Result<Arc<AsyncMutex<()>>> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| SqlMaticError::Session("lease table poisoned".into()))?;
        Ok(leases
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    fn is_current(&self, session_id: &str, lock: &Arc<AsyncMutex<()>>) -> Result<bool> {
        let leases = self
            .leases
            .lock()
            .map_err(|_| SqlMaticError::Session("lease table poisoned".into()))?;
        Ok(leases
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, lock)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Message;
    use std::time::Duration;

    fn router(policy: BusyPolicy) -> SessionRouter {
        SessionRouter::new(Arc::new(SessionManager::new_memory()), policy)
    }

    #[test]
    fn test_resolve_generates_unique_ids() {
        let r = router(BusyPolicy::Queue);
        let a = r.resolve(None);
        let b = r.resolve(Some(""));
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(r.resolve(Some(" keep-me ")), "keep-me");
    }

    #[tokio::test]
    async fn test_reject_policy_fails_second_acquire() {
        let r = router(BusyPolicy::Reject);
        let lease = r.acquire("s").await.unwrap();
        assert_eq!(lease.session_id(), "s");

        let err = r.acquire("s").await.unwrap_err();
        assert!(matches!(err, SqlMaticError::SessionBusy(ref id) if id == "s"));

        // Different sessions are independent.
        assert!(r.acquire("other").await.is_ok());

        drop(lease);
        assert!(r.acquire("s").await.is_ok());
    }

    #[tokio::test]
    async fn test_queue_policy_waits_for_release() {
        let r = Arc::new(router(BusyPolicy::Queue));
        let lease = r.acquire("s").await.unwrap();

        let r2 = Arc::clone(&r);
        let waiter = tokio::spawn(async move { r2.acquire("s").await.map(|_| ()) });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(lease);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_evict_removes_history() {
        let r = router(BusyPolicy::Queue);
        r.store().append("s", Message::user("hi")).await.unwrap();
        r.evict("s").await.unwrap();
        assert!(!r.store().exists("s").await);
        assert!(r.acquire("s").await.is_ok());
    }

    #[tokio::test]
    async fn test_evict_rejected_while_lease_held() {
        let r = router(BusyPolicy::Reject);
        r.store().append("s", Message::user("hi")).await.unwrap();
        let lease = r.acquire("s").await.unwrap();

        let err = r.evict("s").await.unwrap_err();
        assert!(matches!(err, SqlMaticError::SessionBusy(ref id) if id == "s"));
        assert!(r.store().exists("s").await);

        // The holder still excludes a second run.
        assert!(matches!(
            r.acquire("s").await.unwrap_err(),
            SqlMaticError::SessionBusy(_)
        ));

        drop(lease);
        r.evict("s").await.unwrap();
        assert!(!r.store().exists("s").await);
    }

    #[tokio::test]
    async fn test_evict_waits_for_holder_under_queue() {
        let r = Arc::new(router(BusyPolicy::Queue));
        r.store().append("s", Message::user("hi")).await.unwrap();
        let lease = r.acquire("s").await.unwrap();

        let r2 = Arc::clone(&r);
        let evict = tokio::spawn(async move { r2.evict("s").await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!evict.is_finished());
        assert!(r.store().exists("s").await);

        drop(lease);
        tokio::time::timeout(Duration::from_secs(1), evict)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!r.store().exists("s").await);
    }

    #[tokio::test]
    async fn test_waiter_queued_behind_evict_stays_exclusive() {
        let r = Arc::new(router(BusyPolicy::Queue));
        let first = r.acquire("s").await.unwrap();

        let r2 = Arc::clone(&r);
        let evict = tokio::spawn(async move { r2.evict("s").await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let r3 = Arc::clone(&r);
        let waiter = tokio::spawn(async move { r3.acquire("s").await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        evict.await.unwrap().unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // The waiter holds the live lock, so a third run must wait.
        let third = tokio::time::timeout(Duration::from_millis(50), r.acquire("s")).await;
        assert!(third.is_err());

        drop(second);
        assert!(r.acquire("s").await.is_ok());
    }
}
