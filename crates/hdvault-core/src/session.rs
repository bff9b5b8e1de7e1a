//! Wallet session lifetime.
//!
//! A `Session` ends on logout. Async work started under it is raced against its
//! cancellation token, so results computed for a finished session are never applied.
//! Logout is also broadcast as a `SessionEvent` so caches can drop their contents.

use crate::error::SessionError;
use std::future::Future;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 16;

/// Session lifecycle notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Login,
    Logout,
}

#[derive(Clone, Debug)]
pub struct Session {
    token: CancellationToken,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            token: CancellationToken::new(),
            events,
        }
    }

    /// Start the next session on the same event channel (after a logout).
    pub fn renew(&self) -> Self {
        let next = Self {
            token: CancellationToken::new(),
            events: self.events.clone(),
        };
        // No receivers is fine
        let _ = next.events.send(SessionEvent::Login);
        debug!("session renewed");
        next
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// End the session: cancel scoped work and notify subscribers.
    pub fn logout(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        let _ = self.events.send(SessionEvent::Logout);
        info!("session ended");
    }

    /// Run `work` unless the session ends first.
    pub async fn scoped<F>(&self, work: F) -> Result<F::Output, SessionError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SessionError::Cancelled),
            output = work => Ok(output),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_scoped_completes() {
        let session = Session::new();
        assert_eq!(session.scoped(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scoped_cancelled_by_logout() {
        let session = Session::new();
        let scoped = session.clone();
        let handle = tokio::spawn(async move {
            scoped
                .scoped(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    "stale"
                })
                .await
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        session.logout();
        assert_eq!(handle.await.unwrap(), Err(SessionError::Cancelled));
    }

    #[tokio::test]
    async fn test_work_after_logout_is_rejected() {
        let session = Session::new();
        session.logout();
        assert!(session.is_cancelled());
        assert_eq!(session.scoped(async { 1 }).await, Err(SessionError::Cancelled));
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let session = Session::new();
        let mut events = session.subscribe();

        session.logout();
        session.logout();
        let next = session.renew();

        assert_eq!(events.recv().await.unwrap(), SessionEvent::Logout);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Login);
        assert!(!next.is_cancelled());
        assert!(events.try_recv().is_err());
    }
}
