//! Session provider abstraction
//!
//! This module provides the authenticated-identity source the tenant
//! context store depends on, and an in-memory implementation that
//! broadcasts sign-in, sign-out and token-refresh events.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Session error types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The provider was dropped
    #[error("Session channel closed")]
    ChannelClosed,

    /// The subscriber fell behind and missed events
    #[error("Session subscriber lagged, {0} events skipped")]
    Lagged(u64),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// User ID
    pub id: Uuid,

    /// Email, when the provider exposes it
    pub email: Option<String>,
}

impl SessionUser {
    /// Create a user with no email.
    pub fn new(id: Uuid) -> Self {
        Self { id, email: None }
    }
}

/// Session lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A user signed in
    SignedIn(SessionUser),

    /// The user signed out
    SignedOut,

    /// The session token was refreshed for this user
    TokenRefreshed(SessionUser),
}

/// Subscription handle for receiving session events.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// Receive the next event.
    ///
    /// # Errors
    ///
    /// [`SessionError::Lagged`] when events were dropped (the next call
    /// resumes with the oldest retained event), and
    /// [`SessionError::ChannelClosed`] once the provider is gone.
    pub async fn recv(&mut self) -> SessionResult<SessionEvent> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => SessionError::ChannelClosed,
            broadcast::error::RecvError::Lagged(n) => SessionError::Lagged(n),
        })
    }
}

/// Source of the authenticated identity and its lifecycle events.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The signed-in user, if any.
    async fn current_user(&self) -> Option<SessionUser>;

    /// Subscribe to session events.
    fn subscribe(&self) -> SessionSubscription;
}

/// In-memory session provider.
///
/// Suitable for embedding applications that manage sign-in themselves, and
/// for tests.
pub struct MemorySessionProvider {
    user: RwLock<Option<SessionUser>>,
    sender: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for MemorySessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionProvider")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl MemorySessionProvider {
    /// Create a signed-out provider.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create with custom event channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            user: RwLock::new(None),
            sender,
        }
    }

    /// Create a provider that already has a signed-in user.
    pub fn signed_in(user: SessionUser) -> Self {
        Self {
            user: RwLock::new(Some(user)),
            ..Self::new()
        }
    }

    /// Sign `user` in and notify subscribers.
    pub async fn sign_in(&self, user: SessionUser) {
        *self.user.write().await = Some(user.clone());
        self.emit(SessionEvent::SignedIn(user));
    }

    /// Sign out and notify subscribers.
    pub async fn sign_out(&self) {
        *self.user.write().await = None;
        self.emit(SessionEvent::SignedOut);
    }

    /// Notify subscribers of a token refresh. No-op when signed out.
    pub async fn refresh_token(&self) {
        let user = self.user.read().await.clone();
        if let Some(user) = user {
            self.emit(SessionEvent::TokenRefreshed(user));
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; the event is simply unobserved.
        if self.sender.send(event).is_err() {
            debug!("Session event emitted with no subscribers");
        }
    }
}

impl Default for MemorySessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn current_user(&self) -> Option<SessionUser> {
        self.user.read().await.clone()
    }

    fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.sender.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let provider = MemorySessionProvider::new();
        let mut sub = provider.subscribe();
        let user = SessionUser::new(Uuid::now_v7());

        provider.sign_in(user.clone()).await;
        assert_eq!(provider.current_user().await, Some(user.clone()));
        assert_eq!(sub.recv().await, Ok(SessionEvent::SignedIn(user)));

        provider.sign_out().await;
        assert!(provider.current_user().await.is_none());
        assert_eq!(sub.recv().await, Ok(SessionEvent::SignedOut));
    }

    #[tokio::test]
    async fn test_refresh_when_signed_out_is_silent() {
        let provider = MemorySessionProvider::new();
        let mut sub = provider.subscribe();

        provider.refresh_token().await;

        let received = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
        assert!(received.is_err());
    }

    #[tokio::test]
    async fn test_signed_in_constructor() {
        let user = SessionUser::new(Uuid::now_v7());
        let provider = MemorySessionProvider::signed_in(user.clone());
        assert_eq!(provider.current_user().await, Some(user));
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let provider = MemorySessionProvider::with_capacity(1);
        let mut sub = provider.subscribe();

        provider.sign_out().await;
        provider.sign_out().await;

        assert_eq!(sub.recv().await, Err(SessionError::Lagged(1)));
        assert_eq!(sub.recv().await, Ok(SessionEvent::SignedOut));
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let provider = MemorySessionProvider::new();
        let mut sub = provider.subscribe();
        drop(provider);

        assert_eq!(sub.recv().await, Err(SessionError::ChannelClosed));
    }
}
