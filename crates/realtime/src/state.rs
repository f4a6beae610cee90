//! Shared relay state and the connect-time authentication seam.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use urlyn_auth::{AuthError, Authenticator};
use urlyn_config::RealtimeConfig;
use urlyn_database::{ChatRepository, MemberRepository, MessageRepository, User, UserRepository};

use crate::error::{AuthRejection, RealtimeError};
use crate::presence::{ConnectionId, PresenceRegistry};
use crate::rooms::RoomRegistry;
use crate::typing::TypingTracker;

/// Resolves a connect-time bearer token to a user.
///
/// The production implementation wraps the session store; tests inject a
/// fake so no real credentials are needed.
#[async_trait]
pub trait TokenAuthenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<User, RealtimeError>;
}

/// Session-token verification against the database.
pub struct SessionTokenAuthenticator {
    authenticator: Authenticator,
}

impl SessionTokenAuthenticator {
    pub fn new(authenticator: Authenticator) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl TokenAuthenticator for SessionTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<User, RealtimeError> {
        match self.authenticator.authenticate_token(token).await {
            Ok((user, _session)) => Ok(user),
            Err(AuthError::SessionExpired) => {
                Err(RealtimeError::Authentication(AuthRejection::ExpiredToken))
            }
            Err(AuthError::UnknownUser) => {
                Err(RealtimeError::Authentication(AuthRejection::UnknownUser))
            }
            Err(AuthError::SessionNotFound) | Err(AuthError::InvalidSession) => {
                Err(RealtimeError::Authentication(AuthRejection::InvalidToken))
            }
            Err(AuthError::Database(err)) => {
                Err(RealtimeError::Store(urlyn_database::StoreError::Database(err)))
            }
            Err(_) => Err(RealtimeError::Authentication(AuthRejection::InvalidToken)),
        }
    }
}

/// Everything a connection handler needs, cheap to clone.
#[derive(Clone)]
pub struct RealtimeState {
    pool: SqlitePool,
    pub presence: Arc<PresenceRegistry>,
    pub rooms: Arc<RoomRegistry>,
    pub typing: Arc<TypingTracker>,
    pub authenticator: Arc<dyn TokenAuthenticator>,
    pub config: RealtimeConfig,
    next_connection_id: Arc<AtomicU64>,
}

impl RealtimeState {
    pub fn new(
        pool: SqlitePool,
        authenticator: Arc<dyn TokenAuthenticator>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            pool,
            presence: Arc::new(PresenceRegistry::new()),
            rooms: Arc::new(RoomRegistry::new()),
            typing: Arc::new(TypingTracker::new()),
            authenticator,
            config,
            next_connection_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn allocate_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn chats(&self) -> ChatRepository {
        ChatRepository::new(self.pool.clone())
    }

    pub fn messages(&self) -> MessageRepository {
        MessageRepository::new(self.pool.clone())
    }

    pub fn members(&self) -> MemberRepository {
        MemberRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }
}
