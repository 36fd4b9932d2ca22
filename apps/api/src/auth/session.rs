//! Login sessions: opaque tokens mapped to user ids.
//!
//! `AppState` holds an `Arc<dyn SessionStore>`: Redis with a per-key TTL when
//! `REDIS_URL` is set, otherwise the in-process `MemorySessionStore`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::Client as RedisClient;
use tokio::time::Instant;
use uuid::Uuid;

use crate::errors::AppError;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "campus_session";

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Starts a session for `user_id` and returns its token.
    async fn create(&self, user_id: Uuid) -> Result<String, AppError>;

    /// Resolves a token to its user, `None` if unknown or expired.
    async fn lookup(&self, token: &str) -> Result<Option<Uuid>, AppError>;

    /// Ends a session. Unknown tokens are ignored.
    async fn destroy(&self, token: &str) -> Result<(), AppError>;
}

fn session_key(token: &str) -> String {
    format!("session:{token}")
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisSessionStore {
    client: RedisClient,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(client: RedisClient, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Session(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, user_id: Uuid) -> Result<String, AppError> {
        let token = Uuid::new_v4().simple().to_string();
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(session_key(&token))
            .arg(user_id.to_string())
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;
        Ok(token)
    }

    async fn lookup(&self, token: &str) -> Result<Option<Uuid>, AppError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(session_key(token))
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;
        Ok(value.and_then(|v| Uuid::parse_str(&v).ok()))
    }

    async fn destroy(&self, token: &str) -> Result<(), AppError> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(session_key(token))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Session(e.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

/// Process-local store. Sessions expire `ttl` after creation, like the
/// Redis keys do.
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, (Uuid, Instant)>>,
}

impl MemorySessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, (Uuid, Instant)>>, AppError> {
        self.sessions
            .lock()
            .map_err(|_| AppError::Session("session map poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: Uuid) -> Result<String, AppError> {
        let token = Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let mut sessions = self.lock()?;
        sessions.retain(|_, (_, expires_at)| *expires_at > now);
        sessions.insert(token.clone(), (user_id, now + self.ttl));
        Ok(token)
    }

    async fn lookup(&self, token: &str) -> Result<Option<Uuid>, AppError> {
        let mut sessions = self.lock()?;
        match sessions.get(token) {
            Some(&(user_id, expires_at)) if expires_at > Instant::now() => Ok(Some(user_id)),
            Some(_) => {
                sessions.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn destroy(&self, token: &str) -> Result<(), AppError> {
        self.lock()?.remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new(3600);
        let user_id = Uuid::new_v4();
        let token = store.create(user_id).await.unwrap();
        assert_eq!(store.lookup(&token).await.unwrap(), Some(user_id));

        store.destroy(&token).await.unwrap();
        assert_eq!(store.lookup(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tokens_are_unique_per_login() {
        let store = MemorySessionStore::new(3600);
        let user_id = Uuid::new_v4();
        let a = store.create(user_id).await.unwrap();
        let b = store.create(user_id).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.lookup(&a).await.unwrap(), Some(user_id));
        assert_eq!(store.lookup(&b).await.unwrap(), Some(user_id));
    }

    #[tokio::test]
    async fn test_destroy_unknown_token_is_noop() {
        let store = MemorySessionStore::new(3600);
        assert!(store.destroy("missing").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_sessions_expire_after_ttl() {
        let store = MemorySessionStore::new(60);
        let user_id = Uuid::new_v4();
        let token = store.create(user_id).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.lookup(&token).await.unwrap(), Some(user_id));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.lookup(&token).await.unwrap(), None);
        assert!(store.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_sweeps_expired_sessions() {
        let store = MemorySessionStore::new(60);
        let stale = store.create(Uuid::new_v4()).await.unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;
        let fresh = store.create(Uuid::new_v4()).await.unwrap();

        let sessions = store.lock().unwrap();
        assert!(!sessions.contains_key(&stale));
        assert!(sessions.contains_key(&fresh));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_session_key_is_namespaced() {
        assert_eq!(session_key("abc"), "session:abc");
    }
}
