//! Application state shared across handlers.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use rand::distr::Alphanumeric;
use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use hvacmon_store::{Store, User};
use hvacmon_types::Role;

use crate::config::Config;

/// Length of generated session tokens.
const TOKEN_LENGTH: usize = 48;

/// Shared application state.
pub struct AppState {
    /// The data store (wrapped in Mutex for thread-safe access).
    pub store: Mutex<Store>,
    /// Configuration (RwLock for runtime updates).
    pub config: RwLock<Config>,
    /// Active session tokens and who they belong to.
    sessions: RwLock<HashMap<String, Session>>,
}

/// A logged-in session.
#[derive(Debug, Clone)]
struct Session {
    username: String,
    role: Role,
    expires_at: OffsetDateTime,
}

/// The authenticated caller, attached to requests by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: Role,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: Store, config: Config) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(store),
            config: RwLock::new(config),
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Issue a session token for a verified account.
    ///
    /// The token expires after `auth.session_ttl_secs` from the config.
    pub async fn create_session(&self, user: &User) -> String {
        let ttl = {
            let config = self.config.read().await;
            Duration::seconds(config.auth.session_ttl_secs as i64)
        };
        let token = generate_token();

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            token.clone(),
            Session {
                username: user.username.clone(),
                role: user.role,
                expires_at: OffsetDateTime::now_utc() + ttl,
            },
        );
        debug!("Issued session for {}", user.username);

        token
    }

    /// Resolve a token to its user, dropping the session if expired.
    pub async fn session_user(&self, token: &str) -> Option<AuthUser> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(session) if session.expires_at > OffsetDateTime::now_utc() => {
                    return Some(AuthUser {
                        username: session.username.clone(),
                        role: session.role,
                    });
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Token exists but is expired; remove it
        let mut sessions = self.sessions.write().await;
        sessions.remove(token);
        None
    }

    /// Drop a session. Returns whether the token was active.
    pub async fn revoke_session(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token).is_some()
    }

    /// Drop every session belonging to a username. Used when an
    /// account is deleted.
    pub async fn revoke_sessions_for(&self, username: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| session.username != username);
    }
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(role: Role) -> User {
        User {
            id: 1,
            username: "ops".to_string(),
            password_hash: String::new(),
            role,
            full_name: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn test_state() -> Arc<AppState> {
        let store = Store::open_in_memory().unwrap();
        AppState::new(store, Config::default())
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let state = test_state();
        let token = state.create_session(&test_user(Role::Supervisor)).await;
        assert_eq!(token.len(), TOKEN_LENGTH);

        let user = state.session_user(&token).await.unwrap();
        assert_eq!(user.username, "ops");
        assert_eq!(user.role, Role::Supervisor);
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let state = test_state();
        assert!(state.session_user("not-a-token").await.is_none());
    }

    #[tokio::test]
    async fn test_revoke_session() {
        let state = test_state();
        let token = state.create_session(&test_user(Role::Operator)).await;

        assert!(state.revoke_session(&token).await);
        assert!(state.session_user(&token).await.is_none());
        assert!(!state.revoke_session(&token).await);
    }

    #[tokio::test]
    async fn test_expired_session_dropped() {
        let state = test_state();
        {
            let mut config = state.config.write().await;
            config.auth.session_ttl_secs = 0;
        }
        // TTL of zero expires immediately; validation normally forbids
        // this, which makes it handy for the expiry path
        let token = state.create_session(&test_user(Role::Admin)).await;
        assert!(state.session_user(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_revoke_sessions_for_username() {
        let state = test_state();
        let t1 = state.create_session(&test_user(Role::Operator)).await;
        let t2 = state.create_session(&test_user(Role::Operator)).await;

        state.revoke_sessions_for("ops").await;
        assert!(state.session_user(&t1).await.is_none());
        assert!(state.session_user(&t2).await.is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }
}
