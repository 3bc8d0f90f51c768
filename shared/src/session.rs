//! Process-wide authenticated session with publish/subscribe updates.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Whether a session can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Signed out.
    Unauthenticated,
    /// Signed in with a usable token.
    Authenticated,
    /// Sign-in in progress.
    Pending,
}

/// Server-side verdict attached to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionFlag {
    /// The access token is already known to be expired; refresh immediately.
    AccessTokenExpired,
}

/// The signed-in admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// Account id.
    pub id: String,
    /// Login email.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Platform role.
    #[serde(default)]
    pub role: Option<String>,
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Signed-in user, when the backend returned one.
    pub user: Option<SessionUser>,
    /// Bearer token sent with API calls.
    pub access_token: String,
    /// Milliseconds since the Unix epoch.
    pub access_token_expires_at: i64,
    /// Server-side flag on the token.
    pub error: Option<SessionFlag>,
}

/// Status plus session, as published by [`SessionStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Session status.
    pub status: SessionStatus,
    /// Current session, if any.
    pub session: Option<Session>,
}

impl SessionSnapshot {
    /// The session, if the status says it may be used.
    pub fn authenticated(&self) -> Option<&Session> {
        match self.status {
            SessionStatus::Authenticated => self.session.as_ref(),
            _ => None,
        }
    }
}

/// Single writer-guarded session value.
///
/// Sign-in, sign-out and the refresh scheduler write; everyone else reads the
/// token through [`SessionStore::access_token`] right before each request.
/// Clones share the same underlying session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Unauthenticated store.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionSnapshot {
            status: SessionStatus::Unauthenticated,
            session: None,
        });
        Self {
            tx: Arc::new(tx),
        }
    }

    /// Current status and session.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.tx.borrow().status
    }

    /// Token to send right now, if authenticated.
    pub fn access_token(&self) -> Option<String> {
        self.tx
            .borrow()
            .authenticated()
            .map(|session| session.access_token.clone())
    }

    /// Expiry of the current token, if authenticated.
    pub fn access_token_expires_at(&self) -> Option<i64> {
        self.tx
            .borrow()
            .authenticated()
            .map(|session| session.access_token_expires_at)
    }

    /// Marks a sign-in as in progress.
    pub fn set_pending(&self) {
        self.tx.send_modify(|snapshot| {
            snapshot.status = SessionStatus::Pending;
            snapshot.session = None;
        });
    }

    /// Starts an authenticated session.
    pub fn sign_in(&self, user: Option<SessionUser>, access_token: String, expires_at: i64) {
        self.tx.send_replace(SessionSnapshot {
            status: SessionStatus::Authenticated,
            session: Some(Session {
                user,
                access_token,
                access_token_expires_at: expires_at,
                error: None,
            }),
        });
    }

    /// Replaces token and expiry together and clears any server flag.
    /// Returns false when there is no authenticated session to update.
    pub fn update_token(&self, access_token: String, expires_at: i64) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.status != SessionStatus::Authenticated {
                return false;
            }
            match snapshot.session.as_mut() {
                Some(session) => {
                    session.access_token = access_token;
                    session.access_token_expires_at = expires_at;
                    session.error = None;
                    true
                },
                None => false,
            }
        })
    }

    /// Records that the server considers the current token expired.
    pub fn flag_expired(&self) -> bool {
        self.tx.send_if_modified(|snapshot| {
            match snapshot.session.as_mut() {
                Some(session) if snapshot.status == SessionStatus::Authenticated => {
                    session.error = Some(SessionFlag::AccessTokenExpired);
                    true
                },
                _ => false,
            }
        })
    }

    /// Drops the session.
    pub fn sign_out(&self) {
        self.tx.send_replace(SessionSnapshot {
            status: SessionStatus::Unauthenticated,
            session: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionFlag, SessionStatus, SessionStore};

    #[test]
    fn update_token_replaces_token_and_expiry_together() {
        let store = SessionStore::new();
        store.sign_in(None, "old".to_string(), 1_000);
        store.flag_expired();

        assert!(store.update_token("new".to_string(), 2_000));
        let snapshot = store.snapshot();
        let session = snapshot.authenticated().expect("authenticated");
        assert_eq!(session.access_token, "new");
        assert_eq!(session.access_token_expires_at, 2_000);
        assert_eq!(session.error, None);
    }

    #[test]
    fn update_token_without_session_is_rejected() {
        let store = SessionStore::new();
        assert!(!store.update_token("tok".to_string(), 1));
        assert_eq!(store.access_token(), None);

        store.set_pending();
        assert!(!store.update_token("tok".to_string(), 1));
        assert_eq!(store.status(), SessionStatus::Pending);
    }

    #[tokio::test]
    async fn subscribers_observe_sign_out() {
        let store = SessionStore::new();
        store.sign_in(None, "tok".to_string(), 1_000);
        let mut rx = store.subscribe();

        store.sign_out();
        rx.changed().await.expect("store alive");
        assert_eq!(rx.borrow().status, SessionStatus::Unauthenticated);
        assert_eq!(store.access_token(), None);
    }

    #[test]
    fn flag_expired_marks_session() {
        let store = SessionStore::new();
        assert!(!store.flag_expired());
        store.sign_in(None, "tok".to_string(), 1_000);
        assert!(store.flag_expired());
        assert_eq!(
            store.snapshot().session.and_then(|session| session.error),
            Some(SessionFlag::AccessTokenExpired)
        );
    }
}
