//! Proactive access-token refresh.
//!
//! The backend rotates the refresh credential on every renewal and hands the
//! new one back as a cookie, so the refresh call has to be made by the client
//! that owns the cookie jar. The scheduler watches the [`SessionStore`] and
//! keeps exactly one next action armed: a timer `buffer` before expiry, an
//! immediate refresh, or nothing.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    clock::{Clock, SystemClock},
    error::ApiError,
    session::{SessionFlag, SessionSnapshot, SessionStore},
};

/// How long before expiry a refresh is scheduled.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(2 * 60);
/// Minimum spacing between two refresh attempts.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Outcome of a successful refresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    /// New bearer token.
    pub access_token: String,
    /// Milliseconds since the Unix epoch.
    pub expires_at: i64,
}

/// Calls the backend refresh endpoint with the client's cookies.
#[async_trait]
pub trait TokenRefresher: Send + Sync + 'static {
    /// Renews the access token.
    async fn refresh(&self) -> Result<RefreshedToken, ApiError>;
}

#[async_trait]
impl<R: TokenRefresher + ?Sized> TokenRefresher for Arc<R> {
    async fn refresh(&self) -> Result<RefreshedToken, ApiError> {
        (**self).refresh().await
    }
}

/// Timing settings of a [`RefreshScheduler`].
#[derive(Debug, Clone, Copy)]
pub struct RefreshConfig {
    /// How long before expiry the refresh fires.
    pub buffer: Duration,
    /// Minimum spacing between the starts of two attempts.
    pub min_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_REFRESH_BUFFER,
            min_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }
}

/// What the scheduler will do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No authenticated session; nothing armed.
    NoSession,
    /// Timer armed for `at_ms` (epoch milliseconds).
    Scheduled {
        /// Epoch milliseconds the timer fires at.
        at_ms: i64,
    },
    /// A refresh call is in flight.
    Refreshing,
    /// The last refresh failed; nothing is armed until the session changes.
    RefreshFailed,
}

/// Observable state of a [`RefreshScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshStatus {
    /// Next action.
    pub state: SchedulerState,
    /// Cleared on the next success or when the session goes away.
    pub refresh_error: Option<ApiError>,
}

struct Inner {
    timer: Option<JoinHandle<()>>,
    in_flight: bool,
    last_attempt_at: Option<i64>,
    /// Set when the scheduler is dropped; attempts still running discard
    /// their result.
    disposed: bool,
}

struct Shared {
    store: SessionStore,
    refresher: Box<dyn TokenRefresher>,
    clock: Box<dyn Clock>,
    config: RefreshConfig,
    inner: Mutex<Inner>,
    status: watch::Sender<RefreshStatus>,
}

/// Keeps the session's access token fresh for as long as it is alive.
pub struct RefreshScheduler {
    shared: Arc<Shared>,
    watcher: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Starts watching `store` using the system clock.
    pub fn start<R>(store: SessionStore, refresher: R, config: RefreshConfig) -> Self
    where
        R: TokenRefresher,
    {
        Self::start_with_clock(store, refresher, config, SystemClock)
    }

    /// Starts watching `store` with an explicit clock.
    pub fn start_with_clock<R, C>(
        store: SessionStore,
        refresher: R,
        config: RefreshConfig,
        clock: C,
    ) -> Self
    where
        R: TokenRefresher,
        C: Clock,
    {
        let (status, _) = watch::channel(RefreshStatus {
            state: SchedulerState::NoSession,
            refresh_error: None,
        });
        let shared = Arc::new(Shared {
            store,
            refresher: Box::new(refresher),
            clock: Box::new(clock),
            config,
            inner: Mutex::new(Inner {
                timer: None,
                in_flight: false,
                last_attempt_at: None,
                disposed: false,
            }),
            status,
        });

        let mut rx = shared.store.subscribe();
        let initial = rx.borrow_and_update().clone();
        Shared::reconcile(&shared, &initial);

        let weak = Arc::downgrade(&shared);
        let watcher = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                match weak.upgrade() {
                    Some(shared) => Shared::reconcile(&shared, &snapshot),
                    None => break,
                }
            }
        });

        Self {
            shared,
            watcher,
        }
    }

    /// Refreshes now unless a refresh is already running, the previous
    /// attempt started less than `min_interval` ago, or there is no session.
    /// Returns whether the token was actually renewed.
    pub async fn refresh_token(&self) -> bool {
        self.shared.attempt(true).await
    }

    /// Whether a refresh call is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.shared.status.borrow().state == SchedulerState::Refreshing
    }

    /// Failure of the last attempt, if it has not since succeeded.
    pub fn refresh_error(&self) -> Option<ApiError> {
        self.shared.status.borrow().refresh_error.clone()
    }

    /// Next action.
    pub fn state(&self) -> SchedulerState {
        self.shared.status.borrow().state
    }

    /// Next action and last error.
    pub fn status(&self) -> RefreshStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<RefreshStatus> {
        self.shared.status.subscribe()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.watcher.abort();
        let mut inner = self.shared.inner.lock();
        inner.disposed = true;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
    }
}

impl Shared {
    fn reconcile(shared: &Arc<Self>, snapshot: &SessionSnapshot) {
        let now = shared.clock.now_ms();
        let mut inner = shared.inner.lock();
        if inner.disposed {
            return;
        }

        let Some(session) = snapshot.authenticated() else {
            if let Some(timer) = inner.timer.take() {
                timer.abort();
            }
            inner.last_attempt_at = None;
            shared.status.send_if_modified(|status| {
                let changed =
                    status.state != SchedulerState::NoSession || status.refresh_error.is_some();
                status.state = SchedulerState::NoSession;
                status.refresh_error = None;
                changed
            });
            return;
        };

        if inner.in_flight {
            return;
        }

        let due = session.access_token_expires_at - shared.config.buffer.as_millis() as i64;
        let flagged = session.error == Some(SessionFlag::AccessTokenExpired);
        let not_before = inner
            .last_attempt_at
            .map_or(i64::MIN, |last| last + shared.config.min_interval.as_millis() as i64);
        let fire_at = if flagged { now } else { due }.max(not_before);

        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }

        if fire_at <= now {
            drop(inner);
            tracing::debug!("access token due for refresh (flagged={flagged}), refreshing now");
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                shared.attempt(true).await;
            });
            return;
        }

        // The timer never fires before `not_before`, so it skips the interval check.
        let delay = Duration::from_millis((fire_at - now) as u64);
        let weak: Weak<Self> = Arc::downgrade(shared);
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                tokio::spawn(async move {
                    shared.attempt(false).await;
                });
            }
        }));
        tracing::debug!("access token refresh scheduled in {}s", delay.as_secs());
        shared.status.send_modify(|status| {
            status.state = SchedulerState::Scheduled {
                at_ms: fire_at,
            }
        });
    }

    async fn attempt(self: &Arc<Self>, enforce_interval: bool) -> bool {
        let now = self.clock.now_ms();
        let started_with = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return false;
            }
            if inner.in_flight {
                tracing::debug!("refresh already in flight, skipping");
                return false;
            }
            let min_interval = self.config.min_interval.as_millis() as i64;
            if let Some(last) = inner.last_attempt_at.filter(|_| enforce_interval) {
                if now - last < min_interval {
                    tracing::debug!("last refresh attempt {}ms ago, skipping", now - last);
                    return false;
                }
            }
            let Some(token) = self.store.access_token() else {
                return false;
            };
            inner.in_flight = true;
            inner.last_attempt_at = Some(now);
            if let Some(timer) = inner.timer.take() {
                timer.abort();
            }
            self.status
                .send_modify(|status| status.state = SchedulerState::Refreshing);
            token
        };

        let result = self.refresher.refresh().await;
        {
            let mut inner = self.inner.lock();
            inner.in_flight = false;
            if inner.disposed {
                tracing::debug!("scheduler stopped while refreshing, dropping result");
                return false;
            }
        }

        let same_session = self.store.access_token().as_deref() == Some(started_with.as_str());
        if !same_session {
            tracing::debug!("session changed while refreshing, dropping result");
            Shared::reconcile(self, &self.store.snapshot());
            return false;
        }

        match result {
            Ok(refreshed) => {
                tracing::info!(
                    "access token refreshed, expires at {}",
                    refreshed.expires_at
                );
                self.status.send_modify(|status| status.refresh_error = None);
                self.store
                    .update_token(refreshed.access_token, refreshed.expires_at);
                Shared::reconcile(self, &self.store.snapshot());
                true
            },
            Err(err) => {
                tracing::warn!("access token refresh failed: {err}");
                self.status.send_modify(|status| {
                    status.state = SchedulerState::RefreshFailed;
                    status.refresh_error = Some(err);
                });
                false
            },
        }
    }
}
