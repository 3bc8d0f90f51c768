//! Paginated list controller: filter and page state, debounced search,
//! latest-wins fetching.

use std::{
    collections::BTreeSet,
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    debounce::Debouncer,
    error::ApiError,
    latest::{LatestWins, Ticket},
    models::{FilterValue, Filters, Page, PageQuery, PaginationMeta},
};

/// Rows per page unless configured otherwise.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;
/// Quiet period before a debounced filter change is fetched.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Source of list pages for one screen.
///
/// The token is cancelled once the request is superseded; implementations
/// may use it to abort early, but the controller drops stale results either
/// way.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync + 'static {
    /// Fetches one page; should stop early once `cancel` fires.
    async fn fetch(&self, query: PageQuery, cancel: CancellationToken) -> Result<Page<T>, ApiError>;
}

#[async_trait]
impl<T, F, Fut> PageFetcher<T> for F
where
    T: Send + 'static,
    F: Fn(PageQuery, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page<T>, ApiError>> + Send + 'static,
{
    async fn fetch(&self, query: PageQuery, cancel: CancellationToken) -> Result<Page<T>, ApiError> {
        self(query, cancel).await
    }
}

/// Settings of a [`PaginatedQuery`].
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Rows per page.
    pub limit: u32,
    /// Debounce interval for keys in `debounced_keys`.
    pub debounce: Duration,
    /// Filter keys whose changes wait for the debounce interval.
    pub debounced_keys: BTreeSet<String>,
    /// Filters applied to the first fetch.
    pub initial_filters: Filters,
    /// Page of the first fetch, 1-indexed.
    pub initial_page: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            debounce: DEFAULT_SEARCH_DEBOUNCE,
            debounced_keys: BTreeSet::from(["search".to_string()]),
            initial_filters: Filters::new(),
            initial_page: 1,
        }
    }
}

impl QueryConfig {
    /// Sets the page size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Sets the debounce interval.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Replaces the set of debounced filter keys.
    pub fn with_debounced_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.debounced_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the initial filters.
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.initial_filters = filters;
        self
    }

    /// Sets the initial page; values below 1 become 1.
    pub fn with_page(mut self, page: u32) -> Self {
        self.initial_page = page.max(1);
        self
    }
}

/// Load state of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// A request is pending or about to be sent.
    Loading,
    /// The latest request finished.
    Loaded,
    /// The latest request failed; see `error`.
    Errored,
}

/// Everything a list screen renders.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    /// Current filters.
    pub filters: Filters,
    /// Current page, 1-indexed.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Rows of the last successful fetch.
    pub data: Vec<T>,
    /// Pagination of the last successful fetch.
    pub meta: Option<PaginationMeta>,
    /// Load state.
    pub status: QueryStatus,
    /// Failure of the latest request.
    pub error: Option<ApiError>,
}

impl<T> QueryState<T> {
    /// Whether a request is pending.
    pub fn loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    fn query(&self) -> PageQuery {
        PageQuery {
            filters: self.filters.clone(),
            page: self.page,
            limit: self.limit,
        }
    }

    fn accepts_page(&self, page: u32) -> bool {
        page >= 1
            && page != self.page
            && self.meta.map_or(true, |meta| page <= meta.total_pages)
    }
}

struct Core {
    sequencer: LatestWins,
    debouncer: Debouncer,
    disposed: bool,
}

struct Shared<T> {
    fetcher: Arc<dyn PageFetcher<T>>,
    debounced_keys: BTreeSet<String>,
    // Guards sequencing; every write to `state` happens while it is held.
    core: Mutex<Core>,
    state: watch::Sender<QueryState<T>>,
}

/// Owns the query state of one list screen.
///
/// Create it with [`PaginatedQuery::spawn`] when the screen mounts; dropping
/// it (or calling [`PaginatedQuery::dispose`]) cancels the pending debounce
/// and the in-flight request.
pub struct PaginatedQuery<T> {
    shared: Arc<Shared<T>>,
}

impl<T> PaginatedQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Mounts the controller and issues the first fetch right away.
    pub fn spawn<F>(fetcher: F, config: QueryConfig) -> Self
    where
        F: PageFetcher<T>,
    {
        let limit = config.limit.max(1);
        let initial = QueryState {
            filters: config.initial_filters,
            page: config.initial_page.max(1),
            limit,
            data: Vec::new(),
            meta: None,
            status: QueryStatus::Loading,
            error: None,
        };
        let (state, _) = watch::channel(initial);
        let shared = Arc::new(Shared {
            fetcher: Arc::new(fetcher),
            debounced_keys: config.debounced_keys,
            core: Mutex::new(Core {
                sequencer: LatestWins::new(),
                debouncer: Debouncer::new(config.debounce),
                disposed: false,
            }),
            state,
        });

        {
            let mut core = shared.core.lock();
            Shared::dispatch(&shared, &mut core, false);
        }

        Self {
            shared,
        }
    }

    /// Sets or clears one filter. `None` and empty text remove the key.
    ///
    /// A change resets the page to 1 and refetches, after the debounce
    /// interval when `key` is configured as debounced.
    pub fn set_filter(&self, key: &str, value: Option<FilterValue>) -> bool {
        let debounced = self.shared.debounced_keys.contains(key);
        self.update_filters(debounced, |filters| filters.set(key, value))
    }

    /// Replaces the whole filter map.
    pub fn set_filters(&self, filters: Filters) -> bool {
        self.update_filters(false, move |current| {
            if *current == filters {
                return false;
            }
            *current = filters;
            true
        })
    }

    /// Removes every filter and refetches page 1 immediately.
    pub fn clear_filters(&self) -> bool {
        self.update_filters(false, Filters::clear)
    }

    /// Jumps to `page`. Out-of-range pages are ignored.
    pub fn set_page(&self, page: u32) -> bool {
        self.navigate(|_| Some(page))
    }

    /// Moves forward one page when the last response says there is one.
    pub fn next_page(&self) -> bool {
        self.navigate(|state| {
            state
                .meta
                .filter(|meta| meta.has_next_page)
                .map(|_| state.page + 1)
        })
    }

    /// Moves back one page when there is one.
    pub fn prev_page(&self) -> bool {
        self.navigate(|state| {
            let has_prev = state.meta.map_or(state.page > 1, |meta| meta.has_prev_page);
            has_prev.then(|| state.page.saturating_sub(1))
        })
    }

    /// Jumps to page 1.
    pub fn go_to_first_page(&self) -> bool {
        self.navigate(|_| Some(1))
    }

    /// Jumps to the last page known from the latest metadata.
    pub fn go_to_last_page(&self) -> bool {
        self.navigate(|state| state.meta.map(|meta| meta.total_pages))
    }

    /// Re-issues the current query.
    pub fn refresh(&self) -> bool {
        let mut core = self.shared.core.lock();
        if core.disposed {
            return false;
        }
        Shared::dispatch(&self.shared, &mut core, false);
        true
    }

    /// Cancels the pending debounce and the in-flight request. Later calls
    /// on this controller are ignored.
    pub fn dispose(&self) {
        if self.shared.shutdown() {
            tracing::debug!("list controller disposed");
        }
    }

    /// Snapshot of the whole state.
    pub fn state(&self) -> QueryState<T> {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.shared.state.subscribe()
    }

    /// Items of the current page, empty before the first load or after an
    /// error.
    pub fn data(&self) -> Vec<T> {
        self.shared.state.borrow().data.clone()
    }

    /// Pagination of the current page.
    pub fn meta(&self) -> Option<PaginationMeta> {
        self.shared.state.borrow().meta
    }

    /// Whether a request is pending.
    pub fn loading(&self) -> bool {
        self.shared.state.borrow().loading()
    }

    /// Failure of the latest request.
    pub fn error(&self) -> Option<ApiError> {
        self.shared.state.borrow().error.clone()
    }

    /// Current page.
    pub fn page(&self) -> u32 {
        self.shared.state.borrow().page
    }

    /// Current filters.
    pub fn filters(&self) -> Filters {
        self.shared.state.borrow().filters.clone()
    }

    fn update_filters(&self, debounced: bool, mutate: impl FnOnce(&mut Filters) -> bool) -> bool {
        let mut core = self.shared.core.lock();
        if core.disposed {
            return false;
        }
        let changed = self.shared.state.send_if_modified(|state| {
            let changed = mutate(&mut state.filters);
            if changed {
                state.page = 1;
            }
            changed
        });
        if changed {
            Shared::dispatch(&self.shared, &mut core, debounced);
        }
        changed
    }

    fn navigate(&self, target: impl FnOnce(&QueryState<T>) -> Option<u32>) -> bool {
        let mut core = self.shared.core.lock();
        if core.disposed {
            return false;
        }
        let changed = self.shared.state.send_if_modified(|state| match target(state) {
            Some(page) if state.accepts_page(page) => {
                state.page = page;
                true
            },
            _ => false,
        });
        if changed {
            Shared::dispatch(&self.shared, &mut core, false);
        }
        changed
    }
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn dispatch(shared: &Arc<Self>, core: &mut Core, debounced: bool) {
        if debounced {
            // The in-flight request no longer matches the filters; it must not
            // land while the debounce is pending.
            core.sequencer.cancel();
            shared.state.send_modify(|state| {
                state.status = QueryStatus::Loading;
                state.error = None;
            });
            let weak: Weak<Self> = Arc::downgrade(shared);
            core.debouncer.call(move || {
                if let Some(shared) = weak.upgrade() {
                    let mut core = shared.core.lock();
                    if !core.disposed {
                        Shared::start_fetch(&shared, &mut core);
                    }
                }
            });
        } else {
            core.debouncer.cancel();
            Shared::start_fetch(shared, core);
        }
    }

    fn start_fetch(shared: &Arc<Self>, core: &mut Core) {
        let ticket = core.sequencer.begin();
        let query = shared.state.borrow().query();
        shared.state.send_modify(|state| {
            state.status = QueryStatus::Loading;
            state.error = None;
        });
        tracing::debug!(
            "list request #{} page={} filters={:?}",
            ticket.id(),
            query.page,
            query.filters
        );

        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = ticket.token().cancelled() => Err(ApiError::Cancelled),
                result = shared.fetcher.fetch(query, ticket.token().clone()) => result,
            };
            shared.apply(&ticket, outcome);
        });
    }

    fn apply(&self, ticket: &Ticket, outcome: Result<Page<T>, ApiError>) {
        let core = self.core.lock();
        if !core.sequencer.is_current(ticket) {
            tracing::debug!("discarding stale list response #{}", ticket.id());
            return;
        }

        match outcome {
            Ok(page) => self.state.send_modify(|state| {
                state.data = page.data;
                state.meta = Some(page.meta);
                state.status = QueryStatus::Loaded;
                state.error = None;
            }),
            Err(err) if err.is_cancelled() => {
                tracing::debug!("list request #{} aborted by fetcher", ticket.id());
                self.state.send_modify(|state| state.status = QueryStatus::Loaded);
            },
            Err(err) => {
                tracing::warn!("list request #{} failed: {err}", ticket.id());
                self.state.send_modify(|state| {
                    state.data.clear();
                    state.meta = None;
                    state.status = QueryStatus::Errored;
                    state.error = Some(err);
                });
            },
        }
    }
}

impl<T> Shared<T> {
    fn shutdown(&self) -> bool {
        let mut core = self.core.lock();
        if core.disposed {
            return false;
        }
        core.disposed = true;
        core.debouncer.cancel();
        core.sequencer.cancel();
        true
    }
}

impl<T> Drop for PaginatedQuery<T> {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::QueryState;
    use crate::models::{Filters, PaginationMeta};

    fn state(page: u32, meta: Option<PaginationMeta>) -> QueryState<()> {
        QueryState {
            filters: Filters::new(),
            page,
            limit: 10,
            data: Vec::new(),
            meta,
            status: super::QueryStatus::Loaded,
            error: None,
        }
    }

    #[test]
    fn accepts_page_within_known_bounds() {
        let loaded = state(2, Some(PaginationMeta::from_total(2, 10, 30)));
        assert!(loaded.accepts_page(1));
        assert!(loaded.accepts_page(3));
        assert!(!loaded.accepts_page(0));
        assert!(!loaded.accepts_page(2));
        assert!(!loaded.accepts_page(4));
    }

    #[test]
    fn accepts_any_positive_page_before_metadata() {
        let fresh = state(1, None);
        assert!(fresh.accepts_page(7));
        assert!(!fresh.accepts_page(0));
    }
}
