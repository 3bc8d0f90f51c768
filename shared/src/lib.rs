//! Client-side core of the hackathon admin dashboard.
//!
//! Two independent controllers live here: [`query::PaginatedQuery`], which
//! drives any filtered, paginated list screen, and
//! [`refresh::RefreshScheduler`], which keeps the session's access token
//! fresh. Everything they need from the backend comes in through the
//! [`query::PageFetcher`] and [`refresh::TokenRefresher`] traits.

pub mod clock;
pub mod debounce;
pub mod error;
pub mod latest;
pub mod models;
pub mod query;
pub mod refresh;
pub mod session;

pub use error::ApiError;
pub use models::{
    AdminUser, FilterValue, Filters, HackathonRequest, Page, PageQuery, PaginationMeta, Plan,
    Subscription,
};
pub use query::{PageFetcher, PaginatedQuery, QueryConfig, QueryState, QueryStatus};
pub use refresh::{
    RefreshConfig, RefreshScheduler, RefreshStatus, RefreshedToken, SchedulerState,
    TokenRefresher,
};
pub use session::{Session, SessionFlag, SessionSnapshot, SessionStatus, SessionStore, SessionUser};
