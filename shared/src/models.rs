//! Wire types of the admin list endpoints.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A primitive filter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean filter.
    Bool(bool),
    /// Integer filter.
    Integer(i64),
    /// Free text; empty text means no filter.
    Text(String),
}

impl FilterValue {
    /// Empty text carries no filtering intent.
    pub fn is_empty(&self) -> bool {
        matches!(self, FilterValue::Text(text) if text.is_empty())
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(value) => write!(f, "{value}"),
            FilterValue::Integer(value) => write!(f, "{value}"),
            FilterValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// Filter map of a list view. Keys are unique and never map to empty values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<String, FilterValue>);

impl Filters {
    /// Empty filter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value set for `key`.
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    /// Sets or clears `key`. `None` and empty text both remove the entry.
    /// Returns whether the map changed.
    pub fn set(&mut self, key: impl Into<String>, value: Option<FilterValue>) -> bool {
        let key = key.into();
        match value.filter(|value| !value.is_empty()) {
            Some(value) => {
                if self.0.get(&key) == Some(&value) {
                    return false;
                }
                self.0.insert(key, value);
                true
            },
            None => self.0.remove(&key).is_some(),
        }
    }

    /// Builder form of [`Filters::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.set(key, Some(value.into()));
        self
    }

    /// Removes every key. Returns whether anything was removed.
    pub fn clear(&mut self) -> bool {
        let changed = !self.0.is_empty();
        self.0.clear();
        changed
    }

    /// Whether no filter is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of filters set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Filters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Key/value pairs ready for a URL query string.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Filters::new();
        for (key, value) in iter {
            filters.set(key, Some(value.into()));
        }
        filters
    }
}

/// Argument of every list fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// Active filters.
    pub filters: Filters,
    /// 1-indexed.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl PageQuery {
    /// `page`, `limit`, then every filter, as URL query pairs.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        pairs.extend(self.filters.to_query_pairs());
        pairs
    }
}

/// Pagination block of a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// 1-indexed page returned.
    pub page: u32,
    /// Page size used.
    pub limit: u32,
    /// Total matching rows.
    pub total: u64,
    /// Number of pages, 0 for an empty list.
    pub total_pages: u32,
    /// Whether `page + 1` exists.
    pub has_next_page: bool,
    /// Whether `page - 1` exists.
    pub has_prev_page: bool,
}

impl PaginationMeta {
    /// Derives page counts and neighbours from a total item count.
    pub fn from_total(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total.div_ceil(u64::from(limit)) as u32;
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows of this page.
    pub data: Vec<T>,
    /// Position of this page within the list.
    pub meta: PaginationMeta,
}

/// A request to host a hackathon, pending admin review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HackathonRequest {
    /// Request id.
    pub id: String,
    /// Proposed hackathon title.
    pub title: String,
    /// Name of the requesting organizer.
    #[serde(default)]
    pub organizer: String,
    /// Review status as reported by the backend.
    #[serde(default)]
    pub status: String,
    /// Submission timestamp, as sent.
    #[serde(default)]
    pub submitted_at: Option<String>,
}

/// A platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    /// Account id.
    pub id: String,
    /// Login email.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Platform role.
    #[serde(default)]
    pub role: String,
    /// Whether the account can sign in.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A subscription plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Plan id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Smallest currency unit.
    #[serde(default)]
    pub price_cents: i64,
    /// ISO currency code.
    #[serde(default)]
    pub currency: String,
    /// Billing interval, e.g. `month`.
    #[serde(default)]
    pub interval: String,
    /// Whether new subscriptions may use the plan.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A user's billing subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Subscription id.
    pub id: String,
    /// Subscribed account.
    pub user_id: String,
    /// Subscribed plan.
    pub plan_id: String,
    /// Billing status.
    #[serde(default)]
    pub status: String,
    /// End of the current billing period, as sent.
    #[serde(default)]
    pub current_period_end: Option<String>,
}

fn default_true() -> bool {
    true
}
