//! Environment-driven settings.

use std::{env, time::Duration};

use hackadmin_shared::{FilterValue, QueryConfig};

const DEFAULT_API_BASE: &str = "http://localhost:3000/api";
const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 100;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;

/// Runtime settings, read from `HACKADMIN_*` environment variables and
/// overridable from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    /// Base URL of the backend API, without trailing slash.
    pub api_base: String,
    /// Rows per page.
    pub page_limit: u32,
    /// Delay before a search term is sent.
    pub search_debounce: Duration,
    /// Admin sign-in email.
    pub email: Option<String>,
    /// Admin sign-in password.
    pub password: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            email: None,
            password: None,
        }
    }
}

impl AdminConfig {
    /// Reads the `HACKADMIN_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unparseable numbers fall back to defaults; the page limit is clamped
    /// to `1..=100`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_base = read("HACKADMIN_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let page_limit = read("HACKADMIN_PAGE_LIMIT")
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        let search_debounce_ms = read("HACKADMIN_SEARCH_DEBOUNCE_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SEARCH_DEBOUNCE_MS);

        Self {
            api_base,
            page_limit,
            search_debounce: Duration::from_millis(search_debounce_ms),
            email: read("HACKADMIN_EMAIL"),
            password: read("HACKADMIN_PASSWORD"),
        }
    }

    /// Applies command-line values over the environment.
    pub fn with_overrides(
        mut self,
        api_base: Option<String>,
        email: Option<String>,
        password: Option<String>,
    ) -> Self {
        if let Some(api_base) = api_base {
            self.api_base = api_base;
        }
        if email.is_some() {
            self.email = email;
        }
        if password.is_some() {
            self.password = password;
        }
        self
    }

    /// List controller settings derived from this config.
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig::default()
            .with_limit(self.page_limit)
            .with_debounce(self.search_debounce)
    }
}

/// Command-line filter values: `true`/`false` and integers keep their type,
/// everything else is text.
pub fn parse_filter_value(raw: &str) -> FilterValue {
    let raw = raw.trim();
    match raw {
        "true" => FilterValue::Bool(true),
        "false" => FilterValue::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(FilterValue::Integer)
            .unwrap_or_else(|_| FilterValue::Text(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use hackadmin_shared::FilterValue;

    use super::{parse_filter_value, AdminConfig};

    fn config_from(pairs: &[(&str, &str)]) -> AdminConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AdminConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(config_from(&[]), AdminConfig::default());
    }

    #[test]
    fn reads_and_clamps_values() {
        let config = config_from(&[
            ("HACKADMIN_API_BASE", "https://admin.example.com/api"),
            ("HACKADMIN_PAGE_LIMIT", "500"),
            ("HACKADMIN_SEARCH_DEBOUNCE_MS", "250"),
            ("HACKADMIN_EMAIL", "root@example.com"),
        ]);
        assert_eq!(config.api_base, "https://admin.example.com/api");
        assert_eq!(config.page_limit, 100);
        assert_eq!(config.search_debounce, Duration::from_millis(250));
        assert_eq!(config.email.as_deref(), Some("root@example.com"));
        assert_eq!(config.password, None);

        assert_eq!(config_from(&[("HACKADMIN_PAGE_LIMIT", "0")]).page_limit, 1);
        assert_eq!(config_from(&[("HACKADMIN_PAGE_LIMIT", "lots")]).page_limit, 10);
    }

    #[test]
    fn overrides_only_replace_given_values() {
        let config = config_from(&[("HACKADMIN_EMAIL", "env@example.com")]).with_overrides(
            Some("http://127.0.0.1:9000/api".to_string()),
            None,
            Some("hunter2".to_string()),
        );
        assert_eq!(config.api_base, "http://127.0.0.1:9000/api");
        assert_eq!(config.email.as_deref(), Some("env@example.com"));
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn query_config_carries_limit_and_debounce() {
        let config = config_from(&[("HACKADMIN_PAGE_LIMIT", "25")]).query_config();
        assert_eq!(config.limit, 25);
        assert_eq!(config.debounce, Duration::from_millis(500));
    }

    #[test]
    fn filter_values_keep_simple_types() {
        assert_eq!(parse_filter_value("true"), FilterValue::Bool(true));
        assert_eq!(parse_filter_value("42"), FilterValue::Integer(42));
        assert_eq!(parse_filter_value(" pending "), FilterValue::Text("pending".to_string()));
    }
}
