use anyhow::{anyhow, Result};
use hackadmin_shared::{
    AdminUser, Filters, HackathonRequest, PaginatedQuery, Plan, QueryConfig, QueryState, QueryStatus,
    RefreshConfig, RefreshScheduler, Subscription,
};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    api::{AdminList, ApiClient},
    cli::{parse_filter, Resource},
    config::{parse_filter_value, AdminConfig},
};

const HELP: &str = "type to search, or :next :prev :first :last :page N :filter k=v :clear \
                    :refresh :help :quit";

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Plain text: the new search term (empty clears it).
    Search(String),
    /// `:next`
    Next,
    /// `:prev`
    Prev,
    /// `:first`
    First,
    /// `:last`
    Last,
    /// `:page N`
    Page(u32),
    /// `:filter key=value`; an empty value clears the key.
    Filter(String, String),
    /// `:clear`
    Clear,
    /// `:refresh`
    Refresh,
    /// `:help`
    Help,
    /// `:quit`
    Quit,
    /// Unparseable command, with the message to show.
    Invalid(String),
}

/// Classifies one line of stdin.
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix(':') else {
        return Input::Search(line.to_string());
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "next" | "n" => Input::Next,
        "prev" | "p" => Input::Prev,
        "first" => Input::First,
        "last" => Input::Last,
        "page" => arg
            .parse::<u32>()
            .map(Input::Page)
            .unwrap_or_else(|_| Input::Invalid(format!("not a page number: `{arg}`"))),
        "filter" => match parse_filter(arg) {
            Ok((key, value)) => Input::Filter(key, value),
            Err(err) => Input::Invalid(err),
        },
        "clear" => Input::Clear,
        "refresh" | "r" => Input::Refresh,
        "help" | "h" => Input::Help,
        "quit" | "q" => Input::Quit,
        other => Input::Invalid(format!("unknown command `:{other}`")),
    }
}

/// Runs the interactive screen until stdin closes or `:quit`.
pub async fn run(
    api: &ApiClient,
    config: &AdminConfig,
    resource: Resource,
    filters: Filters,
) -> Result<()> {
    let scheduler =
        RefreshScheduler::start(api.session().clone(), api.clone(), RefreshConfig::default());
    let query_config = config.query_config().with_filters(filters);

    match resource {
        Resource::Requests => browse::<HackathonRequest>(api, &scheduler, resource, query_config).await,
        Resource::Users => browse::<AdminUser>(api, &scheduler, resource, query_config).await,
        Resource::Plans => browse::<Plan>(api, &scheduler, resource, query_config).await,
        Resource::Subscriptions => {
            browse::<Subscription>(api, &scheduler, resource, query_config).await
        },
    }
}

async fn browse<T>(
    api: &ApiClient,
    scheduler: &RefreshScheduler,
    resource: Resource,
    config: QueryConfig,
) -> Result<()>
where
    T: AdminList + Serialize + Clone + Sync,
{
    let query = PaginatedQuery::spawn(api.list_fetcher::<T>(), config);
    let mut updates = query.subscribe();
    let mut auth = scheduler.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("{HELP}");

    let outcome = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = updates.borrow_and_update().clone();
                render(resource, &state);
            },
            changed = auth.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let status = auth.borrow_and_update().clone();
                if let Some(err) = status.refresh_error {
                    eprintln!("session refresh failed: {err}");
                    if err.is_auth_failure() {
                        break Err(anyhow!("session can no longer be refreshed: {err}"));
                    }
                }
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break Ok(());
                };
                if !apply_input(&query, parse_input(&line)) {
                    break Ok(());
                }
            },
        }
    };

    query.dispose();
    outcome
}

/// Returns `false` when the user asked to quit.
fn apply_input<T>(query: &PaginatedQuery<T>, input: Input) -> bool
where
    T: Clone + Send + Sync + 'static,
{
    let changed = match input {
        Input::Search(term) => {
            let value = (!term.is_empty()).then(|| term.into());
            query.set_filter("search", value)
        },
        Input::Next => query.next_page(),
        Input::Prev => query.prev_page(),
        Input::First => query.go_to_first_page(),
        Input::Last => query.go_to_last_page(),
        Input::Page(page) => query.set_page(page),
        Input::Filter(key, value) => {
            let value = (!value.is_empty()).then(|| parse_filter_value(&value));
            query.set_filter(&key, value)
        },
        Input::Clear => query.clear_filters(),
        Input::Refresh => query.refresh(),
        Input::Help => {
            eprintln!("{HELP}");
            return true;
        },
        Input::Quit => return false,
        Input::Invalid(message) => {
            eprintln!("{message}");
            return true;
        },
    };
    if !changed {
        tracing::debug!("input left the query unchanged");
    }
    true
}

fn render<T: Serialize>(resource: Resource, state: &QueryState<T>) {
    println!("{}", summary_line(resource, state));
    if state.status != QueryStatus::Loaded {
        return;
    }
    for item in &state.data {
        match serde_json::to_string(item) {
            Ok(line) => println!("  {line}"),
            Err(err) => tracing::warn!("failed to render row: {err}"),
        }
    }
}

/// One-line status of the list: resource, position, filters and load state.
pub fn summary_line<T>(resource: Resource, state: &QueryState<T>) -> String {
    let filters = state
        .filters
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ");
    let position = match &state.meta {
        Some(meta) => format!(
            "page {}/{} ({} total)",
            state.page,
            meta.total_pages.max(1),
            meta.total
        ),
        None => format!("page {}", state.page),
    };
    let status = match state.status {
        QueryStatus::Loading => "loading".to_string(),
        QueryStatus::Loaded => format!("{} rows", state.data.len()),
        QueryStatus::Errored => match &state.error {
            Some(err) => format!("error: {err}"),
            None => "error".to_string(),
        },
    };

    if filters.is_empty() {
        format!("[{}] {position} · {status}", resource.path())
    } else {
        format!("[{}] {position} [{filters}] · {status}", resource.path())
    }
}
