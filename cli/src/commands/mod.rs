//! Subcommand implementations, dispatched by [`run`].

/// One-shot page listing.
pub mod list;
/// Review actions on hackathon requests.
pub mod review;
/// Interactive list screen.
pub mod watch;

use anyhow::{bail, Context, Result};
use hackadmin_shared::{Filters, SessionStore};

use crate::{
    api::ApiClient,
    cli::{Cli, Commands},
    config::{parse_filter_value, AdminConfig},
};

/// Signs in, runs the chosen command, then signs out.
pub async fn run(cli: Cli) -> Result<()> {
    let config = AdminConfig::from_env().with_overrides(cli.api_base, cli.email, cli.password);
    let api = ApiClient::new(&config.api_base, SessionStore::new())?;

    let (Some(email), Some(password)) = (config.email.as_deref(), config.password.as_deref())
    else {
        bail!("admin credentials missing: set HACKADMIN_EMAIL and HACKADMIN_PASSWORD");
    };
    api.sign_in(email, password)
        .await
        .with_context(|| format!("sign-in to {} failed", config.api_base))?;

    let result = match cli.command {
        Commands::List {
            resource,
            search,
            filters,
            page,
            limit,
        } => {
            let filters = build_filters(search, filters);
            list::run(&api, &config, resource, filters, page, limit).await
        },
        Commands::Approve {
            id,
        } => review::approve(&api, &id).await,
        Commands::Reject {
            id,
            reason,
        } => review::reject(&api, &id, &reason).await,
        Commands::Watch {
            resource,
            filters,
        } => watch::run(&api, &config, resource, build_filters(None, filters)).await,
    };

    api.sign_out().await;
    result
}

fn build_filters(search: Option<String>, pairs: Vec<(String, String)>) -> Filters {
    let mut filters = Filters::new();
    for (key, value) in pairs {
        filters.set(key, Some(parse_filter_value(&value)));
    }
    if let Some(search) = search {
        filters.set("search", Some(search.trim().into()));
    }
    filters
}

#[cfg(test)]
mod tests {
    use hackadmin_shared::FilterValue;

    use super::build_filters;

    #[test]
    fn build_filters_drops_empty_values() {
        let filters = build_filters(
            Some("  ".to_string()),
            vec![
                ("status".to_string(), "pending".to_string()),
                ("owner".to_string(), String::new()),
            ],
        );
        assert_eq!(filters.len(), 1);
        assert_eq!(filters.get("status"), Some(&FilterValue::Text("pending".to_string())));
    }
}
