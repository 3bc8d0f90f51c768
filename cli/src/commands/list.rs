use anyhow::{anyhow, Result};
use hackadmin_shared::{
    AdminUser, Filters, HackathonRequest, PaginatedQuery, Plan, QueryConfig, QueryState, Subscription,
};
use serde::Serialize;
use serde_json::json;

use crate::{
    api::{AdminList, ApiClient},
    cli::Resource,
    config::AdminConfig,
};

/// Fetches one page through a list controller and prints it as JSON.
pub async fn run(
    api: &ApiClient,
    config: &AdminConfig,
    resource: Resource,
    filters: Filters,
    page: u32,
    limit: Option<u32>,
) -> Result<()> {
    let mut query_config = config
        .query_config()
        .with_filters(filters)
        .with_page(page);
    if let Some(limit) = limit {
        query_config = query_config.with_limit(limit.clamp(1, 100));
    }

    match resource {
        Resource::Requests => print_page::<HackathonRequest>(api, resource, query_config).await,
        Resource::Users => print_page::<AdminUser>(api, resource, query_config).await,
        Resource::Plans => print_page::<Plan>(api, resource, query_config).await,
        Resource::Subscriptions => print_page::<Subscription>(api, resource, query_config).await,
    }
}

async fn print_page<T>(api: &ApiClient, resource: Resource, config: QueryConfig) -> Result<()>
where
    T: AdminList + Serialize + Clone + Sync,
{
    let query = PaginatedQuery::spawn(api.list_fetcher::<T>(), config);
    let state = settled(&query).await;
    query.dispose();

    if let Some(err) = state.error {
        return Err(anyhow!("failed to list {}: {err}", resource.path()));
    }
    let output = json!({
        "data": state.data,
        "meta": state.meta,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Waits for the in-flight fetch to land.
pub(crate) async fn settled<T>(query: &PaginatedQuery<T>) -> QueryState<T>
where
    T: Clone + Send + Sync + 'static,
{
    let mut updates = query.subscribe();
    let state = match updates.wait_for(|state| !state.loading()).await {
        Ok(state) => state.clone(),
        Err(_) => query.state(),
    };
    state
}
