use anyhow::{Context, Result};

use crate::api::ApiClient;

/// Approves request `id` and prints the updated record.
pub async fn approve(api: &ApiClient, id: &str) -> Result<()> {
    let request = api
        .approve_request(id)
        .await
        .with_context(|| format!("failed to approve request {id}"))?;
    tracing::info!("approved hackathon request {id}");
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

/// Rejects request `id` with `reason` and prints the updated record.
pub async fn reject(api: &ApiClient, id: &str, reason: &str) -> Result<()> {
    let reason = reason.trim();
    anyhow::ensure!(!reason.is_empty(), "a rejection reason is required");
    let request = api
        .reject_request(id, reason)
        .await
        .with_context(|| format!("failed to reject request {id}"))?;
    tracing::info!("rejected hackathon request {id}");
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
