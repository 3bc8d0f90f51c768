//! Command-line definition.

use clap::{Parser, Subcommand, ValueEnum};

/// Admin list resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resource {
    /// Hackathon creation requests awaiting review.
    Requests,
    /// Registered accounts.
    Users,
    /// Subscription plans.
    Plans,
    /// Billing subscriptions.
    Subscriptions,
}

impl Resource {
    /// Path segment under `{api_base}/admin/`.
    pub fn path(self) -> &'static str {
        match self {
            Resource::Requests => "hackathon-requests",
            Resource::Users => "users",
            Resource::Plans => "plans",
            Resource::Subscriptions => "subscriptions",
        }
    }
}

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "hackadmin", version, about = "Hackathon platform admin console")]
pub struct Cli {
    /// Backend API base URL (overrides HACKADMIN_API_BASE).
    #[arg(long, global = true)]
    pub api_base: Option<String>,
    /// Admin account email (overrides HACKADMIN_EMAIL).
    #[arg(long, global = true)]
    pub email: Option<String>,
    /// Admin account password (overrides HACKADMIN_PASSWORD).
    #[arg(long, global = true)]
    pub password: Option<String>,
    /// Action to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Print one page of a resource list as JSON.
    List {
        /// List to read.
        resource: Resource,
        /// Free-text search term.
        #[arg(long)]
        search: Option<String>,
        /// Extra filter as `key=value`; repeatable.
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Page size (defaults to HACKADMIN_PAGE_LIMIT).
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Approve a hackathon request.
    Approve {
        /// Request id.
        id: String,
    },
    /// Reject a hackathon request.
    Reject {
        /// Request id.
        id: String,
        /// Reason shown to the organizer.
        #[arg(long)]
        reason: String,
    },
    /// Browse a resource interactively; commands are read from stdin.
    Watch {
        /// List to browse.
        resource: Resource,
        /// Initial filter as `key=value`; repeatable.
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
}

/// Parses a `key=value` filter argument.
pub fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty filter key in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
