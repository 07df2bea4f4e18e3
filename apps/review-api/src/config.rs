//! Command-line and environment configuration

use clap::Parser;

/// Command-line arguments for the review API server
#[derive(Parser, Debug, Clone)]
#[command(name = "review-api")]
#[command(about = "Review collection, moderation and review-request email service")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3001")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// SQLite connection string; defaults to a file in the user data directory
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Shared secret expected in `X-Webhook-Secret` on order webhooks
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Bearer key for the queue processor and the email send endpoint
    #[arg(long, env = "SERVICE_ROLE_KEY", hide_env_values = true)]
    pub service_key: Option<String>,

    /// Bearer token for the moderation endpoints
    #[arg(long, env = "ADMIN_API_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Credentials the server checks on incoming requests.
///
/// Empty values count as unset.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// When unset, order webhooks are accepted without a secret
    pub webhook_secret: Option<String>,
    /// When unset, service endpoints reject every caller
    pub service_key: Option<String>,
    /// When unset, moderation endpoints reject every caller
    pub admin_token: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<&Args> for AppConfig {
    fn from(args: &Args) -> Self {
        Self {
            webhook_secret: non_empty(args.webhook_secret.clone()),
            service_key: non_empty(args.service_key.clone()),
            admin_token: non_empty(args.admin_token.clone()),
        }
    }
}
