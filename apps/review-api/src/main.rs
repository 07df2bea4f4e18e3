use anyhow::Result;
use clap::Parser;
use review_api::{router, AppConfig, AppState, Args};
use review_mailer::{MailerConfig, SendGridSender};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("review_api={}", level).parse()?)
        .add_directive(format!("review_mailer={}", level).parse()?)
        .add_directive("tower_http=debug".parse()?);

    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mailer_config = MailerConfig::from_env();
    if !mailer_config.is_configured() {
        warn!("SENDGRID_API_KEY not set, review-request emails will fail");
    }

    let config = AppConfig::from(&args);
    if config.service_key.is_none() {
        warn!("SERVICE_ROLE_KEY not set, queue processing and email endpoints are disabled");
    }
    if config.admin_token.is_none() {
        warn!("ADMIN_API_TOKEN not set, moderation endpoints are disabled");
    }

    // Initialize application state
    info!("Initializing review API...");
    let mailer = Arc::new(SendGridSender::new(mailer_config));
    let state = AppState::new(args.database_url.clone(), config, mailer).await?;
    let app = router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("Starting review API on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
