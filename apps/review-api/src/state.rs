//! Application state for the review API

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::dispatch::EmailDispatcher;

pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    pub mailer: Arc<dyn EmailDispatcher>,
}

impl AppState {
    pub async fn new(
        database_url: Option<String>,
        config: AppConfig,
        mailer: Arc<dyn EmailDispatcher>,
    ) -> Result<Self> {
        let db_path = database_url.unwrap_or_else(default_database_url);

        tracing::info!("Connecting to database: {}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_path)
            .await?;

        Self::with_pool(pool, config, mailer).await
    }

    /// Private in-memory database, kept on a single connection so every
    /// query sees the same data
    pub async fn in_memory(config: AppConfig, mailer: Arc<dyn EmailDispatcher>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool, config, mailer).await
    }

    async fn with_pool(
        pool: SqlitePool,
        config: AppConfig,
        mailer: Arc<dyn EmailDispatcher>,
    ) -> Result<Self> {
        run_migrations(&pool).await?;

        Ok(Self {
            db: pool,
            config,
            mailer,
        })
    }
}

fn default_database_url() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("review-api");
    std::fs::create_dir_all(&data_dir).ok();
    format!("sqlite:{}/reviews.db?mode=rwc", data_dir.display())
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Running database migrations...");

    // `seq` gives reviews a total creation order independent of clock resolution
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            product_id TEXT NOT NULL,
            author TEXT NOT NULL,
            avatar_url TEXT,
            author_email TEXT,
            created_at TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            text TEXT NOT NULL,
            images_json TEXT NOT NULL DEFAULT '[]',
            verified_purchase INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
            order_id TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_reviews_product_status ON reviews(product_id, status)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_reviews_author_product ON reviews(author_email, product_id)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL UNIQUE,
            customer_email TEXT NOT NULL,
            customer_name TEXT NOT NULL,
            product_id TEXT NOT NULL,
            product_name TEXT NOT NULL,
            purchase_date TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS email_queue (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id),
            email_type TEXT NOT NULL CHECK (email_type IN ('initial_request', 'reminder')),
            recipient_email TEXT NOT NULL,
            recipient_name TEXT NOT NULL,
            product_id TEXT NOT NULL,
            scheduled_for TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'sent', 'cancelled', 'failed')),
            error_message TEXT,
            sent_at TEXT,
            claimed_by TEXT,
            claimed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_email_queue_due ON email_queue(status, scheduled_for)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_email_queue_order ON email_queue(order_id)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Migrations complete");
    Ok(())
}

/// Get platform-specific data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
