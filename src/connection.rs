//! Connection pool setup
//!
//! Builds the MySQL pool bulk calls acquire their owned transactions from,
//! then warms it up so an unreachable database fails at startup.

use crate::config::BulkConfig;
use crate::dsn::{parse_dsn, safe_dsn};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::{Duration, Instant};

/// Warm up connection pool by pre-establishing min_connections
///
/// # Errors
/// Returns error if all warmup connections fail
pub async fn warmup_pool(pool: &MySqlPool, min_connections: u32) -> Result<()> {
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..min_connections {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            sqlx::query("SELECT 1")
                .execute(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Warmup connection {} failed: {}", i + 1, e))
        }));
    }

    let mut success_count = 0;
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(_)) => success_count += 1,
            Ok(Err(e)) => log::warn!("Connection {} warmup failed: {}", i + 1, e),
            Err(e) => log::warn!("Connection {} warmup task panicked: {}", i + 1, e),
        }
    }

    let elapsed = start.elapsed();
    if success_count > 0 || min_connections == 0 {
        log::info!(
            "✓ Connection pool warmed up: {}/{} connections ready ({:?})",
            success_count,
            min_connections,
            elapsed
        );
        if elapsed > Duration::from_secs(2) {
            log::warn!("Pool warmup was slow ({:?})", elapsed);
        }
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Pool warmup failed: 0/{} connections established",
            min_connections
        ))
    }
}

/// Connect and warm up a pool sized by `config`
///
/// # Errors
/// Returns error if the DSN is invalid, the database is unreachable, or
/// warmup fails
pub async fn connect_pool(config: &BulkConfig) -> Result<MySqlPool> {
    let target = safe_dsn(&config.dsn);
    // sqlx only knows the mysql:// scheme
    let url = parse_dsn(config.dsn.expose_secret())
        .with_context(|| format!("Invalid DSN {}", target))?
        .to_connection_string();

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .test_before_acquire(true)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // New connections only; reused ones go through test_before_acquire
                sqlx::query("SELECT 1").execute(conn).await?;
                Ok(())
            })
        })
        .connect(url.expose_secret())
        .await
        .with_context(|| format!("Failed to connect to {}", target))?;

    warmup_pool(&pool, config.min_connections).await?;

    log::info!("✓ Database connected ({}) at {}", config.database_type, target);
    Ok(pool)
}
