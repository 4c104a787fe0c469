//! kabuwatch: percentage-return dashboard backend for Japanese equities
//! against the Nikkei 225 and TOPIX benchmarks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kabuwatch_backend::{
    api, models::Config, scrapers::chart_api::ChartClient, snapshot::SnapshotDeps,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let config = Arc::new(Config::from_env()?);
    info!(
        provider = %config.chart_base_url,
        scrape_enabled = config.scrape_enabled,
        "🇯🇵 kabuwatch starting"
    );

    let chart = Arc::new(ChartClient::new(
        config.chart_base_url.clone(),
        config.http_timeout_secs,
    )?);

    // Separate client for the HTML boards; they want a browser-ish UA.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .user_agent("Mozilla/5.0 (kabuwatch)")
        .build()
        .context("Failed to build HTTP client")?;

    let state = SnapshotDeps {
        config: config.clone(),
        chart,
        http,
    };
    let app = api::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kabuwatch_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
