//! One-shot snapshot CLI: runs the same pipeline as the server and prints
//! the dashboard as a terminal table.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kabuwatch_backend::{
    models::{Config, DataOrigin, IndexReading},
    portfolio::Portfolio,
    scrapers::chart_api::ChartClient,
    snapshot::{build_snapshot, SnapshotDeps},
};

#[derive(Parser, Debug)]
#[command(
    name = "kabuwatch-snapshot",
    version,
    about = "Print a one-shot returns snapshot for a Japanese equity portfolio"
)]
struct Args {
    /// Holdings list, `code[:shares]` items separated by commas
    #[arg(
        short,
        long,
        env = "DEFAULT_CODES",
        default_value = "7203:100, 9984:200, 8035:100"
    )]
    codes: String,

    /// Emit the raw JSON snapshot instead of the table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let portfolio = Portfolio::parse(&args.codes)?;

    let config = Arc::new(Config::from_env()?);
    let chart = Arc::new(ChartClient::new(
        config.chart_base_url.clone(),
        config.http_timeout_secs,
    )?);
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .user_agent("Mozilla/5.0 (kabuwatch)")
        .build()
        .context("Failed to build HTTP client")?;

    let deps = SnapshotDeps {
        config,
        chart,
        http,
    };
    let snapshot = build_snapshot(&deps, &portfolio).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!(
        "kabuwatch snapshot  {}",
        snapshot.generated_at.format("%Y-%m-%d %H:%M JST")
    );
    println!();
    println!("{:<10} {:>12} {:>10} {:>10}", "code", "last", "day", "mtd");
    for row in &snapshot.tickers {
        println!(
            "{:<10} {:>12.1} {:>10} {:>10}",
            row.code,
            row.last_price,
            fmt_pct(row.day_change),
            fmt_pct(row.mtd_change)
        );
    }
    println!();
    println!("portfolio MTD : {}", fmt_pct(snapshot.portfolio_mtd));
    println!("alpha vs TOPIX: {}", fmt_pct(snapshot.alpha));
    print_index(&snapshot.nikkei);
    print_index(&snapshot.topix);

    Ok(())
}

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.2}%", v * 100.0),
        None => "--".to_string(),
    }
}

fn print_index(reading: &IndexReading) {
    let figure = match (reading.mtd_return, reading.day_return) {
        (Some(mtd), _) => format!("MTD {}", fmt_pct(Some(mtd))),
        (None, Some(day)) => format!("day {}", fmt_pct(Some(day))),
        (None, None) => "--".to_string(),
    };
    println!(
        "{:<14}: {figure} ({})",
        reading.index.display_name(),
        origin_label(&reading.origin)
    );
}

fn origin_label(origin: &DataOrigin) -> String {
    match origin {
        DataOrigin::Provider { symbol } => format!("provider {symbol}"),
        DataOrigin::ScrapedBoard { site } => format!("scraped {site}"),
        DataOrigin::ProxyEtf { symbol, leverage } => {
            format!("proxy {symbol} /{leverage}")
        }
        DataOrigin::Unavailable => "unavailable".to_string(),
    }
}

fn init_tracing() {
    // Keep the table clean by default; RUST_LOG overrides.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kabuwatch_backend=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
