//! One dashboard refresh: fan out the holding fetches, resolve both
//! benchmarks, fold everything into a `DashboardSnapshot`.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::benchmarks;
use crate::models::{Config, DashboardSnapshot, TickerRow};
use crate::portfolio::{normalize_symbol, Holding, Portfolio};
use crate::returns::{alpha, month_start_jst, now_jst, pct_change, portfolio_return};
use crate::scrapers::chart_api::ChartClient;

/// Everything a snapshot needs; cheap to clone into handlers
#[derive(Clone)]
pub struct SnapshotDeps {
    pub config: Arc<Config>,
    pub chart: Arc<ChartClient>,
    pub http: reqwest::Client,
}

/// A holding that survived its fetch, with the weighting inputs kept aside
struct PricedHolding {
    row: TickerRow,
    month_open: f64,
    latest: f64,
    shares: f64,
}

pub async fn build_snapshot(
    deps: &SnapshotDeps,
    portfolio: &Portfolio,
) -> Result<DashboardSnapshot> {
    let started = Instant::now();
    let month_start = month_start_jst(Utc::now());

    let tickers_fut = async {
        // `buffered` (not `buffer_unordered`) keeps the table in input order.
        stream::iter(portfolio.holdings.clone())
            .map(|holding| price_holding(deps.chart.clone(), holding, month_start))
            .buffered(deps.config.fetch_concurrency)
            .collect::<Vec<Option<PricedHolding>>>()
            .await
    };

    let nikkei_fut = benchmarks::fetch_nikkei(deps.chart.clone(), month_start);
    let topix_fut = benchmarks::fetch_topix(
        deps.chart.clone(),
        deps.http.clone(),
        &deps.config,
        month_start,
    );

    let (priced, nikkei, topix) = tokio::join!(tickers_fut, nikkei_fut, topix_fut);
    let priced: Vec<PricedHolding> = priced.into_iter().flatten().collect();

    if priced.is_empty() {
        bail!("no data for any requested ticker");
    }

    let weighted: Vec<(f64, f64, f64)> = priced
        .iter()
        .map(|p| (p.month_open, p.latest, p.shares))
        .collect();
    let portfolio_mtd = portfolio_return(&weighted);
    let alpha = alpha(portfolio_mtd, topix.mtd_return);

    let snapshot = DashboardSnapshot {
        generated_at: now_jst(),
        tickers: priced.into_iter().map(|p| p.row).collect(),
        portfolio_mtd,
        alpha,
        nikkei,
        topix,
    };

    info!(
        tickers = snapshot.tickers.len(),
        requested = portfolio.holdings.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "snapshot built"
    );

    Ok(snapshot)
}

async fn price_holding(
    chart: Arc<ChartClient>,
    holding: Holding,
    month_start: chrono::NaiveDate,
) -> Option<PricedHolding> {
    let symbol = normalize_symbol(&holding.code);

    let (latest, prior, month_open) = match chart.fetch_history(&symbol, month_start).await {
        Ok(series) => {
            let latest = series.latest_close()?;
            let prior = series.prior_close();
            (latest, prior, series.month_open())
        }
        Err(history_err) => {
            // New months and thin listings sometimes have no month bars yet;
            // fall back to a plain quote with the previous close standing in
            // for the month-open.
            match chart.fetch_quote(&symbol).await {
                Ok(quote) => (quote.last_price, quote.previous_close, None),
                Err(quote_err) => {
                    warn!(
                        code = %holding.code,
                        history_error = %history_err,
                        quote_error = %quote_err,
                        "ticker fetch failed; dropping row"
                    );
                    return None;
                }
            }
        }
    };

    let month_open = month_open.or(prior).unwrap_or(latest);

    Some(PricedHolding {
        row: TickerRow {
            code: holding.code,
            last_price: latest,
            day_change: prior.and_then(|p| pct_change(p, latest)),
            mtd_change: pct_change(month_open, latest),
        },
        month_open,
        latest,
        shares: holding.shares,
    })
}
