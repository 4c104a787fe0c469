//! Chart provider client (Yahoo v8 `/v8/finance/chart` shape).
//!
//! Only fields that have proven stable are read: `meta.chartPreviousClose`,
//! `timestamp[]`, and `indicators.quote[0].{open,high,low,close}`. The
//! `regularMarket*` and `adjclose` fields churn across provider mirrors and
//! are ignored.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::returns::jst_midnight_epoch;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 100;

pub struct ChartClient {
    client: Client,
    base_url: String,
}

/// One daily bar. Only `open` and `close` are required; some provider
/// mirrors omit `high`/`low` for sessions that traded normally.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
}

#[derive(Debug, Clone)]
pub struct ChartSeries {
    pub symbol: String,
    pub previous_close: Option<f64>,
    pub bars: Vec<DailyBar>,
}

impl ChartSeries {
    /// Open of the first bar in the window (the MTD baseline)
    pub fn month_open(&self) -> Option<f64> {
        self.bars.first().map(|b| b.open)
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Close of the trading day before the latest bar. Falls back to the
    /// provider's `chartPreviousClose` when the window holds a single bar.
    pub fn prior_close(&self) -> Option<f64> {
        match self.bars.len() {
            0 => None,
            1 => self.previous_close,
            n => Some(self.bars[n - 2].close),
        }
    }
}

/// Latest quote distilled from a short history window
#[derive(Debug, Clone, serde::Serialize)]
pub struct Quote {
    pub symbol: String,
    pub last_price: f64,
    pub previous_close: Option<f64>,
    pub currency: Option<String>,
}

impl ChartClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("kabuwatch/0.1 (returns dashboard)")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Daily bars from `start` (midnight JST) through now
    pub async fn fetch_history(&self, symbol: &str, start: NaiveDate) -> Result<ChartSeries> {
        let params = [
            ("interval", "1d".to_string()),
            ("period1", jst_midnight_epoch(start).to_string()),
            ("period2", Utc::now().timestamp().to_string()),
        ];
        let envelope = self.fetch_chart(symbol, &params).await?;
        let (series, currency) = series_from_envelope(symbol, envelope)?;
        debug!(symbol, bars = series.bars.len(), ?currency, "chart history fetched");
        Ok(series)
    }

    /// Latest close + previous close, from a 5-day window
    pub async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let params = [
            ("interval", "1d".to_string()),
            ("range", "5d".to_string()),
        ];
        let envelope = self.fetch_chart(symbol, &params).await?;
        let (series, currency) = series_from_envelope(symbol, envelope)?;
        let last_price = series
            .latest_close()
            .with_context(|| format!("no usable bars for {symbol}"))?;
        let previous_close = series.prior_close();
        Ok(Quote {
            symbol: series.symbol,
            last_price,
            previous_close,
            currency,
        })
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        params: &[(&str, String)],
    ) -> Result<ChartEnvelope> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(symbol)
        );
        let response = self.get_with_retry(symbol, &url, params).await?;
        response
            .json()
            .await
            .with_context(|| format!("chart response for {symbol} was not valid JSON"))
    }

    /// Retry transient failures with exponential backoff. Throttling (429)
    /// gets a much longer pause; any other non-success status fails fast,
    /// since the provider answers bad symbols with a 200 + error envelope
    /// and a retry would not change a 4xx/5xx. The per-request deadline is
    /// the client-level timeout configured at construction.
    async fn get_with_retry(
        &self,
        symbol: &str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.client.get(url).query(params).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    warn!(symbol, attempt, "chart provider throttled the request");
                    sleep(delay * 10).await;
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    bail!("chart provider returned {status} for {symbol}: {body}");
                }
                Err(e) if e.is_timeout() => {
                    warn!(symbol, attempt, "chart request hit the client timeout");
                }
                Err(e) => {
                    warn!(symbol, attempt, error = %e, "chart request failed");
                }
            }

            if attempt < MAX_ATTEMPTS {
                debug!(symbol, delay_ms = delay.as_millis() as u64, "retrying chart fetch");
                sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(30));
            }
        }

        bail!("chart provider unreachable for {symbol} after {MAX_ATTEMPTS} attempts")
    }
}

// Chart API response shape
#[derive(Debug, Deserialize)]
pub(crate) struct ChartEnvelope {
    chart: ChartNode,
}

#[derive(Debug, Deserialize)]
struct ChartNode {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "chartPreviousClose")]
    chart_previous_close: Option<f64>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize, Default)]
struct QuoteBlock {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
}

/// Flatten the parallel-array chart payload into bars. A row is a real
/// trading day iff it has an open and a close; halted days (null there) are
/// skipped, while missing high/low never disqualifies a bar.
pub(crate) fn series_from_envelope(
    symbol: &str,
    envelope: ChartEnvelope,
) -> Result<(ChartSeries, Option<String>)> {
    if let Some(err) = envelope.chart.error {
        if !err.is_null() {
            bail!("chart provider error for {symbol}: {err}");
        }
    }

    let mut results = envelope
        .chart
        .result
        .with_context(|| format!("chart response for {symbol} has no result"))?;
    if results.is_empty() {
        bail!("chart response for {symbol} has an empty result");
    }
    let first = results.remove(0);

    let timestamps = first
        .timestamp
        .with_context(|| format!("chart response for {symbol} has no timestamps"))?;
    let quote = first
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();

    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();

    let n = timestamps.len().min(opens.len()).min(closes.len());

    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let Some(ts) = Utc.timestamp_opt(timestamps[i], 0).single() else {
            continue;
        };
        if let (Some(open), Some(close)) = (opens[i], closes[i]) {
            bars.push(DailyBar {
                ts,
                open,
                high: highs.get(i).copied().flatten(),
                low: lows.get(i).copied().flatten(),
                close,
            });
        }
    }

    if bars.is_empty() {
        bail!("chart response for {symbol} contained no usable bars");
    }

    Ok((
        ChartSeries {
            symbol: symbol.to_string(),
            previous_close: first.meta.chart_previous_close,
            bars,
        },
        first.meta.currency,
    ))
}
