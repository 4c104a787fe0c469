use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Benchmark indices tracked by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Nikkei225,
    Topix,
}

impl IndexKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            IndexKind::Nikkei225 => "Nikkei 225",
            IndexKind::Topix => "TOPIX",
        }
    }

    /// Primary symbol on the chart provider
    pub fn provider_symbol(&self) -> &'static str {
        match self {
            IndexKind::Nikkei225 => "^N225",
            IndexKind::Topix => "998405.T",
        }
    }
}

/// Where an index reading actually came from. A scraped or proxied reading
/// never masquerades as provider data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataOrigin {
    Provider { symbol: String },
    ScrapedBoard { site: String },
    ProxyEtf { symbol: String, leverage: f64 },
    Unavailable,
}

/// One benchmark index as resolved for the current snapshot.
///
/// `mtd_return` is absent when the winning source only exposes intraday data
/// (the HTML boards show level + day change, nothing month-relative).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReading {
    pub index: IndexKind,
    pub latest: f64,
    pub day_return: Option<f64>,
    pub mtd_return: Option<f64>,
    pub origin: DataOrigin,
}

impl IndexReading {
    pub fn unavailable(index: IndexKind) -> Self {
        Self {
            index,
            latest: 0.0,
            day_return: None,
            mtd_return: None,
            origin: DataOrigin::Unavailable,
        }
    }
}

/// Per-ticker row of the dashboard table. Share counts are deliberately not
/// serialized; they only weight the portfolio totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerRow {
    pub code: String,
    pub last_price: f64,
    pub day_change: Option<f64>,
    pub mtd_change: Option<f64>,
}

/// The full response of one dashboard refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<FixedOffset>,
    pub tickers: Vec<TickerRow>,
    pub portfolio_mtd: Option<f64>,
    pub alpha: Option<f64>,
    pub nikkei: IndexReading,
    pub topix: IndexReading,
}

/// TOPIX proxy instrument, `SYMBOL[:LEVERAGE]`.
///
/// Leveraged trackers (e.g. `1367.T:2.0`) have their return divided by the
/// leverage factor to approximate the underlying index.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxySpec {
    pub symbol: String,
    pub leverage: f64,
}

impl ProxySpec {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        let (symbol, leverage) = match raw.split_once(':') {
            Some((sym, lev)) => {
                let leverage: f64 = lev
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid proxy leverage in '{raw}'"))?;
                (sym.trim(), leverage)
            }
            None => (raw, 1.0),
        };
        if symbol.is_empty() {
            anyhow::bail!("empty proxy symbol");
        }
        if !leverage.is_finite() || leverage <= 0.0 {
            anyhow::bail!("proxy leverage must be positive, got {leverage}");
        }
        Ok(Self {
            symbol: symbol.to_string(),
            leverage,
        })
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub default_codes: String,
    pub chart_base_url: String,
    pub http_timeout_secs: u64,
    pub topix_proxy: ProxySpec,
    pub scrape_enabled: bool,
    pub fetch_concurrency: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let default_codes = std::env::var("DEFAULT_CODES")
            .unwrap_or_else(|_| "7203:100, 9984:200, 8035:100".to_string());

        let chart_base_url = std::env::var("CHART_BASE_URL")
            .unwrap_or_else(|_| "https://query2.finance.yahoo.com".to_string());

        let http_timeout_secs = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&v| v > 0)
            .unwrap_or(10);

        let topix_proxy = match std::env::var("TOPIX_PROXY") {
            Ok(raw) if !raw.trim().is_empty() => ProxySpec::parse(&raw)?,
            _ => ProxySpec {
                symbol: "1306.T".to_string(),
                leverage: 1.0,
            },
        };

        let scrape_enabled = std::env::var("SCRAPE_ENABLED")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
            .unwrap_or(true);

        let fetch_concurrency = std::env::var("FETCH_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&v| v > 0)
            .unwrap_or(4);

        Ok(Self {
            port,
            default_codes,
            chart_base_url,
            http_timeout_secs,
            topix_proxy,
            scrape_enabled,
            fetch_concurrency,
        })
    }
}
