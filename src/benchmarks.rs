//! Benchmark index acquisition.
//!
//! Nikkei 225 comes straight from the chart provider. TOPIX has a history of
//! vanishing from provider mirrors, so it walks an ordered fallback chain:
//! provider primary symbol, provider backup symbol, two HTML price boards,
//! and finally a tracking-ETF substitution. The first source that yields a
//! usable level wins, and the reading carries its origin so downstream
//! consumers can tell degraded data from the real thing.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use tracing::{info, warn};

use crate::models::{Config, DataOrigin, IndexKind, IndexReading, ProxySpec};
use crate::returns::pct_change;
use crate::scrapers::chart_api::ChartClient;
use crate::scrapers::{kabutan, yahoo_jp_board};

/// TOPIX backup symbol carried by some provider mirrors
const TOPIX_BACKUP_SYMBOL: &str = "^TOPX";
/// TOPIX page code on the Yahoo Finance Japan board
const TOPIX_BOARD_CODE: &str = "998405.T";
/// TOPIX code on Kabutan
const TOPIX_KABUTAN_CODE: &str = "0010";

#[async_trait]
pub trait IndexSource: Send + Sync {
    fn label(&self) -> &str;
    async fn fetch(&self, month_start: NaiveDate) -> Result<IndexReading>;
}

/// Try each source in order; the first usable reading wins. Every skipped
/// source logs exactly one warning. Total failure degrades to an
/// `Unavailable` reading instead of erroring the snapshot.
pub async fn run_chain(
    kind: IndexKind,
    sources: &[Box<dyn IndexSource>],
    month_start: NaiveDate,
) -> IndexReading {
    for source in sources {
        match source.fetch(month_start).await {
            Ok(reading) => {
                info!(
                    index = kind.display_name(),
                    source = source.label(),
                    latest = reading.latest,
                    "index resolved"
                );
                return reading;
            }
            Err(e) => {
                warn!(
                    index = kind.display_name(),
                    source = source.label(),
                    error = %e,
                    "index source failed, trying next"
                );
            }
        }
    }

    warn!(
        index = kind.display_name(),
        "all index sources failed; reporting unavailable"
    );
    IndexReading::unavailable(kind)
}

pub async fn fetch_nikkei(chart: Arc<ChartClient>, month_start: NaiveDate) -> IndexReading {
    let sources: Vec<Box<dyn IndexSource>> = vec![Box::new(ProviderSource::new(
        chart,
        IndexKind::Nikkei225,
        IndexKind::Nikkei225.provider_symbol(),
    ))];
    run_chain(IndexKind::Nikkei225, &sources, month_start).await
}

pub async fn fetch_topix(
    chart: Arc<ChartClient>,
    http: Client,
    config: &Config,
    month_start: NaiveDate,
) -> IndexReading {
    let sources = topix_chain(chart, http, config);
    run_chain(IndexKind::Topix, &sources, month_start).await
}

fn topix_chain(
    chart: Arc<ChartClient>,
    http: Client,
    config: &Config,
) -> Vec<Box<dyn IndexSource>> {
    let mut chain: Vec<Box<dyn IndexSource>> = vec![
        Box::new(ProviderSource::new(
            chart.clone(),
            IndexKind::Topix,
            IndexKind::Topix.provider_symbol(),
        )),
        Box::new(ProviderSource::new(
            chart.clone(),
            IndexKind::Topix,
            TOPIX_BACKUP_SYMBOL,
        )),
    ];

    if config.scrape_enabled {
        chain.push(Box::new(YahooBoardSource {
            http: http.clone(),
            quote_code: TOPIX_BOARD_CODE,
            kind: IndexKind::Topix,
        }));
        chain.push(Box::new(KabutanSource {
            http,
            code: TOPIX_KABUTAN_CODE,
            kind: IndexKind::Topix,
        }));
    }

    chain.push(Box::new(ProxyEtfSource {
        chart,
        spec: config.topix_proxy.clone(),
        kind: IndexKind::Topix,
        label: format!("proxy-etf:{}", config.topix_proxy.symbol),
    }));

    chain
}

struct ProviderSource {
    chart: Arc<ChartClient>,
    kind: IndexKind,
    symbol: String,
    label: String,
}

impl ProviderSource {
    fn new(chart: Arc<ChartClient>, kind: IndexKind, symbol: &str) -> Self {
        Self {
            chart,
            kind,
            symbol: symbol.to_string(),
            label: format!("provider:{symbol}"),
        }
    }
}

#[async_trait]
impl IndexSource for ProviderSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, month_start: NaiveDate) -> Result<IndexReading> {
        let series = self.chart.fetch_history(&self.symbol, month_start).await?;
        let latest = series
            .latest_close()
            .with_context(|| format!("no bars for {}", self.symbol))?;
        let month_open = series.month_open();
        let prior = series.prior_close();

        if latest <= 0.0 {
            anyhow::bail!("provider level {latest} for {} is not usable", self.symbol);
        }

        Ok(IndexReading {
            index: self.kind,
            latest,
            day_return: prior.and_then(|p| pct_change(p, latest)),
            mtd_return: month_open.and_then(|o| pct_change(o, latest)),
            origin: DataOrigin::Provider {
                symbol: self.symbol.clone(),
            },
        })
    }
}

struct YahooBoardSource {
    http: Client,
    quote_code: &'static str,
    kind: IndexKind,
}

#[async_trait]
impl IndexSource for YahooBoardSource {
    fn label(&self) -> &str {
        "scrape:finance.yahoo.co.jp"
    }

    async fn fetch(&self, _month_start: NaiveDate) -> Result<IndexReading> {
        let board = yahoo_jp_board::fetch(&self.http, self.quote_code).await?;
        Ok(IndexReading {
            index: self.kind,
            latest: board.latest,
            day_return: board.day_change,
            // The board shows level + day change only; nothing month-relative.
            mtd_return: None,
            origin: DataOrigin::ScrapedBoard {
                site: "finance.yahoo.co.jp".to_string(),
            },
        })
    }
}

struct KabutanSource {
    http: Client,
    code: &'static str,
    kind: IndexKind,
}

#[async_trait]
impl IndexSource for KabutanSource {
    fn label(&self) -> &str {
        "scrape:kabutan.jp"
    }

    async fn fetch(&self, _month_start: NaiveDate) -> Result<IndexReading> {
        let page = kabutan::fetch(&self.http, self.code).await?;
        Ok(IndexReading {
            index: self.kind,
            latest: page.latest,
            day_return: page.day_change,
            mtd_return: None,
            origin: DataOrigin::ScrapedBoard {
                site: "kabutan.jp".to_string(),
            },
        })
    }
}

struct ProxyEtfSource {
    chart: Arc<ChartClient>,
    spec: ProxySpec,
    kind: IndexKind,
    label: String,
}

#[async_trait]
impl IndexSource for ProxyEtfSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, month_start: NaiveDate) -> Result<IndexReading> {
        let series = self
            .chart
            .fetch_history(&self.spec.symbol, month_start)
            .await?;
        let latest = series
            .latest_close()
            .with_context(|| format!("no bars for proxy {}", self.spec.symbol))?;

        let raw_mtd = series.month_open().and_then(|o| pct_change(o, latest));
        let raw_day = series.prior_close().and_then(|p| pct_change(p, latest));

        Ok(IndexReading {
            index: self.kind,
            latest,
            day_return: deleverage(raw_day, self.spec.leverage),
            mtd_return: deleverage(raw_mtd, self.spec.leverage),
            origin: DataOrigin::ProxyEtf {
                symbol: self.spec.symbol.clone(),
                leverage: self.spec.leverage,
            },
        })
    }
}

/// Unwind a leveraged tracker's return to approximate the underlying index
fn deleverage(raw: Option<f64>, leverage: f64) -> Option<f64> {
    raw.map(|r| r / leverage)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        label: &'static str,
        latest: f64,
    }

    #[async_trait]
    impl IndexSource for FixedSource {
        fn label(&self) -> &str {
            self.label
        }

        async fn fetch(&self, _month_start: NaiveDate) -> Result<IndexReading> {
            Ok(IndexReading {
                index: IndexKind::Topix,
                latest: self.latest,
                day_return: None,
                mtd_return: Some(0.01),
                origin: DataOrigin::Provider {
                    symbol: self.label.to_string(),
                },
            })
        }
    }

    struct FailingSource;

    #[async_trait]
    impl IndexSource for FailingSource {
        fn label(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, _month_start: NaiveDate) -> Result<IndexReading> {
            anyhow::bail!("boom")
        }
    }

    fn month_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    #[tokio::test]
    async fn chain_stops_at_first_success() {
        let sources: Vec<Box<dyn IndexSource>> = vec![
            Box::new(FailingSource),
            Box::new(FixedSource {
                label: "second",
                latest: 2720.5,
            }),
            Box::new(FixedSource {
                label: "third",
                latest: 9999.0,
            }),
        ];

        let reading = run_chain(IndexKind::Topix, &sources, month_start()).await;
        assert_eq!(reading.latest, 2720.5);
        assert_eq!(
            reading.origin,
            DataOrigin::Provider {
                symbol: "second".to_string()
            }
        );
    }

    #[tokio::test]
    async fn exhausted_chain_degrades_to_unavailable() {
        let sources: Vec<Box<dyn IndexSource>> =
            vec![Box::new(FailingSource), Box::new(FailingSource)];
        let reading = run_chain(IndexKind::Topix, &sources, month_start()).await;
        assert_eq!(reading.origin, DataOrigin::Unavailable);
        assert_eq!(reading.latest, 0.0);
        assert_eq!(reading.mtd_return, None);
    }

    #[test]
    fn deleverage_divides_by_factor() {
        assert_eq!(deleverage(Some(0.04), 2.0), Some(0.02));
        assert_eq!(deleverage(Some(-0.03), 1.0), Some(-0.03));
        assert_eq!(deleverage(None, 2.0), None);
    }

    #[test]
    fn topix_chain_respects_scrape_kill_switch() {
        let chart = Arc::new(ChartClient::new("http://127.0.0.1:1", 1).unwrap());
        let http = Client::new();
        let mut config = Config {
            port: 0,
            default_codes: String::new(),
            chart_base_url: String::new(),
            http_timeout_secs: 1,
            topix_proxy: ProxySpec {
                symbol: "1306.T".to_string(),
                leverage: 1.0,
            },
            scrape_enabled: true,
            fetch_concurrency: 1,
        };

        let with_scrapes = topix_chain(chart.clone(), http.clone(), &config);
        assert_eq!(with_scrapes.len(), 5);
        assert_eq!(with_scrapes[2].label(), "scrape:finance.yahoo.co.jp");
        assert_eq!(with_scrapes[3].label(), "scrape:kabutan.jp");
        assert_eq!(with_scrapes[4].label(), "proxy-etf:1306.T");

        config.scrape_enabled = false;
        let without = topix_chain(chart, http, &config);
        assert_eq!(without.len(), 3);
        assert_eq!(without[2].label(), "proxy-etf:1306.T");
    }
}
