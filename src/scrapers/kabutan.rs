//! HTML fallback B: the Kabutan index page (TOPIX lives at `?code=0010`).
//!
//! Same caveats as the Yahoo board scrape: arbitrary third-party markup,
//! selectors break without notice, a parse failure just advances the chain.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use super::{parse_jp_number, parse_signed_percent};

const INDEX_URL_BASE: &str = "https://kabutan.jp/stock/";

static INFO_BLOCK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#stockinfo_i1").expect("info block selector"));
static PRICE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.kabuka").expect("price selector"));

#[derive(Debug, Clone, PartialEq)]
pub struct KabutanReading {
    pub latest: f64,
    pub day_change: Option<f64>,
}

pub async fn fetch(client: &Client, code: &str) -> Result<KabutanReading> {
    let url = format!("{INDEX_URL_BASE}?code={}", urlencoding::encode(code));
    let html = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("{url} returned an error status"))?
        .text()
        .await
        .context("failed to read kabutan body")?;

    let reading = parse_index_page(&html)
        .with_context(|| format!("kabutan markup for code {code} did not parse"))?;
    debug!(code, latest = reading.latest, "kabutan page scraped");
    Ok(reading)
}

pub fn parse_index_page(html: &str) -> Result<KabutanReading> {
    let document = Html::parse_document(html);

    let info = document
        .select(&INFO_BLOCK)
        .next()
        .context("stock info block not found")?;

    let latest = info
        .select(&PRICE)
        .next()
        .map(|e| e.text().collect::<String>())
        .and_then(|text| parse_jp_number(text.trim_end_matches('円')))
        .context("price not found in info block")?;

    let day_change = parse_signed_percent(&info.text().collect::<String>());

    if latest <= 0.0 {
        anyhow::bail!("scraped price {latest} is not usable");
    }

    Ok(KabutanReading { latest, day_change })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_PAGE: &str = r#"
        <div id="stockinfo_i1">
          <div class="si_i1_1"><h2>TOPIX</h2></div>
          <div class="si_i1_2">
            <span class="kabuka">2,720.5円</span>
            <dl><dt>前日比</dt><dd>+14.16（+0.52％）</dd></dl>
          </div>
        </div>"#;

    #[test]
    fn parses_index_price_and_change() {
        let reading = parse_index_page(INDEX_PAGE).unwrap();
        assert_eq!(reading.latest, 2720.5);
        assert_eq!(reading.day_change, Some(0.0052));
    }

    #[test]
    fn parses_negative_full_width_change() {
        let html = r#"
            <div id="stockinfo_i1">
              <span class="kabuka">1,999.9</span>
              <dl><dt>前日比</dt><dd>−10.0（−0.50％）</dd></dl>
            </div>"#;
        let reading = parse_index_page(html).unwrap();
        assert_eq!(reading.latest, 1999.9);
        assert_eq!(reading.day_change, Some(-0.005));
    }

    #[test]
    fn reworked_markup_is_an_error() {
        assert!(parse_index_page("<div id='other'><span>2,720.5</span></div>").is_err());
    }
}
