//! HTML fallback A: the Yahoo Finance Japan quote price board.
//!
//! Screen-scrape of third-party markup, not an API. The class names are
//! build-hashed (`PriceBoard__main__abc12`), so selectors match on substring
//! and WILL break when the site reworks its front end. Failures here are
//! expected and simply advance the fallback chain.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use super::{parse_jp_number, parse_signed_percent};

const QUOTE_URL_BASE: &str = "https://finance.yahoo.co.jp/quote";

// Matches both the stock board (PriceBoard__main) and the index board
// (_BasePriceBoard__main) via substring.
static BOARD_MAIN: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div[class*='PriceBoard__main']").expect("board container selector")
});
static BOARD_PRICE_VALUE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("span[class*='PriceBoard__price'] span[class*='StyledNumber__value']")
        .expect("price value selector")
});
static BOARD_PRICE_BLOCK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div[class*='PriceBoard__price']").expect("price block selector")
});
static CHANGE_LABEL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div[class*='PriceChangeLabel']").expect("change label selector")
});

#[derive(Debug, Clone, PartialEq)]
pub struct BoardReading {
    pub latest: f64,
    pub day_change: Option<f64>,
}

pub async fn fetch(client: &Client, quote_code: &str) -> Result<BoardReading> {
    let url = format!("{QUOTE_URL_BASE}/{}", urlencoding::encode(quote_code));
    let html = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("{url} returned an error status"))?
        .text()
        .await
        .context("failed to read price board body")?;

    let reading = parse_board(&html)
        .with_context(|| format!("price board markup for {quote_code} did not parse"))?;
    debug!(quote_code, latest = reading.latest, "price board scraped");
    Ok(reading)
}

pub fn parse_board(html: &str) -> Result<BoardReading> {
    let document = Html::parse_document(html);

    let container = document
        .select(&BOARD_MAIN)
        .next()
        .context("price board container not found")?;

    // Stock pages expose the price as a styled number span; index pages only
    // have a text blob "2,720.50前日比+14.16（+0.52%）...".
    let latest = container
        .select(&BOARD_PRICE_VALUE)
        .next()
        .and_then(|e| parse_jp_number(&e.text().collect::<String>()))
        .or_else(|| {
            let block = container
                .select(&BOARD_PRICE_BLOCK)
                .next()
                .map(|e| e.text().collect::<String>())?;
            let price_text = block.split("前日比").next()?;
            parse_jp_number(price_text)
        })
        .context("price not found on board")?;

    let day_change = container
        .select(&CHANGE_LABEL)
        .next()
        .map(|e| e.text().collect::<String>())
        .or_else(|| {
            container
                .select(&BOARD_PRICE_BLOCK)
                .next()
                .map(|e| e.text().collect::<String>())
        })
        .and_then(|text| parse_signed_percent(&text));

    if latest <= 0.0 {
        anyhow::bail!("scraped price {latest} is not usable");
    }

    Ok(BoardReading { latest, day_change })
}
