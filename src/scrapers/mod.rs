pub mod chart_api; // Yahoo-v8-chart-style provider client (primary source)
pub mod kabutan; // HTML fallback B: Kabutan index page
pub mod yahoo_jp_board; // HTML fallback A: Yahoo Finance Japan price board

use once_cell::sync::Lazy;
use regex::Regex;

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([+\-−＋]?[\d,]+(?:\.\d+)?)\s*[%％]").expect("percent regex compiles")
});

/// Parse a number as rendered on Japanese finance sites: thousands commas,
/// occasional full-width sign characters.
pub(crate) fn parse_jp_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter_map(|c| match c {
            ',' | '，' => None,
            '−' => Some('-'),
            '＋' => Some('+'),
            c => Some(c),
        })
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Extract the first signed percentage from free text ("前日比 +12.34（+0.52%）")
/// and return it as a fraction (0.0052).
pub(crate) fn parse_signed_percent(text: &str) -> Option<f64> {
    let captures = PERCENT_RE.captures(text)?;
    parse_jp_number(captures.get(1)?.as_str()).map(|pct| pct / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_numbers() {
        assert_eq!(parse_jp_number("2,720.5"), Some(2720.5));
        assert_eq!(parse_jp_number(" 39,810 "), Some(39810.0));
        assert_eq!(parse_jp_number("−12.3"), Some(-12.3));
        assert_eq!(parse_jp_number("＋4.5"), Some(4.5));
        assert_eq!(parse_jp_number("n/a"), None);
    }

    #[test]
    fn extracts_percent_as_fraction() {
        assert_eq!(parse_signed_percent("前日比 +12.34（+0.52%）"), Some(0.0052));
        assert_eq!(parse_signed_percent("−1.20％"), Some(-0.012));
        assert_eq!(parse_signed_percent("1,234円"), None);
    }
}
