//! Holdings list parsing and Tokyo ticker normalization.
//!
//! Input format is `code[:shares]` items separated by commas, e.g.
//! `"7203:100, 9984:200, 8035"`. Full-width commas are accepted because the
//! lists tend to be pasted out of Japanese spreadsheets.

use anyhow::{bail, Result};

const DEFAULT_SHARES: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub code: String,
    pub shares: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = input.replace('，', ",");
        let mut holdings = Vec::new();

        for item in normalized.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }

            let (code, shares) = match item.split_once(':') {
                Some((code, shares_str)) => {
                    let shares: f64 = match shares_str.trim().parse() {
                        Ok(v) => v,
                        Err(_) => bail!("invalid share count in '{item}'"),
                    };
                    if !shares.is_finite() || shares <= 0.0 {
                        bail!("share count must be positive in '{item}'");
                    }
                    (code.trim(), shares)
                }
                None => (item, DEFAULT_SHARES),
            };

            let code = sanitize_code(code)?;
            holdings.push(Holding { code, shares });
        }

        if holdings.is_empty() {
            bail!("no valid holdings in input");
        }

        Ok(Self { holdings })
    }
}

fn sanitize_code(raw: &str) -> Result<String> {
    let cleaned = raw.trim().to_ascii_uppercase();
    if cleaned.is_empty() {
        bail!("empty ticker code");
    }
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '-'))
    {
        bail!("invalid ticker code '{raw}'");
    }
    Ok(cleaned)
}

/// Map a user-facing code to the provider symbol.
///
/// Bare Tokyo codes (`7203`, and newer alphanumeric ones like `285A`) get the
/// `.T` suffix; anything already carrying a suffix or a non-Tokyo symbol
/// (`^N225`, `AAPL`) passes through uppercased.
pub fn normalize_symbol(raw: &str) -> String {
    let up = raw.trim().to_ascii_uppercase();
    if up.ends_with(".T") {
        return up;
    }
    let is_tokyo_code = up.len() == 4
        && up.chars().next().is_some_and(|c| c.is_ascii_digit())
        && up.chars().all(|c| c.is_ascii_alphanumeric());
    if is_tokyo_code {
        format!("{up}.T")
    } else {
        up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_with_and_without_shares() {
        let p = Portfolio::parse("7203:100, 9984:200, 8035").unwrap();
        assert_eq!(p.holdings.len(), 3);
        assert_eq!(p.holdings[0], Holding { code: "7203".into(), shares: 100.0 });
        assert_eq!(p.holdings[2], Holding { code: "8035".into(), shares: 100.0 });
    }

    #[test]
    fn accepts_full_width_commas_and_blank_items() {
        let p = Portfolio::parse("7203:50，9984:25，, ").unwrap();
        assert_eq!(p.holdings.len(), 2);
        assert_eq!(p.holdings[1].shares, 25.0);
    }

    #[test]
    fn rejects_bad_share_counts() {
        assert!(Portfolio::parse("7203:abc").is_err());
        assert!(Portfolio::parse("7203:0").is_err());
        assert!(Portfolio::parse("7203:-10").is_err());
        assert!(Portfolio::parse("7203:inf").is_err());
    }

    #[test]
    fn rejects_empty_and_garbage_input() {
        assert!(Portfolio::parse("").is_err());
        assert!(Portfolio::parse(" , ，").is_err());
        assert!(Portfolio::parse("72;03:100").is_err());
    }

    #[test]
    fn normalizes_tokyo_codes() {
        assert_eq!(normalize_symbol("7203"), "7203.T");
        assert_eq!(normalize_symbol("9432.t"), "9432.T");
        assert_eq!(normalize_symbol("285a"), "285A.T");
        assert_eq!(normalize_symbol("^N225"), "^N225");
        assert_eq!(normalize_symbol("aapl"), "AAPL");
        assert_eq!(normalize_symbol("1306.T"), "1306.T");
    }
}
