//! Percentage-return arithmetic shared by the snapshot builder and the
//! benchmark chain. Pure functions, no I/O.
//!
//! MTD (month-to-date) is measured from the OPEN of the first trading day of
//! the current month in Japan Standard Time to the latest close. Tokyo has no
//! daylight saving, so a fixed UTC+9 offset is exact.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};

pub const JST_OFFSET_SECS: i32 = 9 * 3600;

pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).expect("UTC+9 is a valid offset")
}

/// Current wall-clock time in Tokyo
pub fn now_jst() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&jst())
}

/// First calendar day of the current month, as seen from Tokyo.
///
/// Careful around month boundaries: late-evening UTC on the 31st is already
/// the 1st in JST, and the month rolls over with it.
pub fn month_start_jst(now_utc: DateTime<Utc>) -> NaiveDate {
    let local = now_utc.with_timezone(&jst()).date_naive();
    local.with_day(1).expect("day 1 exists in every month")
}

/// Unix timestamp of midnight JST on the given date, for provider
/// `period1` parameters.
pub fn jst_midnight_epoch(date: NaiveDate) -> i64 {
    jst()
        .from_local_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
        .single()
        .expect("fixed offsets have no DST gaps")
        .timestamp()
}

/// `(to - from) / from`, guarded the way the original dashboard guarded its
/// divisions: a non-positive or non-finite base yields no value rather than
/// an infinity.
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    if !from.is_finite() || !to.is_finite() || from <= 0.0 {
        return None;
    }
    Some((to - from) / from)
}

/// Share-weighted month-to-date return over `(month_open, latest, shares)`
/// triples: total current value vs total month-open value.
pub fn portfolio_return(rows: &[(f64, f64, f64)]) -> Option<f64> {
    let mut open_value = 0.0;
    let mut current_value = 0.0;
    for &(month_open, latest, shares) in rows {
        if !month_open.is_finite() || !latest.is_finite() || !shares.is_finite() {
            continue;
        }
        open_value += month_open * shares;
        current_value += latest * shares;
    }
    pct_change(open_value, current_value)
}

/// Portfolio return minus the benchmark return. The benchmark defaults to
/// 0.0 when unavailable, matching the dashboard's degraded mode, so alpha is
/// only absent when the portfolio itself has no return.
pub fn alpha(portfolio_mtd: Option<f64>, benchmark_mtd: Option<f64>) -> Option<f64> {
    portfolio_mtd.map(|p| p - benchmark_mtd.unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn pct_change_basic() {
        assert_eq!(pct_change(100.0, 105.0), Some(0.05));
        assert_eq!(pct_change(200.0, 190.0), Some(-0.05));
    }

    #[test]
    fn pct_change_guards_bad_bases() {
        assert_eq!(pct_change(0.0, 10.0), None);
        assert_eq!(pct_change(-5.0, 10.0), None);
        assert_eq!(pct_change(f64::NAN, 10.0), None);
        assert_eq!(pct_change(10.0, f64::INFINITY), None);
    }

    #[test]
    fn month_start_follows_tokyo_not_utc() {
        // 2026-07-31 20:00 UTC is already 2026-08-01 05:00 in Tokyo.
        let now = Utc.with_ymd_and_hms(2026, 7, 31, 20, 0, 0).unwrap();
        assert_eq!(
            month_start_jst(now),
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
        );

        // Midday UTC on the same date is still July in Tokyo.
        let now = Utc.with_ymd_and_hms(2026, 7, 31, 12, 0, 0).unwrap();
        assert_eq!(
            month_start_jst(now),
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
        );
    }

    #[test]
    fn jst_midnight_epoch_is_nine_hours_before_utc_midnight() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let utc_midnight = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap().timestamp();
        assert_eq!(jst_midnight_epoch(date), utc_midnight - 9 * 3600);
    }

    #[test]
    fn portfolio_return_is_value_weighted() {
        // 100 shares opening at 100 -> 110, 10 shares opening at 1000 -> 950.
        let rows = [(100.0, 110.0, 100.0), (1000.0, 950.0, 10.0)];
        // open 20_000 -> current 20_500
        let r = portfolio_return(&rows).unwrap();
        assert!((r - 0.025).abs() < 1e-12);
    }

    #[test]
    fn portfolio_return_empty_or_zero_open_is_none() {
        assert_eq!(portfolio_return(&[]), None);
        assert_eq!(portfolio_return(&[(0.0, 10.0, 1.0)]), None);
    }

    #[test]
    fn alpha_substitutes_zero_for_missing_benchmark() {
        assert_eq!(alpha(Some(0.03), Some(0.01)), Some(0.02));
        assert_eq!(alpha(Some(0.03), None), Some(0.03));
        assert_eq!(alpha(None, Some(0.01)), None);
    }
}
