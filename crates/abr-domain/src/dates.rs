//! `YYYYMMDD` date parsing with sentinel normalization.
//!
//! The ABR source encodes "not applicable" as the literal date `19000101`.
//! [`parse_abr_date`] folds that sentinel, and any other malformed string,
//! to `None` rather than surfacing a parse error — a malformed date must
//! never abort ingestion of an otherwise-valid record.

use chrono::NaiveDate;

const SENTINEL: &str = "19000101";

/// Parses a raw `YYYYMMDD` date string from the ABR feed.
///
/// Returns `None` for the sentinel `19000101`, for an empty/whitespace
/// string, and for anything that doesn't parse as a valid calendar date.
pub fn parse_abr_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == SENTINEL {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_normalizes_to_none() {
        assert_eq!(parse_abr_date("19000101"), None);
    }

    #[test]
    fn valid_date_parses() {
        assert_eq!(
            parse_abr_date("20230115"),
            NaiveDate::from_ymd_opt(2023, 1, 15)
        );
    }

    #[test]
    fn malformed_date_normalizes_to_none() {
        assert_eq!(parse_abr_date("not-a-date"), None);
        assert_eq!(parse_abr_date("20231332"), None);
        assert_eq!(parse_abr_date(""), None);
        assert_eq!(parse_abr_date("   "), None);
    }
}
