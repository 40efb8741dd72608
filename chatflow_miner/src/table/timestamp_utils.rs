//! Shared timestamp parsing utilities for event tables

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Parse a timestamp string to `DateTime<FixedOffset>`, trying multiple formats.
///
/// Used by the CSV loader, by timestamp normalization and by every filter or
/// aggregator that reads timestamp columns holding raw Strings.
///
/// # Arguments
/// * `time` - The timestamp string to parse
/// * `custom_format` - Optional custom date format to try first
/// * `verbose` - Whether to log parsing failures
///
/// # Supported Formats (in order of precedence)
/// 1. Custom format (if provided) - tries both with timezone and as naive (assumes UTC)
/// 2. RFC3339: `2023-10-06T09:30:21+00:00`
/// 3. ISO 8601 with offset (no colon): `2023-10-06T09:30:21+0000`
/// 4. RFC2822: `Fri, 06 Oct 2023 09:30:21 +0000`
/// 5. Naive datetime with optional fractional seconds: `2023-10-06 09:30:21.890421` (assumes UTC)
/// 6. Naive ISO 8601 with optional fractional seconds: `2023-10-06T09:30:21.348555` (assumes UTC)
/// 7. Naive with UTC suffix: `2023-10-06 09:30:21 UTC`
/// 8. Naive without seconds: `2021-01-01T10:30` or `2021-01-01 10:30` (assumes UTC)
/// 9. Plain date: `2021-01-01` (midnight, assumes UTC)
pub fn parse_timestamp<'a>(
    time: &'a str,
    custom_format: Option<&'a str>,
    verbose: bool,
) -> Result<DateTime<FixedOffset>, &'a str> {
    if let Some(date_format) = custom_format {
        if let Ok(dt) = DateTime::parse_from_str(time, date_format) {
            return Ok(dt);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(time, date_format) {
            return Ok(dt.and_utc().into());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(time) {
        return Ok(dt);
    }

    // +0000 timezone (no colon)
    if let Ok(dt) = DateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(time) {
        return Ok(dt);
    }

    // "2023-10-06 09:30:21.890421" and "2023-10-06 09:30:21", assuming UTC
    if let Ok(dt) = NaiveDateTime::parse_from_str(time, "%F %T%.f") {
        return Ok(dt.and_utc().into());
    }

    // "2024-10-02T07:55:15.348555" and "2022-01-09T15:00:00", assuming UTC
    if let Ok(dt) = NaiveDateTime::parse_from_str(time, "%FT%T%.f") {
        return Ok(dt.and_utc().into());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(time, "%F %T UTC") {
        return Ok(dt.and_utc().into());
    }

    // Minute precision, as typed into time window bounds
    for format in ["%FT%H:%M", "%F %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(time, format) {
            return Ok(dt.and_utc().into());
        }
    }

    if let Ok(d) = NaiveDate::parse_from_str(time, "%F") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().into());
        }
    }

    if verbose {
        tracing::warn!(value = time, "Failed to parse timestamp");
    }
    Err("Unexpected timestamp format")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339() {
        let result = parse_timestamp("2023-10-06T09:30:21+00:00", None, false);
        assert!(result.is_ok());
    }

    #[test]
    fn test_naive_datetime() {
        let result = parse_timestamp("2023-10-06 09:30:21.890421", None, false);
        assert!(result.is_ok());
        let result = parse_timestamp("2023-10-06 09:30:21", None, false);
        assert!(result.is_ok());
    }

    #[test]
    fn test_naive_iso() {
        let result = parse_timestamp("2023-10-06T09:30:21", None, false);
        assert!(result.is_ok());
    }

    #[test]
    fn test_minute_precision_and_plain_date() {
        let dt = parse_timestamp("2021-01-01T10:30", None, false).unwrap();
        assert_eq!(dt.to_rfc3339(), "2021-01-01T10:30:00+00:00");
        let dt = parse_timestamp("2021-01-01", None, false).unwrap();
        assert_eq!(dt.to_rfc3339(), "2021-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_custom_format() {
        let result = parse_timestamp("06/10/2023 09:30:21", Some("%d/%m/%Y %H:%M:%S"), false);
        assert!(result.is_ok());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_timestamp("yesterday", None, false).is_err());
        assert!(parse_timestamp("", None, false).is_err());
    }
}
