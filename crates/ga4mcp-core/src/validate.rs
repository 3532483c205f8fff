//! Validation of caller-supplied report parameters.
//!
//! Everything here is pure: inputs are checked and normalized before they are
//! embedded into a GA4 request. Metric and dimension names are checked against
//! a short list of common names, but unknown names are only logged. The GA4
//! catalog is large and versioned independently, so the list is advisory.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{Ga4Error, Ga4Result};

/// Prefix of a GA4 property resource name.
pub const PROPERTY_PREFIX: &str = "properties/";

/// Upper bound for a report row limit.
pub const MAX_REPORT_LIMIT: i64 = 100_000;

/// Default maximum length accepted by [`sanitize_string`].
pub const MAX_STRING_LENGTH: usize = 1000;

static RELATIVE_DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(daysAgo|weeksAgo|monthsAgo|yearsAgo)$|^(today|yesterday)$")
        .expect("Invalid relative date regex")
});

static ABSOLUTE_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid absolute date regex"));

/// Common GA4 metric names.
static KNOWN_METRICS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "sessions",
        "users",
        "newUsers",
        "pageviews",
        "screenPageViews",
        "bounceRate",
        "averageSessionDuration",
        "sessionDuration",
        "engagedSessions",
        "engagementRate",
        "engagedSessionsPerUser",
        "conversions",
        "totalRevenue",
        "purchaseRevenue",
        "activeUsers",
        "active1DayUsers",
        "active7DayUsers",
        "active28DayUsers",
    ]
    .into_iter()
    .collect()
});

/// Common GA4 dimension names.
static KNOWN_DIMENSIONS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "date",
        "year",
        "month",
        "week",
        "day",
        "hour",
        "country",
        "region",
        "city",
        "continent",
        "subContinent",
        "deviceCategory",
        "operatingSystem",
        "browser",
        "platform",
        "source",
        "medium",
        "campaign",
        "channelGroup",
        "pageTitle",
        "pagePath",
        "pageLocation",
        "landingPage",
    ]
    .into_iter()
    .collect()
});

/// Validates a GA4 property id and returns it as `properties/<digits>`.
///
/// Accepts both `123456789` and `properties/123456789`.
pub fn validate_property_id(property_id: &str) -> Ga4Result<String> {
    if property_id.is_empty() {
        return Err(Ga4Error::validation("property ID cannot be empty"));
    }

    let digits = property_id
        .strip_prefix(PROPERTY_PREFIX)
        .unwrap_or(property_id);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Ga4Error::validation(format!(
            "invalid property ID: {}. Expected numeric ID or 'properties/123456789' format",
            property_id
        )));
    }

    let canonical = format!("{}{}", PROPERTY_PREFIX, digits);
    debug!("validated property ID: {}", canonical);
    Ok(canonical)
}

/// Validates a GA4 date range.
///
/// Each side is either a relative date (`today`, `yesterday`, `NdaysAgo`,
/// `NweeksAgo`, `NmonthsAgo`, `NyearsAgo`) or a real `YYYY-MM-DD` date.
pub fn validate_date_range(start_date: &str, end_date: &str) -> Ga4Result<(String, String)> {
    let start = validate_single_date(start_date, "start date")?;
    let end = validate_single_date(end_date, "end date")?;
    debug!("validated date range: {} to {}", start, end);
    Ok((start, end))
}

fn validate_single_date(date: &str, side: &str) -> Ga4Result<String> {
    if date.is_empty() {
        return Err(Ga4Error::validation(format!("{} cannot be empty", side)));
    }

    if RELATIVE_DATE_REGEX.is_match(date) {
        return Ok(date.to_string());
    }

    if ABSOLUTE_DATE_REGEX.is_match(date) {
        return match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            Ok(_) => Ok(date.to_string()),
            Err(e) => Err(Ga4Error::validation(format!(
                "invalid {}: {} is not a calendar date ({})",
                side, date, e
            ))),
        };
    }

    Err(Ga4Error::validation(format!(
        "invalid {} format: {}. Use YYYY-MM-DD or relative format like '7daysAgo', 'today'",
        side, date
    )))
}

/// Validates a comma-separated list of metric names.
pub fn validate_metrics(metrics: &str) -> Ga4Result<Vec<String>> {
    let names = split_names(metrics, "metric")?;
    for name in &names {
        if !KNOWN_METRICS.contains(name.as_str()) {
            warn!("unknown metric '{}' - proceeding anyway", name);
        }
    }
    debug!("validated metrics: {:?}", names);
    Ok(names)
}

/// Validates a comma-separated list of dimension names.
pub fn validate_dimensions(dimensions: &str) -> Ga4Result<Vec<String>> {
    let names = split_names(dimensions, "dimension")?;
    for name in &names {
        if !KNOWN_DIMENSIONS.contains(name.as_str()) {
            warn!("unknown dimension '{}' - proceeding anyway", name);
        }
    }
    debug!("validated dimensions: {:?}", names);
    Ok(names)
}

fn split_names(csv: &str, kind: &str) -> Ga4Result<Vec<String>> {
    if csv.is_empty() {
        return Err(Ga4Error::validation(format!("{}s cannot be empty", kind)));
    }

    let names: Vec<String> = csv.split(',').map(|s| s.trim().to_string()).collect();
    if names.iter().any(String::is_empty) {
        return Err(Ga4Error::validation(format!(
            "empty {} name found in '{}'",
            kind, csv
        )));
    }
    Ok(names)
}

/// Validates a row limit against [`MAX_REPORT_LIMIT`].
pub fn validate_limit(limit: i64) -> Ga4Result<i64> {
    validate_limit_with_max(limit, MAX_REPORT_LIMIT)
}

/// Validates a row limit: it must be between 1 and `max_limit` inclusive.
pub fn validate_limit_with_max(limit: i64, max_limit: i64) -> Ga4Result<i64> {
    if limit < 1 {
        return Err(Ga4Error::validation(format!(
            "limit must be at least 1, got {}",
            limit
        )));
    }
    if limit > max_limit {
        return Err(Ga4Error::validation(format!(
            "limit cannot exceed {}, got {}",
            max_limit, limit
        )));
    }
    debug!("validated limit: {}", limit);
    Ok(limit)
}

/// Length-gates a free-form string and strips `<`, `>`, `"` and `'`.
///
/// This is not an encoder, only a filter for characters that commonly break
/// out of markup or quoted contexts downstream.
pub fn sanitize_string(input: &str, max_length: usize) -> Ga4Result<String> {
    let length = input.chars().count();
    if length > max_length {
        return Err(Ga4Error::validation(format!(
            "input too long: {} > {}",
            length, max_length
        )));
    }

    Ok(input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\''))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Ga4ErrorCode;

    #[test]
    fn property_id_is_canonicalized() {
        for id in ["1", "123456789", "000042"] {
            let expected = format!("properties/{}", id);
            assert_eq!(validate_property_id(id).unwrap(), expected);
            assert_eq!(
                validate_property_id(&format!("properties/{}", id)).unwrap(),
                expected
            );
        }
    }

    #[test]
    fn property_id_rejects_non_digits() {
        for id in [
            "",
            "abc",
            "properties/",
            "properties/abc",
            "12a4",
            "-12",
            " 123",
            "properties/properties/1",
        ] {
            let err = validate_property_id(id).unwrap_err();
            assert_eq!(err.code(), Ga4ErrorCode::Validation, "{id:?} should fail");
        }
    }

    #[test]
    fn relative_dates_are_accepted() {
        assert!(validate_date_range("7daysAgo", "today").is_ok());
        assert!(validate_date_range("2weeksAgo", "yesterday").is_ok());
        assert!(validate_date_range("3monthsAgo", "1yearsAgo").is_ok());
        assert!(validate_date_range("2024-01-01", "2024-02-29").is_ok());
    }

    #[test]
    fn invalid_calendar_date_is_rejected() {
        let err = validate_date_range("2024-13-40", "today").unwrap_err();
        assert_eq!(err.code(), Ga4ErrorCode::Validation);
        assert!(err.message().contains("start date"));

        let err = validate_date_range("today", "2023-02-29").unwrap_err();
        assert!(err.message().contains("end date"));
    }

    #[test]
    fn empty_and_malformed_dates_are_rejected() {
        let err = validate_date_range("", "today").unwrap_err();
        assert!(err.message().contains("start date cannot be empty"));

        let err = validate_date_range("7daysago", "today").unwrap_err();
        assert!(err.message().contains("format"));

        assert!(validate_date_range("today", "tomorrow").is_err());
        assert!(validate_date_range("daysAgo", "today").is_err());
        assert!(validate_date_range("2024-1-01", "today").is_err());
    }

    #[test]
    fn metrics_are_split_and_trimmed() {
        assert_eq!(
            validate_metrics("sessions, users ,pageviews").unwrap(),
            vec!["sessions", "users", "pageviews"]
        );
    }

    #[test]
    fn unknown_names_are_only_advisory() {
        assert_eq!(
            validate_metrics("sessions,someCustomMetric").unwrap(),
            vec!["sessions", "someCustomMetric"]
        );
        assert_eq!(
            validate_dimensions("customEvent:plan").unwrap(),
            vec!["customEvent:plan"]
        );
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(validate_metrics("").is_err());
        assert!(validate_metrics("sessions,,users").is_err());
        assert!(validate_metrics("  ").is_err());
        assert!(validate_dimensions("").is_err());
        assert!(validate_dimensions("date,").is_err());
    }

    #[test]
    fn limit_bounds() {
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(-5).is_err());
        assert!(validate_limit(100_001).is_err());
        assert_eq!(validate_limit(1).unwrap(), 1);
        assert_eq!(validate_limit(100_000).unwrap(), 100_000);
        assert!(validate_limit_with_max(11, 10).is_err());
    }

    #[test]
    fn sanitize_strips_markup_characters() {
        assert_eq!(
            sanitize_string("  <b>\"it's\"</b>  ", MAX_STRING_LENGTH).unwrap(),
            "bits/b"
        );
        assert_eq!(sanitize_string("plain", 10).unwrap(), "plain");
        assert!(sanitize_string("toolong", 3).is_err());
    }
}
