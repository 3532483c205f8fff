//! GA4 report request building.
//!
//! Four report kinds are supported. `standard` and `realtime` take caller
//! supplied metrics and dimensions; `audience` and `popular_pages` are fixed
//! presets with their own ordering. Every builder validates its inputs and
//! embeds the canonical `properties/<digits>` property name.
//!
//! A [`ReportRequest`] serializes to the GA4 Data API v1beta JSON body. The
//! property is not part of the body; it forms the request path
//! (`/v1beta/{property}:runReport`).

use serde::Serialize;
use tracing::debug;

use crate::error::Ga4Result;
use crate::validate::{
    validate_date_range, validate_dimensions, validate_limit, validate_metrics,
    validate_property_id,
};

/// Default start of the date range for standard and popular-pages reports.
pub const DEFAULT_START_DATE: &str = "7daysAgo";
/// Default end of every date range.
pub const DEFAULT_END_DATE: &str = "today";
/// Default start of the date range for audience reports.
pub const DEFAULT_AUDIENCE_START_DATE: &str = "30daysAgo";

/// Default metrics of a standard report.
pub const DEFAULT_METRICS: &str = "sessions,users,pageviews";
/// Default dimensions of a standard report.
pub const DEFAULT_DIMENSIONS: &str = "date";
/// Default metrics of a realtime report.
pub const DEFAULT_REALTIME_METRICS: &str = "activeUsers";
/// Default dimensions of a realtime report.
pub const DEFAULT_REALTIME_DIMENSIONS: &str = "country";

/// Default row limit of a standard report.
pub const DEFAULT_REPORT_LIMIT: i64 = 10;
/// Default row limit of a realtime report.
pub const DEFAULT_REALTIME_LIMIT: i64 = 10;
/// Default row limit of an audience report.
pub const DEFAULT_AUDIENCE_LIMIT: i64 = 20;
/// Default row limit of a popular-pages report.
pub const DEFAULT_PAGES_LIMIT: i64 = 15;

const AUDIENCE_DIMENSIONS: &[&str] = &["country", "city", "deviceCategory", "operatingSystem"];
const AUDIENCE_METRICS: &[&str] = &[
    "users",
    "newUsers",
    "sessions",
    "engagedSessions",
    "averageSessionDuration",
];
const AUDIENCE_ORDER_METRIC: &str = "users";

const PAGES_DIMENSIONS: &[&str] = &["pageTitle", "pagePath"];
const PAGES_METRICS: &[&str] = &[
    "screenPageViews",
    "users",
    "sessions",
    "averageSessionDuration",
    "bounceRate",
];
const PAGES_ORDER_METRIC: &str = "screenPageViews";

/// The kind of GA4 report a request was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Standard,
    Realtime,
    Audience,
    PopularPages,
}

impl ReportKind {
    /// Returns a human-readable name, used in log lines and error context.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard report",
            Self::Realtime => "realtime data",
            Self::Audience => "audience data",
            Self::PopularPages => "popular pages",
        }
    }

    /// Returns the Data API method this report kind is sent to.
    pub fn api_method(&self) -> &'static str {
        match self {
            Self::Realtime => "runRealtimeReport",
            _ => "runReport",
        }
    }
}

/// A dimension reference in a report request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimension {
    pub name: String,
}

/// A metric reference in a report request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub name: String,
}

/// A date range in a report request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

/// Ordering by a metric value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricOrderBy {
    pub metric_name: String,
}

/// A single ordering clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub metric: MetricOrderBy,
    pub desc: bool,
}

impl OrderBy {
    /// Orders rows by a metric, highest first.
    pub fn metric_desc(metric_name: impl Into<String>) -> Self {
        Self {
            metric: MetricOrderBy {
                metric_name: metric_name.into(),
            },
            desc: true,
        }
    }
}

/// A validated GA4 report request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    /// Which report kind this request was built for.
    #[serde(skip)]
    pub kind: ReportKind,
    /// Canonical property name, `properties/<digits>`.
    #[serde(skip)]
    pub property: String,
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    /// Empty for realtime reports.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub date_ranges: Vec<DateRange>,
    pub limit: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_bys: Vec<OrderBy>,
}

impl ReportRequest {
    /// Returns the requested metric names, in order.
    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name.as_str()).collect()
    }

    /// Returns the requested dimension names, in order.
    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }
}

/// Parameters of a standard report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardReportParams {
    pub property_id: String,
    pub start_date: String,
    pub end_date: String,
    pub metrics: String,
    pub dimensions: String,
    pub limit: i64,
}

impl StandardReportParams {
    /// Creates parameters with the default range, metrics, dimensions and limit.
    pub fn new(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            metrics: DEFAULT_METRICS.to_string(),
            dimensions: DEFAULT_DIMENSIONS.to_string(),
            limit: DEFAULT_REPORT_LIMIT,
        }
    }

    /// Sets the date range.
    pub fn with_date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = start.into();
        self.end_date = end.into();
        self
    }

    /// Sets the comma-separated metric names.
    pub fn with_metrics(mut self, metrics: impl Into<String>) -> Self {
        self.metrics = metrics.into();
        self
    }

    /// Sets the comma-separated dimension names.
    pub fn with_dimensions(mut self, dimensions: impl Into<String>) -> Self {
        self.dimensions = dimensions.into();
        self
    }

    /// Sets the row limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Parameters of a realtime report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeReportParams {
    pub property_id: String,
    pub metrics: String,
    pub dimensions: String,
    pub limit: i64,
}

impl RealtimeReportParams {
    /// Creates parameters with the default realtime metrics, dimensions and limit.
    pub fn new(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            metrics: DEFAULT_REALTIME_METRICS.to_string(),
            dimensions: DEFAULT_REALTIME_DIMENSIONS.to_string(),
            limit: DEFAULT_REALTIME_LIMIT,
        }
    }

    /// Sets the comma-separated metric names.
    pub fn with_metrics(mut self, metrics: impl Into<String>) -> Self {
        self.metrics = metrics.into();
        self
    }

    /// Sets the comma-separated dimension names.
    pub fn with_dimensions(mut self, dimensions: impl Into<String>) -> Self {
        self.dimensions = dimensions.into();
        self
    }

    /// Sets the row limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Parameters of the preset reports (audience, popular pages), which only
/// vary by property, date range and limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetReportParams {
    pub property_id: String,
    pub start_date: String,
    pub end_date: String,
    pub limit: i64,
}

impl PresetReportParams {
    /// Defaults for an audience report: last 30 days, 20 rows.
    pub fn audience(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            start_date: DEFAULT_AUDIENCE_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            limit: DEFAULT_AUDIENCE_LIMIT,
        }
    }

    /// Defaults for a popular-pages report: last 7 days, 15 rows.
    pub fn popular_pages(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            limit: DEFAULT_PAGES_LIMIT,
        }
    }

    /// Sets the date range.
    pub fn with_date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = start.into();
        self.end_date = end.into();
        self
    }

    /// Sets the row limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Builds a standard report request.
pub fn build_standard_report(params: &StandardReportParams) -> Ga4Result<ReportRequest> {
    let property = validate_property_id(&params.property_id)?;
    let (start_date, end_date) = validate_date_range(&params.start_date, &params.end_date)?;
    let metrics = validate_metrics(&params.metrics)?;
    let dimensions = validate_dimensions(&params.dimensions)?;
    let limit = validate_limit(params.limit)?;

    let request = ReportRequest {
        kind: ReportKind::Standard,
        property,
        dimensions: to_dimensions(dimensions),
        metrics: to_metrics(metrics),
        date_ranges: vec![DateRange {
            start_date,
            end_date,
        }],
        limit,
        order_bys: Vec::new(),
    };
    debug!("built standard report request for {}", request.property);
    Ok(request)
}

/// Builds a realtime report request. Realtime reports carry no date range.
pub fn build_realtime_report(params: &RealtimeReportParams) -> Ga4Result<ReportRequest> {
    let property = validate_property_id(&params.property_id)?;
    let metrics = validate_metrics(&params.metrics)?;
    let dimensions = validate_dimensions(&params.dimensions)?;
    let limit = validate_limit(params.limit)?;

    let request = ReportRequest {
        kind: ReportKind::Realtime,
        property,
        dimensions: to_dimensions(dimensions),
        metrics: to_metrics(metrics),
        date_ranges: Vec::new(),
        limit,
        order_bys: Vec::new(),
    };
    debug!("built realtime report request for {}", request.property);
    Ok(request)
}

/// Builds the audience preset: geography and device breakdown, most users first.
pub fn build_audience_report(params: &PresetReportParams) -> Ga4Result<ReportRequest> {
    build_preset(
        ReportKind::Audience,
        params,
        AUDIENCE_DIMENSIONS,
        AUDIENCE_METRICS,
        AUDIENCE_ORDER_METRIC,
    )
}

/// Builds the popular-pages preset: per-page traffic, most viewed first.
pub fn build_popular_pages_report(params: &PresetReportParams) -> Ga4Result<ReportRequest> {
    build_preset(
        ReportKind::PopularPages,
        params,
        PAGES_DIMENSIONS,
        PAGES_METRICS,
        PAGES_ORDER_METRIC,
    )
}

fn build_preset(
    kind: ReportKind,
    params: &PresetReportParams,
    dimensions: &[&str],
    metrics: &[&str],
    order_metric: &str,
) -> Ga4Result<ReportRequest> {
    let property = validate_property_id(&params.property_id)?;
    let (start_date, end_date) = validate_date_range(&params.start_date, &params.end_date)?;
    let limit = validate_limit(params.limit)?;

    let request = ReportRequest {
        kind,
        property,
        dimensions: dimensions
            .iter()
            .map(|name| Dimension {
                name: name.to_string(),
            })
            .collect(),
        metrics: metrics
            .iter()
            .map(|name| Metric {
                name: name.to_string(),
            })
            .collect(),
        date_ranges: vec![DateRange {
            start_date,
            end_date,
        }],
        limit,
        order_bys: vec![OrderBy::metric_desc(order_metric)],
    };
    debug!("built {} request for {}", kind.as_str(), request.property);
    Ok(request)
}

fn to_dimensions(names: Vec<String>) -> Vec<Dimension> {
    names.into_iter().map(|name| Dimension { name }).collect()
}

fn to_metrics(names: Vec<String>) -> Vec<Metric> {
    names.into_iter().map(|name| Metric { name }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Ga4ErrorCode;

    #[test]
    fn standard_report_from_parameters() {
        let params = StandardReportParams::new("123456789")
            .with_metrics("sessions,users")
            .with_dimensions("date")
            .with_limit(10);
        let request = build_standard_report(&params).unwrap();

        assert_eq!(request.kind, ReportKind::Standard);
        assert_eq!(request.property, "properties/123456789");
        assert_eq!(request.metric_names(), vec!["sessions", "users"]);
        assert_eq!(request.dimension_names(), vec!["date"]);
        assert_eq!(request.limit, 10);
        assert_eq!(
            request.date_ranges,
            vec![DateRange {
                start_date: "7daysAgo".to_string(),
                end_date: "today".to_string(),
            }]
        );
        assert!(request.order_bys.is_empty());
    }

    #[test]
    fn standard_report_defaults() {
        let request = build_standard_report(&StandardReportParams::new("properties/42")).unwrap();
        assert_eq!(request.property, "properties/42");
        assert_eq!(request.metric_names(), vec!["sessions", "users", "pageviews"]);
        assert_eq!(request.dimension_names(), vec!["date"]);
        assert_eq!(request.limit, DEFAULT_REPORT_LIMIT);
    }

    #[test]
    fn standard_report_rejects_invalid_input() {
        let bad_property = StandardReportParams::new("abc");
        assert_eq!(
            build_standard_report(&bad_property).unwrap_err().code(),
            Ga4ErrorCode::Validation
        );

        let bad_dates = StandardReportParams::new("1").with_date_range("2024-13-40", "today");
        assert!(build_standard_report(&bad_dates).is_err());

        let bad_limit = StandardReportParams::new("1").with_limit(0);
        assert!(build_standard_report(&bad_limit).is_err());

        let bad_metrics = StandardReportParams::new("1").with_metrics("sessions,,users");
        assert!(build_standard_report(&bad_metrics).is_err());
    }

    #[test]
    fn realtime_report_has_no_date_range() {
        let request = build_realtime_report(&RealtimeReportParams::new("987")).unwrap();
        assert_eq!(request.kind.api_method(), "runRealtimeReport");
        assert_eq!(request.property, "properties/987");
        assert_eq!(request.metric_names(), vec!["activeUsers"]);
        assert_eq!(request.dimension_names(), vec!["country"]);
        assert!(request.date_ranges.is_empty());

        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("dateRanges").is_none());
        assert!(body.get("property").is_none());
    }

    #[test]
    fn audience_preset() {
        let request = build_audience_report(&PresetReportParams::audience("123")).unwrap();
        assert_eq!(
            request.dimension_names(),
            vec!["country", "city", "deviceCategory", "operatingSystem"]
        );
        assert_eq!(
            request.metric_names(),
            vec![
                "users",
                "newUsers",
                "sessions",
                "engagedSessions",
                "averageSessionDuration"
            ]
        );
        assert_eq!(request.order_bys, vec![OrderBy::metric_desc("users")]);
        assert_eq!(request.limit, 20);
        assert_eq!(request.date_ranges[0].start_date, "30daysAgo");
    }

    #[test]
    fn popular_pages_preset() {
        let params = PresetReportParams::popular_pages("properties/123")
            .with_date_range("2024-01-01", "2024-01-31")
            .with_limit(5);
        let request = build_popular_pages_report(&params).unwrap();
        assert_eq!(request.kind, ReportKind::PopularPages);
        assert_eq!(request.property, "properties/123");
        assert_eq!(request.dimension_names(), vec!["pageTitle", "pagePath"]);
        assert_eq!(request.metric_names()[0], "screenPageViews");
        assert_eq!(request.order_bys, vec![OrderBy::metric_desc("screenPageViews")]);
        assert_eq!(request.limit, 5);
    }

    #[test]
    fn preset_rejects_bad_property() {
        let err = build_audience_report(&PresetReportParams::audience("UA-1234")).unwrap_err();
        assert_eq!(err.code(), Ga4ErrorCode::Validation);
    }

    #[test]
    fn popular_pages_request_body() {
        let request =
            build_popular_pages_report(&PresetReportParams::popular_pages("123")).unwrap();
        insta::assert_json_snapshot!(request, @r#"
        {
          "dimensions": [
            {
              "name": "pageTitle"
            },
            {
              "name": "pagePath"
            }
          ],
          "metrics": [
            {
              "name": "screenPageViews"
            },
            {
              "name": "users"
            },
            {
              "name": "sessions"
            },
            {
              "name": "averageSessionDuration"
            },
            {
              "name": "bounceRate"
            }
          ],
          "dateRanges": [
            {
              "startDate": "7daysAgo",
              "endDate": "today"
            }
          ],
          "limit": 15,
          "orderBys": [
            {
              "metric": {
                "metricName": "screenPageViews"
              },
              "desc": true
            }
          ]
        }
        "#);
    }
}
