//! Core types: errors, tracing, request validation, report building, formatting

pub mod error;
pub mod format;
pub mod report;
pub mod response;
pub mod tracing;
pub mod validate;

pub use error::{Ga4Error, Ga4ErrorCode, Ga4Result};
pub use format::{
    AccountListing, FormattedReport, FormattedRow, MetricHeaderInfo, PropertiesListing,
    PropertyListing, ReportMetadata, format_error, format_properties, format_realtime,
    format_report,
};
pub use report::{
    PresetReportParams, RealtimeReportParams, ReportKind, ReportRequest, StandardReportParams,
    build_audience_report, build_popular_pages_report, build_realtime_report,
    build_standard_report,
};
pub use response::RunReportResponse;
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
