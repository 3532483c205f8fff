//! Formatting of GA4 responses into flat, serializable shapes.
//!
//! Row order is kept exactly as returned by the API and values are carried
//! through as the strings GA4 produced. No numeric coercion happens here.

use serde::Serialize;
use tracing::debug;

use crate::response::{Account, Property, RunReportResponse, resource_id};

/// A formatted report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedReport {
    pub row_count: i64,
    /// Only present for standard (non-realtime) reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ReportMetadata>,
    pub dimension_headers: Vec<String>,
    pub metric_headers: Vec<MetricHeaderInfo>,
    pub rows: Vec<FormattedRow>,
}

/// Report metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    pub data_loss_from_other_row: bool,
    pub schema_restriction_response: Option<serde_json::Value>,
    pub currency_code: Option<String>,
    pub time_zone: Option<String>,
}

/// A metric column header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricHeaderInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: String,
}

/// One row of dimension and metric values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedRow {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
}

/// Formats a `runReport` response, including its metadata.
pub fn format_report(response: RunReportResponse) -> FormattedReport {
    let metadata = match &response.metadata {
        Some(m) => ReportMetadata {
            data_loss_from_other_row: m.data_loss_from_other_row,
            schema_restriction_response: m.schema_restriction_response.clone(),
            currency_code: m.currency_code.clone(),
            time_zone: m.time_zone.clone(),
        },
        None => ReportMetadata {
            data_loss_from_other_row: false,
            schema_restriction_response: None,
            currency_code: None,
            time_zone: None,
        },
    };

    let mut report = format_rows(response);
    report.metadata = Some(metadata);
    debug!("formatted report response with {} rows", report.row_count);
    report
}

/// Formats a `runRealtimeReport` response. Realtime reports have no metadata.
pub fn format_realtime(response: RunReportResponse) -> FormattedReport {
    let report = format_rows(response);
    debug!("formatted realtime response with {} rows", report.row_count);
    report
}

fn format_rows(response: RunReportResponse) -> FormattedReport {
    FormattedReport {
        row_count: response.row_count,
        metadata: None,
        dimension_headers: response
            .dimension_headers
            .into_iter()
            .map(|h| h.name)
            .collect(),
        metric_headers: response
            .metric_headers
            .into_iter()
            .map(|h| MetricHeaderInfo {
                name: h.name,
                metric_type: h.metric_type,
            })
            .collect(),
        rows: response
            .rows
            .into_iter()
            .map(|row| FormattedRow {
                dimensions: row.dimension_values.into_iter().map(|v| v.value).collect(),
                metrics: row.metric_values.into_iter().map(|v| v.value).collect(),
            })
            .collect(),
    }
}

/// An account and the properties listed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountListing {
    pub account_id: String,
    pub account_name: String,
    pub account_resource_name: String,
    pub properties: Vec<PropertyListing>,
    /// Set when listing this account's properties failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties_error: Option<String>,
}

impl AccountListing {
    /// Creates a listing for an account with no properties yet.
    pub fn from_account(account: &Account) -> Self {
        Self {
            account_id: resource_id(&account.name).to_string(),
            account_name: account.display_name.clone(),
            account_resource_name: account.name.clone(),
            properties: Vec::new(),
            properties_error: None,
        }
    }
}

/// A GA4 property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyListing {
    pub property_id: String,
    pub property_name: String,
    pub property_resource_name: String,
    pub currency_code: Option<String>,
    pub time_zone: Option<String>,
    pub create_time: Option<String>,
    pub parent: String,
}

impl PropertyListing {
    /// Creates a listing entry for a property found under `parent`.
    pub fn from_property(property: &Property, parent: &str) -> Self {
        Self {
            property_id: resource_id(&property.name).to_string(),
            property_name: property.display_name.clone(),
            property_resource_name: property.name.clone(),
            currency_code: property.currency_code.clone(),
            time_zone: property.time_zone.clone(),
            create_time: property.create_time.clone(),
            parent: parent.to_string(),
        }
    }
}

/// All accessible accounts and properties, with totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertiesListing {
    pub accounts: Vec<AccountListing>,
    pub total_accounts: usize,
    pub total_properties: usize,
}

/// Wraps account listings with their totals.
pub fn format_properties(accounts: Vec<AccountListing>) -> PropertiesListing {
    let total_properties = accounts.iter().map(|a| a.properties.len()).sum();
    PropertiesListing {
        total_accounts: accounts.len(),
        total_properties,
        accounts,
    }
}

/// Formats an error for a tool caller: `Error <context>: <message>`.
pub fn format_error(context: &str, error: &dyn std::fmt::Display) -> String {
    if context.is_empty() {
        format!("Error: {}", error)
    } else {
        format!("Error {}: {}", context, error)
    }
}
