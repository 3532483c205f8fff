//! GA4 Data and Admin API response shapes.
//!
//! Only the fields ga4mcp reads are modeled; everything else in the JSON is
//! ignored. Dimension and metric values are strings on the wire, including
//! numeric metrics.

use serde::Deserialize;

/// Response of `runReport` and `runRealtimeReport`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub dimension_headers: Vec<DimensionHeader>,
    #[serde(default)]
    pub metric_headers: Vec<MetricHeader>,
    #[serde(default)]
    pub rows: Vec<Row>,
    /// Total rows matching the query, which may exceed `rows.len()`.
    #[serde(default)]
    pub row_count: i64,
    /// Absent on realtime responses.
    pub metadata: Option<ResponseMetaData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DimensionHeader {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricHeader {
    pub name: String,
    /// e.g. `TYPE_INTEGER`, `TYPE_FLOAT`, `TYPE_SECONDS`.
    #[serde(rename = "type", default = "unspecified_metric_type")]
    pub metric_type: String,
}

fn unspecified_metric_type() -> String {
    "METRIC_TYPE_UNSPECIFIED".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(default)]
    pub dimension_values: Vec<Value>,
    #[serde(default)]
    pub metric_values: Vec<Value>,
}

/// A single dimension or metric value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Value {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetaData {
    #[serde(default)]
    pub data_loss_from_other_row: bool,
    pub schema_restriction_response: Option<serde_json::Value>,
    pub currency_code: Option<String>,
    pub time_zone: Option<String>,
}

/// Response of the Admin API `accounts.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAccountsResponse {
    #[serde(default)]
    pub accounts: Vec<Account>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Resource name, `accounts/<id>`.
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// Response of the Admin API `properties.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPropertiesResponse {
    #[serde(default)]
    pub properties: Vec<Property>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Resource name, `properties/<id>`.
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub currency_code: Option<String>,
    pub time_zone: Option<String>,
    /// RFC 3339 timestamp.
    pub create_time: Option<String>,
    pub parent: Option<String>,
}

/// Returns the last path segment of a resource name (`accounts/12` → `12`).
pub fn resource_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_report_response() {
        let json = r#"{
            "dimensionHeaders": [{"name": "date"}],
            "metricHeaders": [{"name": "sessions", "type": "TYPE_INTEGER"}],
            "rows": [
                {"dimensionValues": [{"value": "20240102"}], "metricValues": [{"value": "12"}]}
            ],
            "rowCount": 1,
            "metadata": {"currencyCode": "EUR", "timeZone": "Europe/Paris"},
            "kind": "analyticsData#runReport"
        }"#;

        let response: RunReportResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.row_count, 1);
        assert_eq!(response.metric_headers[0].metric_type, "TYPE_INTEGER");
        assert_eq!(response.rows[0].dimension_values[0].value, "20240102");
        let metadata = response.metadata.unwrap();
        assert!(!metadata.data_loss_from_other_row);
        assert_eq!(metadata.currency_code.as_deref(), Some("EUR"));
    }

    #[test]
    fn parse_empty_realtime_response() {
        let response: RunReportResponse =
            serde_json::from_str(r#"{"kind": "analyticsData#runRealtimeReport"}"#).unwrap();
        assert_eq!(response.row_count, 0);
        assert!(response.rows.is_empty());
        assert!(response.metadata.is_none());
    }

    #[test]
    fn parse_admin_listings() {
        let accounts: ListAccountsResponse = serde_json::from_str(
            r#"{"accounts": [{"name": "accounts/100", "displayName": "Acme"}], "nextPageToken": "t"}"#,
        )
        .unwrap();
        assert_eq!(accounts.accounts[0].display_name, "Acme");
        assert_eq!(accounts.next_page_token.as_deref(), Some("t"));

        let properties: ListPropertiesResponse = serde_json::from_str(
            r#"{"properties": [{"name": "properties/7", "displayName": "Site", "parent": "accounts/100"}]}"#,
        )
        .unwrap();
        assert_eq!(properties.properties[0].parent.as_deref(), Some("accounts/100"));
        assert!(properties.next_page_token.is_none());
    }

    #[test]
    fn resource_id_takes_last_segment() {
        assert_eq!(resource_id("accounts/12"), "12");
        assert_eq!(resource_id("properties/345"), "345");
        assert_eq!(resource_id("bare"), "bare");
    }
}
