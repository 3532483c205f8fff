//! GA4 Data and Admin API client.
//!
//! Requests are plain REST calls with bearer authentication. The access token
//! is refreshed in memory before a call when its expiry has passed or is
//! unknown and a refresh token is available.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use ga4mcp_core::report::{
    PresetReportParams, RealtimeReportParams, ReportRequest, StandardReportParams,
    build_audience_report, build_popular_pages_report, build_realtime_report,
    build_standard_report,
};
use ga4mcp_core::response::{
    Account, ListAccountsResponse, ListPropertiesResponse, Property, RunReportResponse,
};
use ga4mcp_core::{
    AccountListing, FormattedReport, Ga4Error, Ga4Result, PropertiesListing, PropertyListing,
    format_properties, format_realtime, format_report,
};

use crate::credentials::Credential;
use crate::oauth::{build_http_client, refresh_access_token};

/// Base URL for the GA4 Data API.
pub const DATA_API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
/// Base URL for the GA4 Admin API.
pub const ADMIN_API_BASE: &str = "https://analyticsadmin.googleapis.com/v1beta";

/// Page size used for Admin API listings.
const ADMIN_PAGE_SIZE: u32 = 200;

/// Error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Client for GA4 reports and property listings.
#[derive(Debug)]
pub struct Ga4Client {
    http_client: reqwest::Client,
    credential: RwLock<Credential>,
    data_api_base: String,
    admin_api_base: String,
}

impl Ga4Client {
    /// Creates a client bound to the given credential.
    pub fn new(credential: Credential, timeout: Duration) -> Ga4Result<Self> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            credential: RwLock::new(credential),
            data_api_base: DATA_API_BASE.to_string(),
            admin_api_base: ADMIN_API_BASE.to_string(),
        })
    }

    /// Overrides the Data API base URL.
    pub fn with_data_api_base(mut self, base: impl Into<String>) -> Self {
        self.data_api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the Admin API base URL.
    pub fn with_admin_api_base(mut self, base: impl Into<String>) -> Self {
        self.admin_api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns a copy of the current credential, including refreshed tokens.
    pub async fn credential(&self) -> Credential {
        self.credential.read().await.clone()
    }

    /// Runs a `runReport` with caller-chosen metrics and dimensions.
    pub async fn standard_report(
        &self,
        params: &StandardReportParams,
    ) -> Ga4Result<FormattedReport> {
        let request = build_standard_report(params)?;
        Ok(format_report(self.run_report(&request).await?))
    }

    /// Runs a `runRealtimeReport`. The result carries no metadata.
    pub async fn realtime_report(
        &self,
        params: &RealtimeReportParams,
    ) -> Ga4Result<FormattedReport> {
        let request = build_realtime_report(params)?;
        Ok(format_realtime(self.run_report(&request).await?))
    }

    /// Runs the audience preset.
    pub async fn audience_report(&self, params: &PresetReportParams) -> Ga4Result<FormattedReport> {
        let request = build_audience_report(params)?;
        Ok(format_report(self.run_report(&request).await?))
    }

    /// Runs the popular pages preset.
    pub async fn popular_pages(&self, params: &PresetReportParams) -> Ga4Result<FormattedReport> {
        let request = build_popular_pages_report(params)?;
        Ok(format_report(self.run_report(&request).await?))
    }

    /// Lists every accessible account with its properties.
    ///
    /// Failing to list one account's properties is recorded on that account
    /// and does not fail the whole listing.
    pub async fn list_properties(&self) -> Ga4Result<PropertiesListing> {
        let accounts = self
            .list_accounts()
            .await
            .map_err(|e| e.context("failed to list properties"))?;

        let mut listings = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let mut listing = AccountListing::from_account(account);
            match self.list_account_properties(&account.name).await {
                Ok(properties) => {
                    listing.properties = properties
                        .iter()
                        .map(|p| PropertyListing::from_property(p, &account.name))
                        .collect();
                }
                Err(e) => {
                    warn!("failed to list properties of {}: {}", account.name, e);
                    listing.properties_error = Some(e.to_string());
                }
            }
            listings.push(listing);
        }

        let listing = format_properties(listings);
        info!(
            "found {} properties across {} accounts",
            listing.total_properties, listing.total_accounts
        );
        Ok(listing)
    }

    async fn run_report(&self, request: &ReportRequest) -> Ga4Result<RunReportResponse> {
        let context = format!("failed to get {}", request.kind.as_str());
        let url = format!(
            "{}/{}:{}",
            self.data_api_base,
            request.property,
            request.kind.api_method()
        );

        let body = serde_json::to_string(request).map_err(|e| {
            Ga4Error::api(format!("failed to encode request: {}", e))
                .with_source(e)
                .context(&context)
        })?;

        debug!(
            "POST {} metrics={:?} dimensions={:?}",
            url,
            request.metric_names(),
            request.dimension_names()
        );
        let token = self.access_token().await.map_err(|e| e.context(&context))?;
        let builder = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        let response: RunReportResponse =
            self.send(builder).await.map_err(|e| e.context(&context))?;
        info!(
            "retrieved {} with {} rows for {}",
            request.kind.as_str(),
            response.rows.len(),
            request.property
        );
        Ok(response)
    }

    async fn list_accounts(&self) -> Ga4Result<Vec<Account>> {
        let url = format!("{}/accounts", self.admin_api_base);
        let mut accounts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.access_token().await?;
            let mut builder = self
                .http_client
                .get(&url)
                .bearer_auth(token)
                .query(&[("pageSize", ADMIN_PAGE_SIZE.to_string())]);
            if let Some(page) = &page_token {
                builder = builder.query(&[("pageToken", page)]);
            }

            let page: ListAccountsResponse = self.send(builder).await?;
            accounts.extend(page.accounts);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!("listed {} accounts", accounts.len());
        Ok(accounts)
    }

    async fn list_account_properties(&self, account_name: &str) -> Ga4Result<Vec<Property>> {
        let url = format!("{}/properties", self.admin_api_base);
        let filter = format!("parent:{}", account_name);
        let mut properties = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.access_token().await?;
            let mut builder = self.http_client.get(&url).bearer_auth(token).query(&[
                ("filter", filter.clone()),
                ("pageSize", ADMIN_PAGE_SIZE.to_string()),
            ]);
            if let Some(page) = &page_token {
                builder = builder.query(&[("pageToken", page)]);
            }

            let page: ListPropertiesResponse = self.send(builder).await?;
            properties.extend(page.properties);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!("listed {} properties under {}", properties.len(), account_name);
        Ok(properties)
    }

    /// Returns a usable access token, refreshing it first if needed.
    async fn access_token(&self) -> Ga4Result<String> {
        {
            let credential = self.credential.read().await;
            if !needs_refresh(&credential) {
                return Ok(credential.access_token.clone());
            }
        }

        let mut credential = self.credential.write().await;
        if needs_refresh(&credential) {
            debug!("access token expired or of unknown age, refreshing");
            refresh_access_token(&self.http_client, &mut credential).await?;
        }
        Ok(credential.access_token.clone())
    }

    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Ga4Result<T> {
        let response = builder.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            Ga4Error::api(message).with_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Ga4Error::api(format!(
                "API error ({}): {}",
                status,
                error_message(&body)
            )));
        }

        let body = response.text().await.map_err(|e| {
            Ga4Error::api(format!("failed to read response: {}", e)).with_source(e)
        })?;

        serde_json::from_str(&body).map_err(|e| {
            Ga4Error::api(format!("failed to parse response: {}", e)).with_source(e)
        })
    }
}

fn needs_refresh(credential: &Credential) -> bool {
    credential.refresh_token.is_some()
        && (credential.expires_at.is_none() || credential.is_expired())
}

/// Extracts the message of a Google error envelope, or returns the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<GoogleErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) => format!("{} {}", status, envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ga4_scopes;
    use ga4mcp_core::Ga4ErrorCode;
    use serde_json::json;
    use wiremock::matchers::{
        body_partial_json, body_string_contains, header, method, path, query_param,
        query_param_is_missing,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REPORT_BODY: &str = r#"{
        "dimensionHeaders": [{"name": "date"}],
        "metricHeaders": [{"name": "sessions", "type": "TYPE_INTEGER"}],
        "rows": [
            {"dimensionValues": [{"value": "20240102"}], "metricValues": [{"value": "12"}]},
            {"dimensionValues": [{"value": "20240101"}], "metricValues": [{"value": "7"}]}
        ],
        "rowCount": 2,
        "metadata": {"currencyCode": "USD", "timeZone": "America/New_York"}
    }"#;

    fn json_response(status: u16, body: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_raw(body.to_string(), "application/json")
    }

    fn credential(token_uri: &str, refresh_token: Option<&str>) -> Credential {
        Credential::new(
            "ya29.current",
            refresh_token.map(str::to_string),
            Some(3600),
            token_uri,
            "id",
            "secret",
            ga4_scopes(),
        )
    }

    fn client(base: &str, credential: Credential) -> Ga4Client {
        Ga4Client::new(credential, Duration::from_secs(5))
            .unwrap()
            .with_data_api_base(base)
            .with_admin_api_base(base)
    }

    #[tokio::test]
    async fn standard_report_posts_to_run_report() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/properties/123456:runReport"))
            .and(header("authorization", "Bearer ya29.current"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({
                "dateRanges": [{"startDate": "7daysAgo", "endDate": "today"}],
                "limit": 10
            })))
            .respond_with(json_response(200, REPORT_BODY))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server.uri(), credential("unused", None));

        let params = StandardReportParams::new("123456")
            .with_metrics("sessions")
            .with_dimensions("date");
        let report = client.standard_report(&params).await.unwrap();

        assert_eq!(report.row_count, 2);
        assert_eq!(report.rows[0].dimensions, vec!["20240102"]);
        assert_eq!(report.rows[1].metrics, vec!["7"]);
        assert_eq!(
            report.metadata.unwrap().time_zone.as_deref(),
            Some("America/New_York")
        );
    }

    #[tokio::test]
    async fn realtime_report_has_no_date_range_or_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/properties/42:runRealtimeReport"))
            .respond_with(json_response(200, REPORT_BODY))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server.uri(), credential("unused", None));

        let report = client
            .realtime_report(&RealtimeReportParams::new("properties/42"))
            .await
            .unwrap();
        assert!(report.metadata.is_none());

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("dateRanges").is_none());
    }

    #[tokio::test]
    async fn popular_pages_orders_by_views() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/properties/42:runReport"))
            .and(body_partial_json(json!({
                "orderBys": [{"metric": {"metricName": "screenPageViews"}, "desc": true}]
            })))
            .respond_with(json_response(200, "{}"))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server.uri(), credential("unused", None));

        let report = client
            .popular_pages(&PresetReportParams::popular_pages("42"))
            .await
            .unwrap();
        assert_eq!(report.row_count, 0);
    }

    #[tokio::test]
    async fn validation_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(json_response(200, REPORT_BODY))
            .expect(0)
            .mount(&server)
            .await;
        let client = client(&server.uri(), credential("unused", None));

        let err = client
            .audience_report(&PresetReportParams::audience("abc"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Ga4ErrorCode::Validation);
    }

    #[tokio::test]
    async fn api_errors_carry_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/properties/1:runReport"))
            .respond_with(json_response(
                403,
                r#"{"error": {"code": 403, "message": "User does not have sufficient permissions", "status": "PERMISSION_DENIED"}}"#,
            ))
            .mount(&server)
            .await;
        let client = client(&server.uri(), credential("unused", None));

        let err = client
            .standard_report(&StandardReportParams::new("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Ga4ErrorCode::Api);
        assert!(err.message().starts_with("failed to get standard report: "));
        assert!(err.message().contains("403"));
        assert!(err.message().contains("PERMISSION_DENIED"));
    }

    #[tokio::test]
    async fn unknown_expiry_triggers_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
            .respond_with(json_response(
                200,
                r#"{"access_token": "ya29.fresh", "expires_in": 3600}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/properties/1:runReport"))
            .and(header("authorization", "Bearer ya29.fresh"))
            .respond_with(json_response(200, REPORT_BODY))
            .expect(1)
            .mount(&server)
            .await;

        let mut stale = credential(&format!("{}/token", server.uri()), Some("1//refresh"));
        stale.expires_at = None;
        let client = client(&server.uri(), stale);

        client
            .standard_report(&StandardReportParams::new("1"))
            .await
            .unwrap();
        let refreshed = client.credential().await;
        assert_eq!(refreshed.access_token, "ya29.fresh");
        assert!(refreshed.expires_at.is_some());
    }

    #[tokio::test]
    async fn list_properties_pages_and_records_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts"))
            .and(query_param("pageSize", "200"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(json_response(
                200,
                r#"{"accounts": [{"name": "accounts/100", "displayName": "Acme"}], "nextPageToken": "p2"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts"))
            .and(query_param("pageToken", "p2"))
            .respond_with(json_response(
                200,
                r#"{"accounts": [{"name": "accounts/200", "displayName": "Beta"}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/properties"))
            .and(query_param("filter", "parent:accounts/100"))
            .and(query_param("pageSize", "200"))
            .respond_with(json_response(
                200,
                r#"{"properties": [
                    {"name": "properties/1", "displayName": "Site", "currencyCode": "USD", "timeZone": "UTC", "createTime": "2023-01-01T00:00:00Z", "parent": "accounts/100"},
                    {"name": "properties/2", "displayName": "App", "parent": "accounts/100"}
                ]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/properties"))
            .and(query_param("filter", "parent:accounts/200"))
            .respond_with(json_response(
                500,
                r#"{"error": {"code": 500, "message": "backend error"}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server.uri(), credential("unused", None));

        let listing = client.list_properties().await.unwrap();
        assert_eq!(listing.total_accounts, 2);
        assert_eq!(listing.total_properties, 2);
        assert_eq!(listing.accounts[0].account_id, "100");
        assert_eq!(listing.accounts[0].properties[0].property_id, "1");
        assert_eq!(
            listing.accounts[0].properties[0].currency_code.as_deref(),
            Some("USD")
        );
        assert!(listing.accounts[0].properties_error.is_none());
        assert!(listing.accounts[1].properties.is_empty());
        assert!(
            listing.accounts[1]
                .properties_error
                .as_deref()
                .unwrap()
                .contains("backend error")
        );
    }

    #[tokio::test]
    async fn account_listing_failure_fails_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts"))
            .respond_with(json_response(
                401,
                r#"{"error": {"code": 401, "message": "Request had invalid authentication credentials", "status": "UNAUTHENTICATED"}}"#,
            ))
            .mount(&server)
            .await;
        let client = client(&server.uri(), credential("unused", None));

        let err = client.list_properties().await.unwrap_err();
        assert_eq!(err.code(), Ga4ErrorCode::Api);
        assert!(err.message().starts_with("failed to list properties: "));
        assert!(err.message().contains("UNAUTHENTICATED"));
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": {"message": "bad", "status": "INVALID_ARGUMENT"}}"#),
            "INVALID_ARGUMENT bad"
        );
        assert_eq!(error_message("  plain text  "), "plain text");
    }
}
