//! Tool handlers.
//!
//! Each handler returns the text handed back to the caller. Failures never
//! escape as errors: they are rendered as `Error <context>: <message>`.

use clap::Args;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::error;

use ga4mcp_core::report::{
    DEFAULT_AUDIENCE_LIMIT, DEFAULT_AUDIENCE_START_DATE, DEFAULT_DIMENSIONS, DEFAULT_END_DATE,
    DEFAULT_METRICS, DEFAULT_PAGES_LIMIT, DEFAULT_REALTIME_DIMENSIONS, DEFAULT_REALTIME_LIMIT,
    DEFAULT_REALTIME_METRICS, DEFAULT_REPORT_LIMIT, DEFAULT_START_DATE,
};
use ga4mcp_core::validate::{MAX_STRING_LENGTH, sanitize_string};
use ga4mcp_core::{
    Ga4Error, Ga4Result, PresetReportParams, RealtimeReportParams, StandardReportParams,
    format_error,
};
use ga4mcp_google::{AuthInfo, GA4_SCOPES};

use crate::context::Ga4Context;

/// Name reported by the config resource and the MCP handshake.
pub const SERVER_NAME: &str = "Google Analytics 4 MCP Server";

/// Prefix of the `start_oauth_flow` answer, followed by the consent URL.
pub const AUTHORIZE_PROMPT: &str = "Please visit this URL to authorize the application: ";

/// Answer of every report tool while no client is bound.
pub const NOT_AUTHENTICATED: &str =
    "Error: Not authenticated. Use start_oauth_flow or load_saved_credentials first.";

/// Names of every tool, in registration order.
pub const AVAILABLE_TOOLS: &[&str] = &[
    "start_oauth_flow",
    "complete_oauth_flow",
    "load_saved_credentials",
    "check_auth_status",
    "reset_authentication",
    "debug_env_vars",
    "list_properties",
    "get_ga4_report",
    "get_realtime_data",
    "get_ga4_audience_data",
    "get_popular_pages",
];

/// Arguments of `get_ga4_report`.
#[derive(Debug, Clone, Args, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReportArgs {
    /// GA4 property ID, with or without the `properties/` prefix
    #[arg(long, short)]
    pub property_id: Option<String>,

    /// Start date (YYYY-MM-DD, NdaysAgo, today, yesterday)
    #[arg(long, default_value = DEFAULT_START_DATE)]
    pub start_date: String,

    /// End date (YYYY-MM-DD, NdaysAgo, today, yesterday)
    #[arg(long, default_value = DEFAULT_END_DATE)]
    pub end_date: String,

    /// Comma-separated metric names
    #[arg(long, default_value = DEFAULT_METRICS)]
    pub metrics: String,

    /// Comma-separated dimension names
    #[arg(long, default_value = DEFAULT_DIMENSIONS)]
    pub dimensions: String,

    /// Maximum number of rows
    #[arg(long, default_value_t = DEFAULT_REPORT_LIMIT)]
    pub limit: i64,
}

impl Default for ReportArgs {
    fn default() -> Self {
        Self {
            property_id: None,
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            metrics: DEFAULT_METRICS.to_string(),
            dimensions: DEFAULT_DIMENSIONS.to_string(),
            limit: DEFAULT_REPORT_LIMIT,
        }
    }
}

/// Arguments of `get_realtime_data`.
#[derive(Debug, Clone, Args, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RealtimeArgs {
    /// GA4 property ID, with or without the `properties/` prefix
    #[arg(long, short)]
    pub property_id: Option<String>,

    /// Comma-separated metric names
    #[arg(long, default_value = DEFAULT_REALTIME_METRICS)]
    pub metrics: String,

    /// Comma-separated dimension names
    #[arg(long, default_value = DEFAULT_REALTIME_DIMENSIONS)]
    pub dimensions: String,

    /// Maximum number of rows
    #[arg(long, default_value_t = DEFAULT_REALTIME_LIMIT)]
    pub limit: i64,
}

impl Default for RealtimeArgs {
    fn default() -> Self {
        Self {
            property_id: None,
            metrics: DEFAULT_REALTIME_METRICS.to_string(),
            dimensions: DEFAULT_REALTIME_DIMENSIONS.to_string(),
            limit: DEFAULT_REALTIME_LIMIT,
        }
    }
}

/// Arguments of `get_ga4_audience_data`.
#[derive(Debug, Clone, Args, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AudienceArgs {
    /// GA4 property ID, with or without the `properties/` prefix
    #[arg(long, short)]
    pub property_id: Option<String>,

    /// Start date (YYYY-MM-DD, NdaysAgo, today, yesterday)
    #[arg(long, default_value = DEFAULT_AUDIENCE_START_DATE)]
    pub start_date: String,

    /// End date (YYYY-MM-DD, NdaysAgo, today, yesterday)
    #[arg(long, default_value = DEFAULT_END_DATE)]
    pub end_date: String,

    /// Maximum number of rows
    #[arg(long, default_value_t = DEFAULT_AUDIENCE_LIMIT)]
    pub limit: i64,
}

impl Default for AudienceArgs {
    fn default() -> Self {
        Self {
            property_id: None,
            start_date: DEFAULT_AUDIENCE_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            limit: DEFAULT_AUDIENCE_LIMIT,
        }
    }
}

/// Arguments of `get_popular_pages`.
#[derive(Debug, Clone, Args, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PopularPagesArgs {
    /// GA4 property ID, with or without the `properties/` prefix
    #[arg(long, short)]
    pub property_id: Option<String>,

    /// Start date (YYYY-MM-DD, NdaysAgo, today, yesterday)
    #[arg(long, default_value = DEFAULT_START_DATE)]
    pub start_date: String,

    /// End date (YYYY-MM-DD, NdaysAgo, today, yesterday)
    #[arg(long, default_value = DEFAULT_END_DATE)]
    pub end_date: String,

    /// Maximum number of rows
    #[arg(long, default_value_t = DEFAULT_PAGES_LIMIT)]
    pub limit: i64,
}

impl Default for PopularPagesArgs {
    fn default() -> Self {
        Self {
            property_id: None,
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            limit: DEFAULT_PAGES_LIMIT,
        }
    }
}

/// The `data://ga4_config` resource.
#[derive(Debug, Clone, Serialize)]
pub struct Ga4Config {
    pub server_name: &'static str,
    pub version: &'static str,
    pub authenticated: bool,
    pub scopes: Vec<String>,
    pub available_tools: Vec<&'static str>,
    pub auth_info: AuthInfo,
}

/// Starts the OAuth flow and returns the consent URL prompt.
pub fn start_oauth_flow(ctx: &Ga4Context) -> String {
    match ctx.oauth().start() {
        Ok(url) => format!("{}{}", AUTHORIZE_PROMPT, url),
        Err(e) => failure("starting OAuth flow", e),
    }
}

/// Completes the pending flow and binds a client to the new credential.
///
/// Accepts the bare authorization code or the full redirect URL.
pub async fn complete_oauth_flow(ctx: &mut Ga4Context, authorization_code: &str) -> String {
    match complete_and_bind(ctx, authorization_code).await {
        Ok(()) => "OAuth2 authentication completed successfully. GA4 client is now ready.".to_string(),
        Err(e) => failure("completing OAuth flow", e),
    }
}

async fn complete_and_bind(ctx: &mut Ga4Context, authorization_code: &str) -> Ga4Result<()> {
    let input = sanitize_string(authorization_code, MAX_STRING_LENGTH)?;
    let credential = ctx.oauth_mut().complete(&input).await?;
    ctx.bind_client(credential)
}

/// Loads the credentials file and binds a client to it.
pub fn load_saved_credentials(ctx: &mut Ga4Context) -> String {
    let result = ctx
        .oauth_mut()
        .load_saved()
        .and_then(|credential| ctx.bind_client(credential));

    match result {
        Ok(()) => "Saved credentials loaded successfully. GA4 and Admin clients are ready.".to_string(),
        Err(e) => failure("loading saved credentials", e),
    }
}

/// Reports whether a usable credential is held.
pub async fn check_auth_status(ctx: &Ga4Context) -> String {
    ctx.auth_info().await.status
}

/// Drops the client and removes the saved credentials and pending flow.
pub fn reset_authentication(ctx: &mut Ga4Context) -> String {
    ctx.unbind_client();
    match ctx.oauth_mut().reset() {
        Ok(()) => "Authentication reset. Saved credentials and pending OAuth flow removed."
            .to_string(),
        Err(e) => failure("resetting authentication", e),
    }
}

/// Shows which GA4 variables are set, with secrets masked.
pub fn debug_env_vars(ctx: &Ga4Context) -> String {
    to_json(&ctx.settings().debug_info(), "debugging environment variables")
}

/// Lists every accessible account with its GA4 properties.
pub async fn list_properties(ctx: &Ga4Context) -> String {
    let Some(client) = ctx.client() else {
        return NOT_AUTHENTICATED.to_string();
    };

    match client.list_properties().await {
        Ok(listing) => to_json(&listing, "listing properties"),
        Err(e) => failure("listing properties", e),
    }
}

/// Runs a standard report over a date range.
pub async fn get_ga4_report(ctx: &Ga4Context, args: ReportArgs) -> String {
    const CONTEXT: &str = "getting GA4 report";
    let Some(client) = ctx.client() else {
        return NOT_AUTHENTICATED.to_string();
    };

    let property_id = match resolve_property(ctx, args.property_id) {
        Ok(id) => id,
        Err(e) => return failure(CONTEXT, e),
    };
    let params = StandardReportParams::new(property_id)
        .with_date_range(args.start_date, args.end_date)
        .with_metrics(args.metrics)
        .with_dimensions(args.dimensions)
        .with_limit(args.limit);

    match client.standard_report(&params).await {
        Ok(report) => to_json(&report, CONTEXT),
        Err(e) => failure(CONTEXT, e),
    }
}

/// Runs a real-time report.
pub async fn get_realtime_data(ctx: &Ga4Context, args: RealtimeArgs) -> String {
    const CONTEXT: &str = "getting real-time data";
    let Some(client) = ctx.client() else {
        return NOT_AUTHENTICATED.to_string();
    };

    let property_id = match resolve_property(ctx, args.property_id) {
        Ok(id) => id,
        Err(e) => return failure(CONTEXT, e),
    };
    let params = RealtimeReportParams::new(property_id)
        .with_metrics(args.metrics)
        .with_dimensions(args.dimensions)
        .with_limit(args.limit);

    match client.realtime_report(&params).await {
        Ok(report) => to_json(&report, CONTEXT),
        Err(e) => failure(CONTEXT, e),
    }
}

/// Runs the audience preset: geography and device breakdown, most users first.
pub async fn get_ga4_audience_data(ctx: &Ga4Context, args: AudienceArgs) -> String {
    const CONTEXT: &str = "getting audience data";
    let Some(client) = ctx.client() else {
        return NOT_AUTHENTICATED.to_string();
    };

    let property_id = match resolve_property(ctx, args.property_id) {
        Ok(id) => id,
        Err(e) => return failure(CONTEXT, e),
    };
    let params = PresetReportParams::audience(property_id)
        .with_date_range(args.start_date, args.end_date)
        .with_limit(args.limit);

    match client.audience_report(&params).await {
        Ok(report) => to_json(&report, CONTEXT),
        Err(e) => failure(CONTEXT, e),
    }
}

/// Runs the popular pages preset, ordered by page views.
pub async fn get_popular_pages(ctx: &Ga4Context, args: PopularPagesArgs) -> String {
    const CONTEXT: &str = "getting popular pages";
    let Some(client) = ctx.client() else {
        return NOT_AUTHENTICATED.to_string();
    };

    let property_id = match resolve_property(ctx, args.property_id) {
        Ok(id) => id,
        Err(e) => return failure(CONTEXT, e),
    };
    let params = PresetReportParams::popular_pages(property_id)
        .with_date_range(args.start_date, args.end_date)
        .with_limit(args.limit);

    match client.popular_pages(&params).await {
        Ok(report) => to_json(&report, CONTEXT),
        Err(e) => failure(CONTEXT, e),
    }
}

/// Builds the `data://ga4_config` resource.
pub async fn ga4_config(ctx: &Ga4Context) -> Ga4Config {
    let auth_info = ctx.auth_info().await;
    Ga4Config {
        server_name: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
        authenticated: auth_info.authenticated,
        scopes: GA4_SCOPES.iter().map(|s| s.to_string()).collect(),
        available_tools: AVAILABLE_TOOLS.to_vec(),
        auth_info,
    }
}

/// Renders the `data://ga4_config` resource as JSON text.
pub async fn ga4_config_json(ctx: &Ga4Context) -> String {
    to_json(&ga4_config(ctx).await, "generating config")
}

/// Picks the explicit property ID, or falls back to `GA4_PROPERTY_ID`.
fn resolve_property(ctx: &Ga4Context, property_id: Option<String>) -> Ga4Result<String> {
    property_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| ctx.settings().property_id().map(str::to_string))
        .ok_or_else(|| {
            Ga4Error::validation(
                "property ID is required. Pass one or set GA4_PROPERTY_ID in your .env file or environment.",
            )
        })
}

fn to_json<T: Serialize>(value: &T, context: &str) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(e) => failure(context, e),
    }
}

fn failure(context: &str, e: impl std::fmt::Display) -> String {
    error!("{} failed: {}", context, e);
    format_error(context, &e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextOptions;
    use ga4mcp_google::Settings;
    use std::time::Duration;
    use tempfile::TempDir;

    fn context(dir: &TempDir, settings: Settings) -> Ga4Context {
        let options = ContextOptions::default()
            .with_credentials_path(dir.path().join("creds.json"))
            .with_flow_state_path(dir.path().join("flow.json"))
            .with_timeout(Duration::from_secs(5));
        Ga4Context::new(settings, options).unwrap()
    }

    fn configured() -> Settings {
        Settings::new(
            Some("client.apps.googleusercontent.com".to_string()),
            Some("secret".to_string()),
            Some("123456".to_string()),
        )
    }

    fn write_credentials(dir: &TempDir) {
        std::fs::write(
            dir.path().join("creds.json"),
            r#"{"token": "t", "refresh_token": null, "token_uri": "u", "client_id": "c", "client_secret": "s", "scopes": ["a"]}"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn report_tools_require_authentication() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, configured());

        assert_eq!(list_properties(&ctx).await, NOT_AUTHENTICATED);
        assert_eq!(
            get_ga4_report(&ctx, ReportArgs::default()).await,
            NOT_AUTHENTICATED
        );
        assert_eq!(
            get_realtime_data(&ctx, RealtimeArgs::default()).await,
            NOT_AUTHENTICATED
        );
        assert_eq!(
            get_ga4_audience_data(&ctx, AudienceArgs::default()).await,
            NOT_AUTHENTICATED
        );
        assert_eq!(
            get_popular_pages(&ctx, PopularPagesArgs::default()).await,
            NOT_AUTHENTICATED
        );
    }

    #[test]
    fn start_reports_missing_configuration() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, Settings::default());

        let text = start_oauth_flow(&ctx);
        assert!(text.starts_with("Error starting OAuth flow: "));
        assert!(text.contains("GA4_CLIENT_ID"));
        assert!(text.contains("GA4_CLIENT_SECRET"));
    }

    #[test]
    fn start_returns_consent_url() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, configured());

        let text = start_oauth_flow(&ctx);
        assert!(text.starts_with(
            "Please visit this URL to authorize the application: https://accounts.google.com/"
        ));
        assert!(ctx.oauth().has_pending_flow());
    }

    #[tokio::test]
    async fn complete_without_start_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, configured());

        let text = complete_oauth_flow(&mut ctx, "code").await;
        assert!(text.starts_with("Error completing OAuth flow: "));
        assert!(ctx.client().is_none());

        let oversized = "x".repeat(MAX_STRING_LENGTH + 1);
        let text = complete_oauth_flow(&mut ctx, &oversized).await;
        assert!(text.contains("input too long"));
    }

    #[tokio::test]
    async fn load_and_reset_cycle() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, configured());

        let text = load_saved_credentials(&mut ctx);
        assert!(text.starts_with("Error loading saved credentials: "));
        assert!(text.contains("no saved credentials"));
        assert!(check_auth_status(&ctx).await.starts_with("Not authenticated"));

        write_credentials(&dir);
        assert_eq!(
            load_saved_credentials(&mut ctx),
            "Saved credentials loaded successfully. GA4 and Admin clients are ready."
        );
        assert!(ctx.client().is_some());
        assert!(check_auth_status(&ctx).await.starts_with("Authenticated and ready"));

        assert!(reset_authentication(&mut ctx).starts_with("Authentication reset"));
        assert!(ctx.client().is_none());
        assert!(!dir.path().join("creds.json").exists());
        assert!(check_auth_status(&ctx).await.starts_with("Not authenticated"));
    }

    #[tokio::test]
    async fn invalid_property_is_reported_before_any_call() {
        let dir = TempDir::new().unwrap();
        write_credentials(&dir);
        let mut ctx = context(&dir, configured());
        load_saved_credentials(&mut ctx);

        let args = ReportArgs {
            property_id: Some("not-a-number".to_string()),
            ..ReportArgs::default()
        };
        let text = get_ga4_report(&ctx, args).await;
        assert!(text.starts_with("Error getting GA4 report: "));
    }

    #[test]
    fn property_falls_back_to_environment() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, configured());
        assert_eq!(resolve_property(&ctx, None).unwrap(), "123456");
        assert_eq!(
            resolve_property(&ctx, Some("789".to_string())).unwrap(),
            "789"
        );
        assert_eq!(
            resolve_property(&ctx, Some("  ".to_string())).unwrap(),
            "123456"
        );

        let unset = context(
            &dir,
            Settings::new(Some("id".to_string()), Some("s".to_string()), None),
        );
        let err = resolve_property(&unset, None).unwrap_err();
        assert!(err.message().contains("GA4_PROPERTY_ID"));
    }

    #[test]
    fn debug_env_vars_masks_secret() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, configured());
        let json: serde_json::Value = serde_json::from_str(&debug_env_vars(&ctx)).unwrap();
        assert_eq!(json["variables"]["GA4_CLIENT_SECRET"], "[SET]");
        assert_eq!(json["variables"]["GA4_PROPERTY_ID"], "123456");
        assert_eq!(json["GA4_CLIENT_ID_preview"], "client.app...");
    }

    #[tokio::test]
    async fn config_resource_lists_tools() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, configured());
        let json: serde_json::Value = serde_json::from_str(&ga4_config_json(&ctx).await).unwrap();

        assert_eq!(json["server_name"], SERVER_NAME);
        assert_eq!(json["authenticated"], false);
        assert_eq!(json["scopes"].as_array().unwrap().len(), 2);
        assert_eq!(
            json["available_tools"].as_array().unwrap().len(),
            AVAILABLE_TOOLS.len()
        );
        assert_eq!(json["auth_info"]["has_required_config"], true);
        assert_eq!(json["auth_info"]["credentials_info"]["authenticated"], false);
    }
}
