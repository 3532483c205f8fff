//! MCP server over stdio.
//!
//! Registers every tool handler of [`crate::tools`] and the
//! `data://ga4_config` resource with an rmcp router. All calls share one
//! [`Ga4Context`], so a client bound by `complete_oauth_flow` or
//! `load_saved_credentials` serves the report tools that follow.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, CallToolResult, Content, Implementation, ListResourcesResult,
    PaginatedRequestParam, RawResource, ReadResourceRequestParam, ReadResourceResult, Resource,
    ResourceContents, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt, tool, tool_handler,
    tool_router, transport::stdio,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::context::Ga4Context;
use crate::tools::{self, AudienceArgs, PopularPagesArgs, RealtimeArgs, ReportArgs, SERVER_NAME};

/// URI of the configuration resource.
pub const CONFIG_RESOURCE_URI: &str = "data://ga4_config";

const INSTRUCTIONS: &str = "Google Analytics 4 reports. Authenticate first: call \
    start_oauth_flow, open the URL, then pass the code or redirect URL to \
    complete_oauth_flow. Alternatively call load_saved_credentials. Report tools \
    fall back to GA4_PROPERTY_ID when no property_id is given.";

/// Errors that end the MCP server.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to start MCP stdio service: {0}")]
    Start(String),

    #[error("MCP service terminated unexpectedly: {0}")]
    Terminated(#[from] tokio::task::JoinError),
}

/// Arguments of `complete_oauth_flow`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompleteFlowArgs {
    /// Authorization code, or the full URL the browser was redirected to
    pub authorization_code: String,
}

/// The GA4 tool server.
#[derive(Clone)]
pub struct Ga4McpServer {
    ctx: Arc<Mutex<Ga4Context>>,
    tool_router: ToolRouter<Self>,
}

fn text(output: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

#[tool_router]
impl Ga4McpServer {
    /// Creates a server that owns `ctx` for its whole lifetime.
    pub fn new(ctx: Ga4Context) -> Self {
        Self {
            ctx: Arc::new(Mutex::new(ctx)),
            tool_router: Self::tool_router(),
        }
    }

    /// Returns the context shared by every call.
    pub fn context(&self) -> &Arc<Mutex<Ga4Context>> {
        &self.ctx
    }

    #[tool(description = "Start OAuth2 flow and return authorization URL.")]
    async fn start_oauth_flow(&self) -> Result<CallToolResult, McpError> {
        let ctx = self.ctx.lock().await;
        text(tools::start_oauth_flow(&ctx))
    }

    #[tool(description = "Complete OAuth2 flow with authorization code.")]
    async fn complete_oauth_flow(
        &self,
        Parameters(args): Parameters<CompleteFlowArgs>,
    ) -> Result<CallToolResult, McpError> {
        let mut ctx = self.ctx.lock().await;
        text(tools::complete_oauth_flow(&mut ctx, &args.authorization_code).await)
    }

    #[tool(description = "Load previously saved OAuth2 credentials.")]
    async fn load_saved_credentials(&self) -> Result<CallToolResult, McpError> {
        let mut ctx = self.ctx.lock().await;
        text(tools::load_saved_credentials(&mut ctx))
    }

    #[tool(description = "Check current authentication status.")]
    async fn check_auth_status(&self) -> Result<CallToolResult, McpError> {
        let ctx = self.ctx.lock().await;
        text(tools::check_auth_status(&ctx).await)
    }

    #[tool(description = "Remove saved credentials and any pending OAuth flow.")]
    async fn reset_authentication(&self) -> Result<CallToolResult, McpError> {
        let mut ctx = self.ctx.lock().await;
        text(tools::reset_authentication(&mut ctx))
    }

    #[tool(description = "Show which GA4 environment variables are set, with secrets masked.")]
    async fn debug_env_vars(&self) -> Result<CallToolResult, McpError> {
        let ctx = self.ctx.lock().await;
        text(tools::debug_env_vars(&ctx))
    }

    #[tool(description = "List all accessible GA4 accounts and properties.")]
    async fn list_properties(&self) -> Result<CallToolResult, McpError> {
        let ctx = self.ctx.lock().await;
        text(tools::list_properties(&ctx).await)
    }

    #[tool(description = "Get a standard Google Analytics 4 report.")]
    async fn get_ga4_report(
        &self,
        Parameters(args): Parameters<ReportArgs>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.ctx.lock().await;
        text(tools::get_ga4_report(&ctx, args).await)
    }

    #[tool(description = "Get real-time Google Analytics 4 data.")]
    async fn get_realtime_data(
        &self,
        Parameters(args): Parameters<RealtimeArgs>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.ctx.lock().await;
        text(tools::get_realtime_data(&ctx, args).await)
    }

    #[tool(description = "Get audience insights from Google Analytics 4.")]
    async fn get_ga4_audience_data(
        &self,
        Parameters(args): Parameters<AudienceArgs>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.ctx.lock().await;
        text(tools::get_ga4_audience_data(&ctx, args).await)
    }

    #[tool(description = "Get most popular pages from Google Analytics 4.")]
    async fn get_popular_pages(
        &self,
        Parameters(args): Parameters<PopularPagesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.ctx.lock().await;
        text(tools::get_popular_pages(&ctx, args).await)
    }
}

impl Ga4McpServer {
    fn config_resource() -> Resource {
        let mut resource = RawResource::new(CONFIG_RESOURCE_URI, "ga4_config");
        resource.description =
            Some("GA4 MCP server configuration and authentication status".to_string());
        resource.mime_type = Some("application/json".to_string());
        resource.no_annotation()
    }

    async fn read_config(&self) -> String {
        let ctx = self.ctx.lock().await;
        tools::ga4_config_json(&ctx).await
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for Ga4McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![Self::config_resource()],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        if request.uri != CONFIG_RESOURCE_URI {
            debug!("unknown resource requested: {}", request.uri);
            return Err(McpError::resource_not_found(
                "resource not found",
                Some(json!({ "uri": request.uri })),
            ));
        }

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(
                self.read_config().await,
                CONFIG_RESOURCE_URI,
            )],
        })
    }
}

/// Serves the tools over stdin/stdout until the client disconnects.
///
/// Logs must go to stderr while this runs.
pub async fn serve_stdio(ctx: Ga4Context) -> Result<(), ServeError> {
    info!("starting {} on stdio", SERVER_NAME);
    let service = Ga4McpServer::new(ctx)
        .serve(stdio())
        .await
        .map_err(|e| ServeError::Start(e.to_string()))?;

    let reason = service.waiting().await?;
    info!("MCP server stopped: {:?}", reason);
    Ok(())
}
