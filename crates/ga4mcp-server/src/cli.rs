//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ga4mcp_core::{TracingConfig, TracingOutputFormat};
use ga4mcp_google::{GA4_CREDENTIALS_FILE, OAUTH_FLOW_STATE_FILE};

use crate::tools::{AudienceArgs, PopularPagesArgs, RealtimeArgs, ReportArgs};

/// ga4mcp - Google Analytics 4 reports over MCP or from the command line
#[derive(Debug, Parser)]
#[command(name = "ga4mcp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to the saved credentials file
    #[arg(long, env = "GA4_CREDENTIALS_FILE", default_value = GA4_CREDENTIALS_FILE)]
    pub credentials_file: PathBuf,

    /// Path to the pending OAuth flow state file
    #[arg(long, env = "GA4_FLOW_STATE_FILE", default_value = OAUTH_FLOW_STATE_FILE)]
    pub flow_state_file: PathBuf,

    /// Timeout for calls to Google, in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Logging setup for the chosen flags.
    ///
    /// `--debug` only lowers the default level, so `RUST_LOG` still wins.
    pub fn tracing_config(&self) -> TracingConfig {
        let config = if self.debug {
            TracingConfig::cli_debug()
        } else {
            TracingConfig::default()
        };
        if self.json_logs {
            config.with_format(TracingOutputFormat::Json)
        } else {
            config
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve every tool and the config resource over MCP stdio
    Serve,

    /// Authentication commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Show the GA4 environment configuration with secrets masked
    DebugEnv,

    /// Show server configuration and authentication details
    Config,

    /// List accessible accounts and their GA4 properties
    Properties,

    /// Run a standard report
    Report(ReportArgs),

    /// Show real-time data
    Realtime(RealtimeArgs),

    /// Show audience insights
    Audience(AudienceArgs),

    /// Show the most viewed pages
    Pages(PopularPagesArgs),
}

/// Authentication actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Start the OAuth flow and print the consent URL
    Start {
        /// Also open the consent URL in the default browser
        #[arg(long)]
        open: bool,
    },

    /// Complete the OAuth flow
    Complete {
        /// Authorization code, or the full URL the browser was redirected to
        code: String,
    },

    /// Load previously saved credentials
    Load,

    /// Show the authentication status
    Status,

    /// Remove saved credentials and any pending flow
    Reset,
}
