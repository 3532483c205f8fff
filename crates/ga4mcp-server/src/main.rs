//! ga4mcp entry point: the MCP stdio server and the CLI.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, warn};

use ga4mcp_core::{Ga4Result, format_error, init_tracing};
use ga4mcp_google::Settings;
use ga4mcp_server::cli::{AuthAction, Cli, Command};
use ga4mcp_server::tools;
use ga4mcp_server::{ContextOptions, Ga4Context, serve_stdio};

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; real environment variables take precedence.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.tracing_config()) {
        eprintln!("error: failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match dotenv {
        Ok(path) => debug!("loaded environment from {:?}", path),
        Err(e) if e.not_found() => debug!("no .env file found"),
        Err(e) => warn!("failed to load .env file: {}", e),
    }

    match run(cli).await {
        Ok(output) if output.starts_with("Error") => {
            println!("{}", output);
            ExitCode::FAILURE
        }
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn context(cli: &Cli) -> Ga4Result<Ga4Context> {
    let options = ContextOptions::default()
        .with_credentials_path(&cli.credentials_file)
        .with_flow_state_path(&cli.flow_state_file)
        .with_timeout(Duration::from_secs(cli.timeout));
    Ga4Context::new(Settings::from_env(), options)
}

async fn run(cli: Cli) -> Ga4Result<String> {
    let mut ctx = context(&cli)?;

    // Each invocation is a fresh process: reuse saved credentials when present.
    if needs_client(&cli.command) {
        ctx.restore_session();
    }

    let output = match cli.command {
        Command::Auth { action } => match action {
            AuthAction::Start { open } => {
                let text = tools::start_oauth_flow(&ctx);
                if open && let Some(url) = text.strip_prefix(tools::AUTHORIZE_PROMPT) {
                    open_consent_page(url);
                }
                text
            }
            AuthAction::Complete { code } => tools::complete_oauth_flow(&mut ctx, &code).await,
            AuthAction::Load => tools::load_saved_credentials(&mut ctx),
            AuthAction::Status => {
                ctx.restore_session();
                tools::check_auth_status(&ctx).await
            }
            AuthAction::Reset => tools::reset_authentication(&mut ctx),
        },
        Command::DebugEnv => tools::debug_env_vars(&ctx),
        Command::Config => {
            ctx.restore_session();
            tools::ga4_config_json(&ctx).await
        }
        Command::Properties => tools::list_properties(&ctx).await,
        Command::Report(args) => tools::get_ga4_report(&ctx, args).await,
        Command::Realtime(args) => tools::get_realtime_data(&ctx, args).await,
        Command::Audience(args) => tools::get_ga4_audience_data(&ctx, args).await,
        Command::Pages(args) => tools::get_popular_pages(&ctx, args).await,
        Command::Serve => match serve_stdio(ctx).await {
            // stdout belonged to the protocol, nothing more to print.
            Ok(()) => String::new(),
            Err(e) => format_error("running MCP server", &e),
        },
    };

    Ok(output)
}

fn needs_client(command: &Command) -> bool {
    matches!(
        command,
        Command::Properties
            | Command::Report(_)
            | Command::Realtime(_)
            | Command::Audience(_)
            | Command::Pages(_)
    )
}

fn open_consent_page(url: &str) {
    if let Err(e) = open::that(url) {
        warn!("failed to open browser: {}", e);
    }
}
