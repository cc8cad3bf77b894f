use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use dq_domain::config::{Component, Config, ConfigError, ConfigSeverity};
use dq_tools::{McpServer, ToolRegistry};

/// MCP tool server for the documentation Q&A agent.
#[derive(Debug, Parser)]
#[command(name = "docqa-tools", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the MCP endpoint (default when no subcommand is given).
    Serve(ServeArgs),
}

#[derive(Debug, Default, clap::Args)]
struct ServeArgs {
    /// Bind host (overrides MCP_HOST).
    #[arg(long)]
    host: Option<String>,
    /// Bind port (overrides MCP_PORT).
    #[arg(long)]
    port: Option<u16>,
    /// Emit JSON log lines (also enabled by LOG_FORMAT=json).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let args = match cli.command {
        None => ServeArgs::default(),
        Some(Command::Serve(args)) => args,
    };

    let (mut config, overlay_issues) = Config::load().context("loading configuration")?;
    init_tracing(args.log_json);
    if let Some(host) = args.host {
        config.mcp.host = host;
    }
    if let Some(port) = args.port {
        config.mcp.port = port;
    }

    let mut issues = overlay_issues;
    issues.extend(config.validate(Component::ToolServer));
    report(&issues)?;

    run_server(config).await
}

/// Structured logging: pretty by default, JSON on request.
fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dq_tools=debug"));
    let json = json
        || std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Log every issue; fail when any is an error.
fn report(issues: &[ConfigError]) -> anyhow::Result<()> {
    for issue in issues {
        match issue.severity {
            ConfigSeverity::Error => tracing::error!(field = %issue.field, "{}", issue.message),
            ConfigSeverity::Warning => tracing::warn!(field = %issue.field, "{}", issue.message),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("{errors} configuration error(s); refusing to start");
    }
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!(config = %config.redacted(), "docqa-tools starting");

    let registry = ToolRegistry::from_config(&config).context("initializing tools")?;
    let server = Arc::new(McpServer::from_config(registry, &config.mcp));
    spawn_session_sweep(server.clone());

    let app = dq_tools::router(server)
        .layer(TraceLayer::new_for_http())
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            config.server.max_concurrent_requests.max(1),
        ));

    let addr = format!("{}:{}", config.mcp.host, config.mcp.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "MCP server listening on /mcp");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Periodically forget MCP sessions whose clients went away without
/// closing them.
fn spawn_session_sweep(server: Arc<McpServer>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let dropped = server.sweep_sessions().await;
            if dropped > 0 {
                tracing::info!(dropped, remaining = server.session_count(), "expired idle MCP sessions");
            }
        }
    });
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}
