//! Custodia CLI
//!
//!   custodia run       → Telegram bot + incoming-transfer observer + HTTP API (default)
//!   custodia serve     → HTTP API only
//!   custodia scan      → one observer pass, report as JSON
//!   custodia migrate   → create or upgrade the database, then exit
//!
//! Configuration is read from the environment; a `.env` file in the working
//! directory is loaded first if present.

use anyhow::Context;
use clap::{Parser, Subcommand};
use custodia::bot::{Dispatcher, LogNotifier, Notifier, TelegramClient};
use custodia::logging::init_logging;
use custodia::{install_signal_handlers, storage, Node, NodeConfig, Shutdown};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "custodia", version, about = "Custodial TRON wallet bot")]
struct Cli {
    /// Database file (overrides CUSTODIA_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// HTTP port (overrides PORT)
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, Debug)]
enum Command {
    /// Bot, observer and HTTP API
    Run,
    /// HTTP API only
    Serve,
    /// One observer pass over every tracked address
    Scan,
    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    init_logging();
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "exiting");
            eprintln!("{}", json!({"error": format!("{e:#}")}));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = NodeConfig::from_env()?;
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    if let Some(port) = cli.port {
        config.http.port = port;
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(config).await,
        Command::Serve => cmd_serve(config).await,
        Command::Scan => cmd_scan(config).await,
        Command::Migrate => cmd_migrate(config).await,
    }
}

async fn cmd_run(config: NodeConfig) -> anyhow::Result<()> {
    let token = config.require_bot_token()?.to_string();
    let port = config.http.port;
    let node = Node::open(config).await?;
    let telegram = Arc::new(TelegramClient::new(&token)?);
    let shutdown = install_signal_handlers();

    let observer = node.observer(telegram.clone());
    let observer_rx = shutdown.subscribe();
    let observer_task = tokio::spawn(async move { observer.run(observer_rx).await });

    let dispatcher = Dispatcher::new(telegram, Arc::new(node.flow()));
    let bot_task = tokio::spawn(dispatcher.run(shutdown.subscribe()));

    let served = serve_http(node.router(), port, shutdown.clone()).await;
    // The server only returns on shutdown or a bind failure; stop the rest either way.
    shutdown.trigger();

    if let Err(e) = observer_task.await {
        warn!(error = %e, "observer task panicked");
    }
    match bot_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "dispatcher failed"),
        Err(e) => warn!(error = %e, "dispatcher task panicked"),
    }
    node.close().await;
    served
}

async fn cmd_serve(config: NodeConfig) -> anyhow::Result<()> {
    let port = config.http.port;
    let node = Node::open(config).await?;
    let shutdown = install_signal_handlers();
    let served = serve_http(node.router(), port, shutdown).await;
    node.close().await;
    served
}

async fn cmd_scan(config: NodeConfig) -> anyhow::Result<()> {
    let node = Node::open(config).await?;
    let notifier: Arc<dyn Notifier> = match node.config().bot_token.as_deref() {
        Some(token) => Arc::new(TelegramClient::new(token)?),
        None => Arc::new(LogNotifier),
    };
    let report = node.observer(notifier).tick().await?;
    println!(
        "{}",
        json!({"scanned": report.scanned, "recorded": report.recorded, "failed": report.failed})
    );
    node.close().await;
    Ok(())
}

async fn cmd_migrate(config: NodeConfig) -> anyhow::Result<()> {
    let path = config.resolved_db_path();
    let pool = storage::open(&path).await?;
    pool.close().await;
    println!("{}", json!({"status": "migrated", "db": path.display().to_string()}));
    Ok(())
}

async fn serve_http(router: axum::Router, port: u16, shutdown: Shutdown) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    info!("listening on http://{addr}");
    info!("  GET  /health");
    info!("  GET  /wallet-balance/{{user_id}}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .context("http server")?;
    info!("http server stopped");
    Ok(())
}
