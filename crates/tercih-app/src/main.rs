//! Tercih application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Load the university/department catalog
//! 3. Build the dialogue orchestrator over an in-memory session store
//! 4. Start the idle-session sweep as a background task
//! 5. Read messages from stdin and print one JSON envelope per line
//!
//! Lines starting with `/` are commands: `/history`, `/reset`, `/clear`, `/reload`, `/quit`.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use tercih_chat::catalog::load_snapshot;
use tercih_chat::{
    ChatError, DialogueOrchestrator, InMemorySessionStore, StaticCatalog, TemplateRenderer,
};
use tercih_core::TercihConfig;

use cli::CliArgs;

/// Periodically drop sessions idle past the configured timeout.
async fn session_sweep_loop(orchestrator: Arc<DialogueOrchestrator>, interval_secs: u64) {
    tracing::info!(interval_secs, "Session sweep loop started");

    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(interval_secs.max(1)));
    loop {
        interval.tick().await;
        match orchestrator.sweep_expired() {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Idle sessions swept"),
            Err(e) => tracing::error!(error = %e, "Session sweep failed"),
        }
    }
}

/// Build the catalog from a JSON file, or the built-in one.
fn load_catalog(path: Option<&PathBuf>) -> Result<StaticCatalog, tercih_core::TercihError> {
    match path {
        Some(path) => {
            let catalog = StaticCatalog::from_json_file(path)?;
            tracing::info!(path = %path.display(), "Catalog loaded");
            Ok(catalog)
        }
        None => {
            tracing::info!("Using built-in catalog");
            Ok(StaticCatalog::default())
        }
    }
}

/// Handle a `/command` line. Returns `false` when the REPL should stop.
fn handle_command(
    command: &str,
    orchestrator: &DialogueOrchestrator,
    catalog: &StaticCatalog,
    catalog_path: Option<&PathBuf>,
    session_id: &str,
) -> bool {
    let result = match command {
        "/quit" | "/exit" => return false,
        "/history" => orchestrator.history(session_id).and_then(|turns| {
            serde_json::to_string(&turns).map_err(|e| ChatError::Internal(e.to_string()))
        }),
        "/reset" => orchestrator
            .reset_session(session_id)
            .map(|found| format!("reset: {}", found)),
        "/clear" => orchestrator
            .clear_session(session_id)
            .map(|found| format!("cleared: {}", found)),
        "/reload" => match catalog_path {
            Some(path) => match load_snapshot(path) {
                Ok(snapshot) => catalog.replace(snapshot).map(|_| "catalog reloaded".to_string()),
                Err(e) => Ok(format!("catalog reload failed: {}", e)),
            },
            None => Ok("no catalog file configured".to_string()),
        },
        other => Ok(format!("unknown command {}", other)),
    };
    match result {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::error!(error = %e, command, "Command failed"),
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first so its log level can seed the filter.
    let config_file = args.resolve_config_path();
    let config = TercihConfig::load_or_default(&config_file);
    let log_level = args.resolve_log_level(&config.general.log_level);

    // Logs go to stderr; stdout carries the envelopes.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Tercih v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Catalog.
    let catalog_path = args.resolve_catalog_path(config.general.catalog_path.as_deref());
    let catalog = match load_catalog(catalog_path.as_ref()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load catalog");
            return Err(e.into());
        }
    };

    // Orchestrator.
    let orchestrator = Arc::new(DialogueOrchestrator::new(
        config,
        Arc::clone(&catalog) as Arc<dyn tercih_chat::CatalogProvider>,
        Arc::new(InMemorySessionStore::new()),
        Arc::new(TemplateRenderer::new()),
    ));

    // === Background tasks ===

    let sweeper = Arc::clone(&orchestrator);
    let sweep_interval = args.sweep_interval_secs;
    tokio::spawn(async move {
        session_sweep_loop(sweeper, sweep_interval).await;
    });

    // === REPL ===

    let session_id = args
        .session
        .clone()
        .unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4()));
    tracing::info!(session = %session_id, user = %args.user, "Ready for input");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.starts_with('/') {
            if !handle_command(
                line,
                &orchestrator,
                &catalog,
                catalog_path.as_ref(),
                &session_id,
            ) {
                break;
            }
            continue;
        }

        let envelope = orchestrator.process_turn(&session_id, &args.user, line);
        println!("{}", serde_json::to_string(&envelope)?);
    }

    tracing::info!("Input closed; shutting down");
    Ok(())
}
