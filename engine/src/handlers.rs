//! Command handlers for CLI operations
//!
//! - serve: run the HTTP/WebSocket server
//! - run: execute one task in-process
//! - history: show recently finished sessions
//! - doctor: validate configuration and probe providers
//! - config: show the effective configuration or its path

use anyhow::{Context, Result};
use sdk::events::{SessionOutcome, StreamEvent, TaskResponse};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::db::Database;
use crate::llm::router::LLMRouter;
use crate::orchestrator::attachments::resolve_local;
use crate::orchestrator::{Collaborators, SessionSettings, SessionStore};
use crate::retrieval::{DisabledRetriever, KnowledgeBase, Retriever};
use crate::secrets::store::{SecretStore, KEYRING_SERVICE};
use crate::server::{self, AppState};

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Long-lived collaborators shared by `serve` and `run`
pub struct Engine {
    pub database: Database,
    pub router: Arc<LLMRouter>,
    pub sessions: Arc<SessionStore>,
}

impl Engine {
    /// Wire providers, retrieval, persistence and the session store
    pub async fn build(config: &Config) -> Result<Self> {
        let database = Database::new(&config.database_path())
            .await
            .context("Failed to open database")?;

        let secrets = Arc::new(SecretStore::new(KEYRING_SERVICE));
        let router = Arc::new(LLMRouter::from_config(
            Arc::new(config.llm.clone()),
            secrets,
        ));

        let retriever = build_retriever(config).await;
        let collaborators = Collaborators::new(Arc::clone(&router) as _, retriever);
        let sessions = SessionStore::new(collaborators, SessionSettings::from_config(config))?
            .with_history(database.sessions());

        Ok(Self {
            database,
            router,
            sessions: Arc::new(sessions),
        })
    }
}

/// Knowledge base when enabled, the sentinel retriever otherwise
///
/// A knowledge base that fails to load disables retrieval instead of
/// failing startup.
pub async fn build_retriever(config: &Config) -> Arc<dyn Retriever> {
    if !config.retrieval.enabled {
        tracing::info!("Retrieval disabled by configuration");
        return Arc::new(DisabledRetriever);
    }

    match KnowledgeBase::load(&config.core.knowledge_dir, &config.retrieval).await {
        Ok(kb) => Arc::new(kb),
        Err(e) => {
            tracing::warn!("Knowledge base unavailable, retrieval disabled: {:#}", e);
            Arc::new(DisabledRetriever)
        }
    }
}

/// Start the server and block until Ctrl-C
pub async fn handle_serve(host: Option<String>, port: Option<u16>, config: &Config) -> Result<()> {
    let engine = Engine::build(config).await?;

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let state = AppState::new(
        Arc::clone(&engine.sessions),
        engine.router.provider_names(),
        config.orchestrator.stream_buffer,
    )
    .with_history(engine.database.sessions());

    server::serve(state, &host, port).await?;

    engine.database.close().await
}

/// Run a task immediately
///
/// With `verbose`, each worker delta is printed as it arrives.
pub async fn handle_run(
    task: String,
    attachments: Vec<PathBuf>,
    history: Vec<String>,
    verbose: bool,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let attachments = attachments
        .iter()
        .map(|path| resolve_local(path))
        .collect::<Result<Vec<_>>>()?;

    let engine = Engine::build(config).await?;
    let handle = engine.sessions.open(&task, attachments, history);

    if format == OutputFormat::Text {
        println!("Executing task: {}", task);
        println!();
    }

    let (tx, mut rx) = mpsc::channel(config.orchestrator.stream_buffer.max(1));
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if verbose {
                print_event(&event, format);
            }
        }
    });

    let response = handle.run(Some(&tx)).await;
    drop(tx);
    printer.await.ok();

    print_response(&response, format)?;
    engine.database.close().await?;

    if response.outcome == SessionOutcome::Failed {
        anyhow::bail!(
            "{}",
            response.error.unwrap_or_else(|| "Task failed".to_string())
        );
    }
    Ok(())
}

fn print_event(event: &StreamEvent, format: OutputFormat) {
    match (format, event) {
        (OutputFormat::Json, StreamEvent::Delta { .. }) => {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{}", line);
            }
        }
        (
            OutputFormat::Text,
            StreamEvent::Delta {
                worker,
                iteration,
                update,
                ..
            },
        ) => {
            println!("[{}] {}", iteration, worker);
            if let Ok(pretty) = serde_json::to_string_pretty(update) {
                for line in pretty.lines() {
                    println!("    {}", line);
                }
            }
        }
        // Terminal events are reported by `print_response`
        _ => {}
    }
}

fn print_response(response: &TaskResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?);
        }
        OutputFormat::Text => {
            println!("{}", response.final_response);
            println!();
            println!("Outcome: {}", response.outcome);
            println!("  Session: {}", response.session_id);
            println!("  Worker passes: {}", response.iterations);
            println!("  Development passes: {}", response.development_passes);
            if !response.artifacts.is_empty() {
                println!("  Files:");
                for path in &response.artifacts {
                    println!("    {}", path);
                }
            }
            if let Some(link) = &response.entry_link {
                println!("  Open: {}", link);
            }
        }
    }
    Ok(())
}

/// Show recently finished sessions
pub async fn handle_history(limit: i64, config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;

    let sessions = database
        .sessions()
        .recent(limit.max(1))
        .await
        .context("Failed to fetch session history")?;

    match format {
        OutputFormat::Text => {
            if sessions.is_empty() {
                println!("No sessions in history");
            } else {
                println!("Session History (last {} sessions):", limit);
                println!();

                for session in &sessions {
                    println!("Session ID: {}", session.id);
                    println!("  Task: {}", session.task);
                    println!("  Outcome: {}", session.outcome);
                    println!(
                        "  Passes: {} ({} development)",
                        session.iterations, session.development_passes
                    );
                    println!("  Files: {}", session.artifact_count);

                    let finished = chrono::DateTime::from_timestamp(session.finished_at, 0)
                        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "Unknown".to_string());
                    println!("  Finished: {}", finished);
                    println!();
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "sessions": sessions,
                "count": sessions.len(),
                "limit": limit
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    database.close().await
}

/// Validate configuration and check provider availability
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut checks: Vec<(String, String)> = Vec::new();
    let mut issues: Vec<String> = Vec::new();

    // Config is validated when loaded
    checks.push(("Configuration".into(), "Valid".into()));

    for (name, dir) in [
        ("Output directory", &config.core.output_dir),
        ("Upload directory", &config.core.upload_dir),
    ] {
        if dir.is_dir() {
            checks.push((name.into(), "Exists".into()));
        } else {
            checks.push((name.into(), "Missing".into()));
            issues.push(format!("{} does not exist: {}", name, dir.display()));
        }
    }

    if !config.retrieval.enabled {
        checks.push(("Knowledge base".into(), "Disabled".into()));
    } else {
        match KnowledgeBase::load(&config.core.knowledge_dir, &config.retrieval).await {
            Ok(kb) if kb.is_empty() => {
                checks.push(("Knowledge base".into(), "Empty".into()));
            }
            Ok(kb) => {
                checks.push(("Knowledge base".into(), format!("{} chunk(s)", kb.len())));
            }
            Err(e) => {
                checks.push(("Knowledge base".into(), "Unreadable".into()));
                issues.push(format!("Cannot load knowledge base: {:#}", e));
            }
        }
    }

    match Database::new(&config.database_path()).await {
        Ok(db) => {
            checks.push(("Database".into(), "OK".into()));
            db.close().await.ok();
        }
        Err(e) => {
            checks.push(("Database".into(), "Failed".into()));
            issues.push(format!("Cannot open database: {:#}", e));
        }
    }

    let secrets = Arc::new(SecretStore::new(KEYRING_SERVICE));
    let router = LLMRouter::from_config(Arc::new(config.llm.clone()), secrets);
    let health = router.check_health().await;
    for (name, healthy) in &health {
        let status = if *healthy { "Available" } else { "Not available" };
        checks.push((format!("Provider {}", name), status.into()));
    }
    if !health.iter().any(|(_, healthy)| *healthy) {
        issues.push("No LLM providers available. Configure at least one provider.".to_string());
    }

    match format {
        OutputFormat::Text => {
            println!("DevTeam Doctor");
            println!();
            for (name, status) in &checks {
                println!("  {:<24} {}", name, status);
            }
            println!();
            if issues.is_empty() {
                println!("No issues found.");
            } else {
                println!("Issues:");
                for issue in &issues {
                    println!("  - {}", issue);
                }
            }
        }
        OutputFormat::Json => {
            let checks: Vec<_> = checks
                .iter()
                .map(|(name, status)| json!({"check": name, "status": status}))
                .collect();
            let output = json!({
                "healthy": issues.is_empty(),
                "checks": checks,
                "issues": issues,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Print the effective configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let rendered =
                toml::to_string_pretty(config).context("Failed to serialize configuration")?;
            println!("{}", rendered);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

/// Print the configuration file path
pub fn handle_config_path(path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", path.display()),
        OutputFormat::Json => {
            println!("{}", json!({ "path": path.display().to_string() }));
        }
    }
    Ok(())
}
