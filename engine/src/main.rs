// DevTeam orchestration engine
// Main entry point for the devteam binary

use clap::Parser;
use devteam_engine::cli::{Cli, Command, ConfigAction};
use devteam_engine::config::Config;
use devteam_engine::handlers::{
    handle_config_path, handle_config_show, handle_doctor, handle_history, handle_run,
    handle_serve, OutputFormat,
};
use devteam_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let config = Config::load_or_create_at(&config_path)?;

    // `--log` beats the config file; RUST_LOG beats both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::debug!(
        "DevTeam v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    match cli.command {
        Command::Serve { host, port } => handle_serve(host, port, &config).await,

        Command::Run {
            task,
            attachments,
            history,
            verbose,
        } => {
            tracing::info!("Executing task: {}", task);
            handle_run(task, attachments, history, verbose, &config, format).await
        }

        Command::History { limit } => handle_history(limit, &config, format).await,

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => handle_config_path(&config_path, format),
        },
    }
}
