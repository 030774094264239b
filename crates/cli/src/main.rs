//! Quill CLI: the main entry point.
//!
//! - `quill`              interactive chat
//! - `quill -m MESSAGE`   single message, then exit
//! - `quill --init`       write a default config file

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use quill_agent::{Orchestrator, OrchestratorConfig, Session};
use quill_config::{AppConfig, ConfigError, SystemPrompt};
use quill_telemetry::TracingTelemetry;
use tracing::info;

mod history;
mod logging;
mod repl;
mod terminal;

use history::InputHistory;
use terminal::TerminalSink;

#[derive(Parser)]
#[command(
    name = "quill",
    about = "Quill: an interactive coding agent for the terminal",
    version
)]
struct Cli {
    /// Send a single message instead of entering interactive mode
    #[arg(short, long)]
    message: Option<String>,

    /// Use the offline mock model (no API calls)
    #[arg(long)]
    mock: bool,

    /// Override the model name
    #[arg(long)]
    model: Option<String>,

    /// Read configuration from this file instead of ~/.config/quill/config.toml
    #[arg(short, long, env = "QUILL_CONFIG")]
    config: Option<PathBuf>,

    /// Write a default config file and exit
    #[arg(long)]
    init: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn default_config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config.validate()?;
            config
        }
        None => AppConfig::load()?,
    };

    if cli.mock {
        config.provider.use_mock = true;
    }
    if let Some(model) = &cli.model {
        config.provider.model = model.clone();
    }
    Ok(config)
}

fn write_default_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        println!("  Config already exists at {}", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("writing {}", path.display()))?;
    println!("  Wrote default config to {}", path.display());
    Ok(())
}

fn print_setup_help(config_path: &Path) {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    export QUILL_API_KEY=...     (generic)");
    eprintln!("    export GEMINI_API_KEY=...    (Google Gemini)");
    eprintln!();
    eprintln!("  Or add `api_key` under [provider] in:");
    eprintln!("    {}", config_path.display());
    eprintln!();
    eprintln!("  Run with --mock to try Quill without a key.");
    eprintln!();
}

fn print_banner(config: &AppConfig, prompt: &SystemPrompt) {
    let model = if config.provider.use_mock {
        "mock"
    } else {
        config.provider.model.as_str()
    };
    println!();
    println!("  Quill: interactive mode");
    println!();
    println!("  Model:     {model}");
    println!(
        "  Context:   {}",
        if prompt.agents_loaded {
            "AGENTS.md loaded"
        } else {
            "no AGENTS.md"
        }
    );
    println!();
    println!("  Type your message and press Enter. /help lists commands.");
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    if cli.init {
        return write_default_config(&config_path);
    }

    let config = load_config(&cli).context("Failed to load config")?;
    logging::init(cli.verbose, &config.logging);

    let registry = Arc::new(quill_tools::default_registry()?);
    let adapter = match quill_providers::build_from_config(&config, registry.clone()) {
        Ok(adapter) => adapter,
        Err(e) => {
            if config.provider.api_key.is_none() && !config.provider.use_mock {
                print_setup_help(&config_path);
            }
            return Err(e.into());
        }
    };

    let prompt = SystemPrompt::from_cwd(&config.system.prompt);
    info!(agents_loaded = prompt.agents_loaded, "System prompt assembled");
    let interactive = cli.message.is_none();
    if interactive {
        print_banner(&config, &prompt);
    }

    let orchestrator = Orchestrator::new(adapter, registry, prompt.into_string())
        .with_config(OrchestratorConfig::from(&config.agent))
        .with_telemetry(Arc::new(TracingTelemetry::new()));
    let session = Session::new(Arc::new(orchestrator));
    let sink = TerminalSink::new();

    match cli.message {
        Some(message) => repl::run_once(&session, &message, &sink).await,
        None => {
            let history_path = config.history.resolved_path();
            let history = InputHistory::from_config(&config.history).load(&history_path);
            repl::run_interactive(&session, &sink, history, history_path).await
        }
    }
}
