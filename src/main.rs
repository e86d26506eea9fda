use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use slotbook::agent::openai::OpenAiClient;
use slotbook::agent::{AgentError, AgentLoop, Termination};
use slotbook::catalog::{JsonFileSource, ServiceSource};
use slotbook::config::Config;
use slotbook::ledger::Ledger;
use slotbook::schedule::ScheduleFormat;
use slotbook::tools::ToolRegistry;

const APOLOGY: &str = "Sorry, the assistant is unavailable right now. Please try again later.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout is the user's channel; logs go to stderr.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env()?;
    slotbook::observability::init(config.metrics_port)?;

    let catalog = Arc::new(JsonFileSource::new(&config.services_file));
    let services = catalog.load()?;

    if let Some(dir) = config.ledger_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let ledger = Arc::new(Ledger::open(&config.ledger_path)?);

    info!("slotbook ready");
    info!("  services: {} ({})", services.len(), config.services_file.display());
    info!("  ledger: {}", config.ledger_path.display());
    info!("  model: {} via {} ({:?} tools)", config.model, config.api_base, config.tool_mode);
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let registry = Arc::new(ToolRegistry::new(catalog, ledger, ScheduleFormat::default()));
    let client = Arc::new(
        OpenAiClient::new(config.api_key.clone(), config.model.clone(), config.max_tokens)
            .with_base_url(config.api_base.clone()),
    );
    let agent = AgentLoop::new(client, registry, config.tool_mode);

    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"How can I help you? ").await?;
    stdout.flush().await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let Some(request) = lines.next_line().await? else {
        return Ok(());
    };

    let outcome = tokio::select! {
        outcome = agent.run(&request) => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, session abandoned");
            return Ok(());
        }
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(AgentError::InvalidRequest(reason)) => {
            tracing::warn!("request ignored: {reason}");
            return Ok(());
        }
        Err(e) => {
            tracing::error!("session failed: {e}");
            println!("{APOLOGY}");
            return Err(e.into());
        }
    };
    match outcome.termination {
        Termination::Terminated { message } => println!("{message}"),
        Termination::Exhausted => {}
        Termination::Interrupted { reason } => {
            tracing::error!("session interrupted: {reason}");
            println!("{APOLOGY}");
        }
    }
    Ok(())
}
