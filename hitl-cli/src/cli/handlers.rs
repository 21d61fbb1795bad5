//! Command handlers

use anyhow::{Context, Result};
use hitl_core::models::{
    Answer, Configuration, LogLevel, Outcome, Prompt, PromptKind, MAX_TIMEOUT_SECS,
};
use hitl_core::server::McpServer;
use hitl_core::services::{logging, result_payload, InteractionService};
use hitl_core::{BridgeCoordinator, Resolution};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const EXIT_OK: u8 = 0;
pub const EXIT_TIMED_OUT: u8 = 2;
pub const EXIT_CANCELLED: u8 = 3;
pub const EXIT_UNAVAILABLE: u8 = 4;

/// Expand a leading `~/`; None means the default location
pub fn resolve_config_path(config_arg: Option<&str>) -> Result<PathBuf> {
    match config_arg {
        Some(path) if path.starts_with("~/") => {
            let home = home_dir().context("HOME environment variable not set")?;
            Ok(home.join(&path[2..]))
        }
        Some(path) => Ok(PathBuf::from(path)),
        None => Configuration::default_config_path().context("Failed to get default config path"),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Load config + environment, start logging, and report config problems.
pub fn load_configuration(config_arg: Option<&str>) -> Result<Configuration> {
    let path = resolve_config_path(config_arg)?;
    let config = Configuration::load(Some(&path))
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    // A second init (tests, embedding) is not an error worth failing for
    let _ = logging::init_logging(config.log_level);
    tracing::debug!(path = %path.display(), "Configuration loaded");

    if let Err(problems) = config.validate() {
        for problem in problems {
            tracing::warn!("Configuration problem: {}", problem);
        }
    }
    Ok(config)
}

/// Cancel `token` on Ctrl+C or SIGTERM
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Split "question|choice1|choice2" into the question and its choices
pub fn parse_question(input: &str) -> (String, Option<Vec<String>>) {
    let mut parts = input.split('|').map(str::trim);
    let question = parts.next().unwrap_or_default().to_string();
    let choices: Vec<String> = parts.filter(|c| !c.is_empty()).map(String::from).collect();
    if choices.is_empty() {
        (question, None)
    } else {
        (question, Some(choices))
    }
}

pub fn exit_code_for(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Fulfilled {
            answer: Answer::Dismissed,
        } => EXIT_CANCELLED,
        Outcome::Fulfilled { .. } => EXIT_OK,
        Outcome::TimedOut => EXIT_TIMED_OUT,
        Outcome::Cancelled => EXIT_CANCELLED,
        Outcome::ChannelUnavailable { .. } => EXIT_UNAVAILABLE,
    }
}

/// Start the MCP server on stdio
pub async fn handle_serve(config_path: Option<String>) -> Result<u8> {
    let config = load_configuration(config_path.as_deref())?;
    let bridge = Arc::new(BridgeCoordinator::from_config(&config));
    let service = InteractionService::new(bridge, config.dialog.title.clone());
    let server = McpServer::new(service);

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());
    server.run(shutdown).await.context("MCP server failed")?;
    tracing::info!("MCP server stopped");
    Ok(EXIT_OK)
}

async fn run_prompt(
    config_path: Option<String>,
    prompt: Prompt,
    timeout: Option<u64>,
    json: bool,
) -> Result<u8> {
    let config = load_configuration(config_path.as_deref())?;
    let bridge = BridgeCoordinator::from_config(&config);
    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    let kind = prompt.kind.clone();
    let resolution = bridge
        .request(prompt, timeout.map(Duration::from_secs), &cancel)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result_payload(&kind, &resolution))?);
    } else {
        print_resolution(&resolution);
    }
    Ok(exit_code_for(&resolution.outcome))
}

fn print_resolution(resolution: &Resolution) {
    match &resolution.outcome {
        Outcome::Fulfilled { answer } => match answer {
            Answer::Choices(choices) => {
                for choice in choices {
                    println!("{}", choice);
                }
            }
            Answer::Acknowledged => eprintln!("Message delivered"),
            Answer::Dismissed => eprintln!("Dismissed without an answer"),
            other => println!("{}", other.as_text().unwrap_or_default()),
        },
        Outcome::TimedOut => eprintln!("Timed out waiting for a response"),
        Outcome::Cancelled => eprintln!("Cancelled"),
        Outcome::ChannelUnavailable { reason } => eprintln!("No channel available: {}", reason),
    }
}

fn title_or_default(title: Option<String>) -> String {
    title.unwrap_or_else(|| "Human-in-the-Loop".to_string())
}

pub async fn handle_ask(
    config_path: Option<String>,
    question: String,
    timeout: Option<u64>,
    title: Option<String>,
    json: bool,
) -> Result<u8> {
    let (text, choices) = parse_question(&question);
    let title = title_or_default(title);
    let prompt = match choices {
        Some(choices) => Prompt::choice(title, text, choices, false),
        None => Prompt::text(title, text),
    };
    run_prompt(config_path, prompt, timeout, json).await
}

pub async fn handle_confirm(
    config_path: Option<String>,
    message: String,
    timeout: Option<u64>,
    title: Option<String>,
    json: bool,
) -> Result<u8> {
    let prompt = Prompt::new(title_or_default(title), message, PromptKind::Confirmation);
    run_prompt(config_path, prompt, timeout, json).await
}

pub async fn handle_notify(
    config_path: Option<String>,
    message: String,
    title: Option<String>,
) -> Result<u8> {
    let prompt = Prompt::info(title_or_default(title), message);
    run_prompt(config_path, prompt, None, false).await
}

pub async fn handle_health(config_path: Option<String>, json: bool) -> Result<u8> {
    let config = load_configuration(config_path.as_deref())?;
    let bridge = Arc::new(BridgeCoordinator::from_config(&config));
    let service = InteractionService::new(bridge, config.dialog.title.clone());
    let report = service.health().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let field = |key: &str| match report.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => "-".to_string(),
            Some(other) => other.to_string(),
        };
        println!("Status:            {}", field("status"));
        println!(
            "Telegram:          configured={} reachable={}",
            field("remote_configured"),
            field("remote_reachable")
        );
        if let Some(bot) = report.get("bot_username").and_then(|v| v.as_str()) {
            println!("Bot:               @{}", bot);
        }
        println!(
            "Dialog:            available={} tool={}",
            field("dialog_available"),
            field("dialog_tool")
        );
        println!("Default timeout:   {}s", field("default_timeout_seconds"));
        println!("Platform:          {}", field("platform"));
    }

    let healthy = report.get("status").and_then(|s| s.as_str()) == Some("healthy");
    Ok(if healthy { EXIT_OK } else { EXIT_UNAVAILABLE })
}

fn read_user_input_sync() -> Result<String> {
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input)
}

fn prompt_line(label: &str, current: &str) -> Result<String> {
    print!("{} [{}]: ", label, current);
    io::stdout().flush()?;
    Ok(read_user_input_sync()?.trim().to_string())
}

/// Write a configuration file, asking for the main values (Enter keeps the default).
pub fn handle_config_init(config_file: Option<String>) -> Result<u8> {
    let config_path = resolve_config_path(config_file.as_deref())?;

    println!("⚙️  Initializing hitl configuration");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📄 Config file: {}", config_path.display());

    let mut config = if config_path.exists() {
        println!("⚠️  Configuration file already exists. Loading existing values...");
        Configuration::load_from_file(&config_path)
            .context("Failed to load existing config")?
    } else {
        println!("✨ Creating new configuration with defaults...");
        Configuration::default()
    };

    println!("\n📝 Please answer the following questions (press Enter to use default):\n");

    let timeout = prompt_line("Default timeout in seconds", &config.timeout_seconds.to_string())?;
    if !timeout.is_empty() {
        match timeout.parse::<u64>() {
            Ok(secs) if secs > 0 && secs <= MAX_TIMEOUT_SECS => config.timeout_seconds = secs,
            _ => println!("⚠️  Invalid timeout value, using default"),
        }
    }

    let chat_id = prompt_line(
        "Telegram chat id (empty = dialog only)",
        config.providers.telegram.chat_id.as_deref().unwrap_or(""),
    )?;
    if !chat_id.is_empty() {
        if chat_id.parse::<i64>().is_ok() {
            config.providers.telegram.chat_id = Some(chat_id);
        } else {
            println!("⚠️  Chat id must be numeric, leaving it unchanged");
        }
    }

    let level = prompt_line("Log level (error/warn/info/debug/trace)", config.log_level.as_str())?;
    if !level.is_empty() {
        match level.parse::<LogLevel>() {
            Ok(level) => config.log_level = level,
            Err(_) => println!("⚠️  Invalid log level, using default"),
        }
    }

    let fallback = prompt_line(
        "Fall back to the dialog when Telegram fails (yes/no)",
        if config.fallback_to_dialog { "yes" } else { "no" },
    )?;
    match fallback.to_lowercase().as_str() {
        "" => {}
        "y" | "yes" => config.fallback_to_dialog = true,
        "n" | "no" => config.fallback_to_dialog = false,
        _ => println!("⚠️  Expected yes or no, using default"),
    }

    if let Err(problems) = config.validate() {
        for problem in problems {
            println!("⚠️  {}", problem);
        }
    }

    config
        .save_to_file(&config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("\n✅ Configuration saved to {}", config_path.display());
    println!("🔑 Set HITL_TELEGRAM_BOT_TOKEN in the environment to enable Telegram");
    Ok(EXIT_OK)
}
