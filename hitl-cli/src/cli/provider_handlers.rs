//! Handler for provider list and provider telegram test

use anyhow::{bail, Result};

use super::handlers::{load_configuration, EXIT_OK};
use super::provider::{ProviderCommands, TelegramCommands};
use hitl_core::models::{Configuration, ENV_BOT_TOKEN};
use hitl_core::providers::{DialogSurface, NativeDialog, RelayService, TelegramClient};

/// Status for provider list (no secrets)
fn telegram_status(config: &Configuration) -> &'static str {
    if !config.providers.telegram.enabled {
        return "disabled";
    }
    let chat_ok = config
        .providers
        .telegram
        .chat_id
        .as_ref()
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false);
    let token_set = config.telegram_bot_token.is_some();
    match (token_set, chat_ok) {
        (true, true) => "configured",
        (false, _) => "missing_token",
        (_, false) => "missing_chat_id",
    }
}

fn dialog_status(config: &Configuration, dialog: &NativeDialog) -> String {
    if !config.dialog.enabled {
        return "disabled".to_string();
    }
    match dialog.check_available() {
        Ok(()) => "available".to_string(),
        Err(e) => format!("unavailable ({})", e),
    }
}

pub async fn handle_provider_commands(
    config_path: Option<String>,
    command: ProviderCommands,
) -> Result<u8> {
    let config = load_configuration(config_path.as_deref())?;
    match command {
        ProviderCommands::List => handle_provider_list(&config),
        ProviderCommands::Telegram { command: cmd } => match cmd {
            TelegramCommands::Test => handle_provider_telegram_test(&config).await,
        },
    }
}

fn handle_provider_list(config: &Configuration) -> Result<u8> {
    let dialog = NativeDialog::new();
    println!("provider\tenabled\tstatus");
    println!(
        "telegram\t{}\t{}",
        config.providers.telegram.enabled,
        telegram_status(config)
    );
    println!(
        "dialog\t{}\t{} [{}]",
        config.dialog.enabled,
        dialog_status(config, &dialog),
        dialog.name()
    );
    Ok(EXIT_OK)
}

async fn handle_provider_telegram_test(config: &Configuration) -> Result<u8> {
    if !config.providers.telegram.enabled {
        bail!("Telegram not enabled in config");
    }
    let Some(settings) = config.telegram_settings() else {
        match telegram_status(config) {
            "missing_token" => bail!("{} not set", ENV_BOT_TOKEN),
            _ => bail!("Chat ID not configured for Telegram"),
        }
    };

    let client = TelegramClient::from_settings(&settings);
    let me = client
        .identity()
        .await
        .map_err(|e| anyhow::anyhow!("Bot token check failed: {}", e))?;
    println!(
        "Bot: @{} (id {})",
        me.username.as_deref().unwrap_or("unknown"),
        me.id
    );

    client
        .send_message(&settings.chat_id, "hitl Telegram test: replies from this chat will be accepted")
        .await
        .map_err(|e| anyhow::anyhow!("Send failed: {}", e))?;
    println!("Test message sent to Telegram");
    Ok(EXIT_OK)
}
