//! Provider subcommands (list, telegram test)

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ProviderCommands {
    /// List configured providers and their status (no secrets)
    List,
    /// Telegram provider
    Telegram {
        #[command(subcommand)]
        command: TelegramCommands,
    },
}

#[derive(Subcommand)]
pub enum TelegramCommands {
    /// Check the bot token and send a test message to the configured chat
    Test,
}
