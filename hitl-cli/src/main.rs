mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::handlers;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "hitl")]
#[command(version)]
#[command(about = "Human-in-the-Loop bridge: ask a human through Telegram or a desktop dialog")]
#[command(
    help_template = "{name} - {version}\n{about}\n\n{usage-heading}\n  {usage}\n\n{all-args}{options}\n"
)]
struct Cli {
    /// Path to configuration file (default: ~/.config/hitl/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdio (default when no command is given)
    Serve,

    /// Ask a question and wait for the human's answer
    ///
    /// Multiple Choice Format:
    ///   Use pipe (|) separator: "question|choice1|choice2|choice3"
    ///   Example: "What color?|red|blue|green"
    ///
    /// Exit codes: 0 answered, 2 timed out, 3 cancelled or dismissed, 4 no channel available
    ///
    /// Examples:
    ///   hitl ask "What is your name?"
    ///   hitl ask "Choose a color|red|blue|green" --json --timeout 60
    Ask {
        /// The question text. For multiple choice, use pipe separator: "question|choice1|choice2|..."
        question: String,

        /// Seconds to wait for an answer (default: configured timeout)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Window / message title
        #[arg(long)]
        title: Option<String>,

        /// Output the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a yes/no question
    Confirm {
        /// What the human is confirming
        message: String,

        /// Seconds to wait for an answer (default: configured timeout)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Window / message title
        #[arg(long)]
        title: Option<String>,

        /// Output the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an informational message (no answer collected)
    Notify {
        /// Message text
        message: String,

        /// Window / message title
        #[arg(long)]
        title: Option<String>,
    },

    /// Report which channels can reach the human
    Health {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Configure hitl settings
    Config {
        /// Start interactive configuration setup
        #[arg(long)]
        init: bool,

        /// Path to configuration file
        #[arg(long)]
        config_file: Option<String>,
    },

    /// Provider management (list, telegram test)
    Provider {
        #[command(subcommand)]
        command: cli::provider::ProviderCommands,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli.config;

    let code = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => handlers::handle_serve(config_path).await?,
        Commands::Ask {
            question,
            timeout,
            title,
            json,
        } => handlers::handle_ask(config_path, question, timeout, title, json).await?,
        Commands::Confirm {
            message,
            timeout,
            title,
            json,
        } => handlers::handle_confirm(config_path, message, timeout, title, json).await?,
        Commands::Notify { message, title } => {
            handlers::handle_notify(config_path, message, title).await?
        }
        Commands::Health { json } => handlers::handle_health(config_path, json).await?,
        Commands::Config { init, config_file } => {
            if init {
                handlers::handle_config_init(config_file.or(config_path))?
            } else {
                println!("Config command requires --init flag");
                println!("Usage: hitl config --init [--config-file PATH]");
                0
            }
        }
        Commands::Provider { command } => {
            cli::provider_handlers::handle_provider_commands(config_path, command).await?
        }
    };

    Ok(ExitCode::from(code))
}
