//! # chat-memory
//!
//! Chat with a hosted model while the conversation history is kept per
//! session and trimmed to a token budget before every call.

use anyhow::Result;
use clap::{Parser, Subcommand};
use memory_cli::config::{ChatMemoryConfig, ConfigLoader, CounterKind, ProviderKind};
use memory_cli::{build_counter, build_pipeline, chat, trim};
use memory_core::{StartOn, TrimConfig};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chat-memory")]
#[command(about = "Chat with session memory and token-budgeted history", long_about = None)]
#[command(version)]
struct Cli {
    /// Extra config file, applied after user and project configs
    #[arg(short, long, global = true, env = "CHAT_MEMORY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat on stdin
    Chat {
        /// Session to start in
        #[arg(short, long)]
        session: Option<String>,

        /// System prompt placed before every window
        #[arg(long)]
        system: Option<String>,

        /// Model backend
        #[arg(short, long, value_enum)]
        provider: Option<ProviderKind>,

        /// Trimming token budget
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Trim a JSON conversation file and print the surviving window
    Trim {
        /// Path to a JSON array of messages
        #[arg(short, long)]
        file: PathBuf,

        /// Token budget
        #[arg(short, long)]
        max_tokens: usize,

        /// Role the window must start on (human, ai, system, any)
        #[arg(long, default_value = "human")]
        start_on: StartOn,

        /// Do not reserve a leading system message
        #[arg(long)]
        no_system: bool,

        /// Token counting backend
        #[arg(long, value_enum, default_value = "approximate")]
        counter: CounterKind,
    },
}

fn init_logging(config: &ChatMemoryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new().load(cli.config.as_deref()).await?;
    init_logging(&config);

    match cli.command {
        Commands::Chat {
            session,
            system,
            provider,
            max_tokens,
        } => {
            if let Some(system) = system {
                config.chat.system_prompt = Some(system);
            }
            if let Some(provider) = provider {
                config.llm.provider = provider;
            }
            if let Some(max_tokens) = max_tokens {
                config.trim.max_tokens = max_tokens;
            }
            let session = session.unwrap_or_else(|| config.chat.session.clone());

            let pipeline = build_pipeline(&config)?;
            info!(session_id = %session, "Starting chat");

            let stdin = BufReader::new(tokio::io::stdin());
            chat::run_chat(&pipeline, &session, stdin, tokio::io::stdout()).await?;
        }
        Commands::Trim {
            file,
            max_tokens,
            start_on,
            no_system,
            counter,
        } => {
            let trim_config = TrimConfig::new(max_tokens)
                .with_start_on(start_on)
                .with_include_system(!no_system);
            let counter = build_counter(counter)?;

            let window = trim::trim_file(&file, &trim_config, counter.as_ref()).await?;
            println!("{}", window);
        }
    }

    Ok(())
}
