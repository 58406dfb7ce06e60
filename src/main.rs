mod bot;
mod config;
mod llm;
mod memory;
mod prompts;
mod text;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kotobot",
    version,
    about = "Telegram chat bot with OpenAI text and image generation"
)]
struct Cli {
    #[arg(short, long, default_value = "~/.kotobot/config.toml")]
    config: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot (default)
    Run,
    /// Create ~/.kotobot/ with a config template and default prompts
    Init,
    /// Summarize the persisted chat memory
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Init => {
            config::init_config_dir().await?;
            tracing::info!("Initialized ~/.kotobot/");
        }
        Commands::Run => run(&cli.config).await?,
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            let store = memory::MemoryStore::open(
                cfg.memory.memory_path(),
                cfg.memory.max_user_messages,
                cfg.memory.max_assistant_messages,
            );
            let (chats, input, output) = store.totals();
            println!("chats: {chats}");
            println!("input tokens: {input}");
            println!("output tokens: {output}");
        }
    }
    Ok(())
}

async fn run(config_path: &str) -> Result<()> {
    let cfg = config::load(config_path)?;
    std::fs::create_dir_all(&cfg.memory.base_dir).with_context(|| {
        format!("Failed to create data dir: {}", cfg.memory.base_dir.display())
    })?;

    let prompts_path = cfg.memory.prompts_path();
    let catalog = prompts::PromptCatalog::load(&prompts_path)?;
    tracing::info!(
        "Loaded {} prompt modes (default '{}')",
        catalog.modes().count(),
        catalog.default_mode()
    );

    let memory = memory::MemoryStore::open(
        cfg.memory.memory_path(),
        cfg.memory.max_user_messages,
        cfg.memory.max_assistant_messages,
    );
    let llm = llm::OpenAiClient::new(&cfg.openai);

    let state = Arc::new(bot::BotState::new(
        catalog,
        prompts_path,
        memory,
        llm,
        &cfg.openai,
    ));
    bot::run(&cfg.telegram.token, state).await
}
