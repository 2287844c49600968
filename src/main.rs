use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ping_bot::application::errors::{BotError, ConfigError};
use ping_bot::application::runner;
use ping_bot::bootstrap::{build_dispatcher, default_registry};
use ping_bot::domain::traits::{Gateway, OutputSink};
use ping_bot::infrastructure::adapters::{ConsoleGateway, ConsoleSink, RetryingSink, TelegramClient, TelegramGateway};
use ping_bot::infrastructure::config::Config;

#[derive(Parser)]
#[command(name = "ping-bot")]
#[command(about = "A minimal command dispatch bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Bot token (overrides config and BOT_TOKEN)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => run_bot(&cli.config, cli.token),
        Commands::Version => {
            println!("ping-bot v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig { force } => init_config(&cli.config, force),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(config_path: &Path, token_override: Option<String>) -> Result<Config, BotError> {
    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        tracing::warn!("Config {} not found, using defaults", config_path.display());
        Config::default()
    };

    config.apply_env(|key| std::env::var(key).ok());

    if let Some(token) = token_override {
        config.apply_env(|key| (key == "BOT_TOKEN").then(|| token.clone()));
    }

    config.validate()?;
    Ok(config)
}

fn run_bot(config_path: &Path, token_override: Option<String>) -> Result<(), BotError> {
    let config = load_config(config_path, token_override)?;

    tracing::info!("Starting {} with prefix {}", config.bot.name, config.bot.prefix);

    // One event at a time, no worker threads
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| BotError::Internal(format!("Failed to start runtime: {}", e)))?;

    rt.block_on(async {
        let registry = default_registry(&config);

        let (mut gateway, sink): (Box<dyn Gateway>, Arc<dyn OutputSink>) = match config.telegram_token() {
            Some(token) => {
                let client = Arc::new(TelegramClient::new(token));
                let info = client.get_me().await?;
                tracing::info!(
                    "Bot started: @{}",
                    info.username.as_deref().unwrap_or(&info.first_name)
                );

                let poll_timeout = config.adapters.telegram.as_ref()
                    .map(|t| t.poll_timeout_seconds)
                    .unwrap_or(30);
                let sink: Arc<dyn OutputSink> = Arc::new(RetryingSink::new(client.clone(), config.retry_policy()));
                let gateway: Box<dyn Gateway> = Box::new(TelegramGateway::new(client, poll_timeout));
                (gateway, sink)
            }
            None => {
                // Run console bot (dev mode)
                let (channel_id, user_id) = config.adapters.console.as_ref()
                    .map(|c| (c.channel_id.clone(), c.user_id.clone()))
                    .unwrap_or_else(|| ("console".to_string(), "local".to_string()));
                tracing::info!("No bot token configured, reading commands from stdin");
                let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink::new());
                let gateway: Box<dyn Gateway> = Box::new(ConsoleGateway::stdin(channel_id, user_id));
                (gateway, sink)
            }
        };

        let dispatcher = build_dispatcher(&config, registry, sink);
        let stats = runner::run(gateway.as_mut(), &dispatcher, &config.runner_options()).await?;

        tracing::info!(
            "Stopped after {} messages ({} replies, {} failures)",
            stats.received, stats.delivered, stats.failed
        );
        Ok::<(), BotError>(())
    })
}

fn init_config(path: &Path, force: bool) -> Result<(), BotError> {
    if path.exists() && !force {
        return Err(ConfigError::InvalidValue(format!(
            "{} already exists, pass --force to overwrite",
            path.display()
        )).into());
    }

    let yaml = Config::default().to_yaml()?;
    std::fs::write(path, yaml).map_err(ConfigError::from)?;

    println!("Wrote default config to {}", path.display());
    println!("Set BOT_TOKEN in the environment to connect to Telegram.");
    Ok(())
}
