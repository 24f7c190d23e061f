use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

mod domain;
mod application;
mod infrastructure;
#[cfg(test)]
mod testing;

use application::errors::BotError;
use application::messaging::{MessageDispatcher, MessageParser, StateRouter};
use application::services::{Broadcaster, DailyScheduler, SchedulerMessage};
use domain::traits::{Bot, Clock, PhraseStore, SystemClock};
use infrastructure::adapters::console::{ConsoleAdapter, CONSOLE_CHAT};
use infrastructure::adapters::telegram::TelegramAdapter;
use infrastructure::config::{Config, ScheduleSettings};
use infrastructure::database::SqlitePhraseStore;
use infrastructure::storage::MemoryPhraseStore;

#[derive(Parser)]
#[command(name = "phrase-bot")]
#[command(about = "Collects phrases from chat users and broadcasts one every day", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Bot token (overrides config)
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
    InitConfig,
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

    match cli.command {
        Commands::Run => {
            if let Err(e) = run_bot(&cli.config, cli.token) {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("phrase-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            if let Err(e) = init_config() {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    }
}

fn load_config(config_path: &str, token_override: Option<String>) -> Result<Config, BotError> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env loaded: {}", e);
    }

    let mut config = if Path::new(config_path).exists() {
        Config::load(config_path)?
    } else {
        tracing::info!("{} not found, configuring from environment", config_path);
        Config::default()
    };
    config.apply_env(|key| std::env::var(key).ok())?;

    if token_override.is_some() {
        config.telegram.token = token_override;
    }
    Ok(config)
}

fn run_bot(config_path: &str, token_override: Option<String>) -> Result<(), BotError> {
    let config = load_config(config_path, token_override)?;
    let schedule = config.schedule()?;

    tracing::info!(
        "Starting {}: {} destinations, daily at {} {}",
        config.bot.name,
        schedule.destinations.len(),
        schedule.trigger.time.format("%H:%M"),
        schedule.trigger.timezone
    );

    let store: Arc<dyn PhraseStore> = match &config.database.path {
        Some(path) => Arc::new(SqlitePhraseStore::open(path)?),
        None => {
            tracing::warn!("No database path configured, phrases are kept in memory");
            Arc::new(MemoryPhraseStore::new())
        }
    };

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| BotError::Internal(format!("Failed to start runtime: {}", e)))?;

    rt.block_on(async {
        match config.telegram.token.clone() {
            Some(token) => {
                let mut bot = TelegramAdapter::new(token)
                    .with_request_timeout(Duration::from_secs(config.telegram.request_timeout_seconds));
                if let Some(url) = &config.telegram.api_url {
                    bot = bot.with_api_base(url.trim_end_matches('/'));
                }
                bot.fetch_bot_info().await?;
                let bot = Arc::new(bot);
                let services = Services::compose(bot.clone(), store, &schedule);

                if let Err(e) = bot.register_commands(services.router.commands()).await {
                    tracing::warn!("Failed to register commands: {}", e);
                }

                let parser = MessageParser::new(&config.bot.prefix);
                let poll_timeout = config.telegram.poll_timeout_seconds;
                let dispatcher = services.dispatcher.clone();
                services.serve(run_telegram_bot(bot, dispatcher, parser, poll_timeout)).await
            }
            None => {
                let bot = Arc::new(ConsoleAdapter::new());
                let services = Services::compose(bot.clone(), store, &schedule);
                let parser = MessageParser::new(&config.bot.prefix);
                let dispatcher = services.dispatcher.clone();
                services.serve(run_console_bot(bot, dispatcher, parser)).await
            }
        }
    })
}

/// Everything built on top of the store and the transport
struct Services {
    router: Arc<StateRouter>,
    dispatcher: Arc<MessageDispatcher>,
    scheduler: DailyScheduler,
}

impl Services {
    fn compose(bot: Arc<dyn Bot>, store: Arc<dyn PhraseStore>, schedule: &ScheduleSettings) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let broadcaster = Arc::new(
            Broadcaster::new(bot.clone()).with_delivery_timeout(schedule.delivery_timeout),
        );

        let router = Arc::new(
            StateRouter::new(store.clone(), broadcaster.clone(), schedule.destinations.clone())
                .with_clock(clock.clone())
                .with_timezone(schedule.trigger.timezone),
        );

        let scheduler = DailyScheduler::new(
            store,
            broadcaster,
            clock,
            schedule.trigger,
            schedule.destinations.clone(),
        )
        .with_check_interval(schedule.check_interval);

        Self {
            dispatcher: Arc::new(MessageDispatcher::new(router.clone(), bot)),
            router,
            scheduler,
        }
    }

    /// Run the scheduler alongside `transport` until it ends or Ctrl-C
    async fn serve(self, transport: impl std::future::Future<Output = Result<(), BotError>>) -> Result<(), BotError> {
        let (tx, rx) = mpsc::channel(1);
        let scheduler = tokio::spawn(self.scheduler.run(rx));

        let result = tokio::select! {
            result = transport => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                Ok(())
            }
        };

        self.dispatcher.shutdown().await;
        let _ = tx.send(SchedulerMessage::Shutdown).await;
        if let Err(e) = scheduler.await {
            tracing::error!("Scheduler task failed: {}", e);
        }
        result
    }
}

async fn run_telegram_bot(
    bot: Arc<TelegramAdapter>,
    dispatcher: Arc<MessageDispatcher>,
    parser: MessageParser,
    timeout_seconds: i64,
) -> Result<(), BotError> {
    bot.start().await?;

    let info = bot.bot_info();
    tracing::info!("Bot started: @{}", info.username);

    let mut offset: i64 = 0;
    tracing::info!("Starting message loop...");

    loop {
        match bot.get_updates(offset, timeout_seconds).await {
            Ok(updates) => {
                if !updates.is_empty() {
                    tracing::debug!("Received {} updates", updates.len());
                }
                for update in &updates {
                    if let Some(message) = TelegramAdapter::to_inbound(update, &parser) {
                        dispatcher.dispatch(message);
                    }
                }

                // Update offset
                offset = TelegramAdapter::get_next_offset(&updates, offset);
            }
            Err(e) => {
                tracing::error!("Failed to get updates: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn run_console_bot(
    bot: Arc<ConsoleAdapter>,
    dispatcher: Arc<MessageDispatcher>,
    parser: MessageParser,
) -> Result<(), BotError> {
    bot.start().await?;

    let info = bot.bot_info();
    tracing::info!("Bot started: @{}", info.username);

    let operator = domain::entities::User::new(CONSOLE_CHAT).with_username("console");

    // Main loop (for console mode)
    while let Some(input) = bot.read_line().await {
        let message = parser
            .parse(CONSOLE_CHAT, input, Some(operator.clone()))
            .with_platform("console");
        dispatcher.dispatch(message);
    }

    tracing::info!("End of input");
    Ok(())
}

fn init_config() -> Result<(), BotError> {
    let mut config = Config::default();
    config.broadcast.destinations = vec![-1001234567890];
    let yaml = serde_yaml::to_string(&config)
        .map_err(|e| BotError::Internal(format!("Failed to render config: {}", e)))?;
    println!("{}", yaml);
    println!("\nSave this to config.yaml and adjust as needed.");
    Ok(())
}
