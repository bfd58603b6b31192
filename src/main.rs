use std::sync::Arc;

use clap::{Parser, Subcommand};

use corvid_bot::application::dispatch::MatchDispatcher;
use corvid_bot::application::services::{admin, CommandRouter, TenantConfigStore};
use corvid_bot::domain::entities::{MessageEvent, User};
use corvid_bot::domain::traits::{ConfigBackend, Gateway};
use corvid_bot::extensions::builtin;
use corvid_bot::extensions::{ExtensionLoader, LoopScheduler};
use corvid_bot::infrastructure::adapters::ConsoleGateway;
use corvid_bot::infrastructure::config::Config;
use corvid_bot::infrastructure::database::Database;

/// Tenant scope used by the console adapter.
const CONSOLE_TENANT: &str = "console";
const CONSOLE_CHANNEL: &str = "general";

#[derive(Parser)]
#[command(name = "corvid-bot")]
#[command(about = "A multi-tenant chat-bot extension runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
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
        Commands::Run => run_bot(cli.config),
        Commands::Version => {
            println!("corvid-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => init_config(cli.config),
    }
}

fn init_config(path: String) {
    match Config::default().save(&path) {
        Ok(()) => println!("Wrote default config to {}", path),
        Err(e) => eprintln!("Failed to write config: {}", e),
    }
}

fn run_bot(config_path: String) {
    // Load config
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    tracing::info!("Starting corvid-bot: {}", config.bot.name);

    // Initialize database
    let database = match Database::new(&config.database.path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            return;
        }
    };
    tracing::info!("Database initialized");

    // Wire up the runtime
    let gateway: Arc<dyn Gateway> = Arc::new(ConsoleGateway::new(config.bot.name.clone()));
    let backend: Arc<dyn ConfigBackend> = database.clone();
    let tenant_config = Arc::new(TenantConfigStore::new(backend));
    let dispatcher = Arc::new(MatchDispatcher::new(
        tenant_config.clone(),
        gateway.identity(),
    ));
    let scheduler = Arc::new(LoopScheduler::new());
    let router = Arc::new(CommandRouter::new(
        config.bot.prefix.clone(),
        tenant_config.clone(),
    ));
    let host = corvid_bot::extensions::HostHandle::new(
        gateway.clone(),
        tenant_config.clone(),
        database.clone(),
    );
    let loader = Arc::new(ExtensionLoader::new(
        host,
        dispatcher.clone(),
        scheduler.clone(),
        router.clone(),
    ));

    for extension in builtin::manifest(CONSOLE_TENANT) {
        loader.register_factory(extension);
    }

    admin::register_core_commands(&router, Arc::downgrade(&loader), tenant_config.clone());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return;
        }
    };

    rt.block_on(async {
        if config.extensions.auto_load {
            match loader.load_all(true) {
                Ok(results) => {
                    for (name, result) in results {
                        tracing::info!("{}: {}", name, result.message);
                    }
                }
                Err(e) => tracing::error!("load_all failed: {}", e),
            }
        }

        run_console(&config, router, dispatcher).await;
    });
}

/// Console run loop: each input line becomes a [`MessageEvent`] from the
/// operator, routed first to commands and otherwise to the dispatcher.
async fn run_console(config: &Config, router: Arc<CommandRouter>, dispatcher: Arc<MatchDispatcher>) {
    let console = ConsoleGateway::new(config.bot.name.clone());
    println!(
        "{} ready. Commands use the '{}' prefix; 'quit' exits.",
        config.bot.name, config.bot.prefix
    );

    loop {
        let Some(line) = console.read_line("> ") else {
            break;
        };
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }

        let event = MessageEvent::new(
            CONSOLE_TENANT,
            CONSOLE_CHANNEL,
            User::new("operator").with_username("operator"),
            line,
        );

        if router.is_command(&event.content) {
            match router.handle(&event) {
                Ok(Some(reply)) => println!("{}", reply),
                Ok(None) => {}
                Err(e) => println!("Error: {}", e),
            }
        } else {
            dispatcher.dispatch(&event).await;
        }
    }

    tracing::info!("Shutting down");
}
