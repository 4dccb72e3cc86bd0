use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use event_console::config::ConsoleConfig;
use event_console::display::{print_group_leaders, selection_summary};
use event_console::error::Result;
use event_console::roster::{GlDirectory, LeaderSource};
use event_console::selection::{DeepLink, NoopRenderer, SelectionReconciler, SessionState};
use event_console::store::{JsonFileStore, StoreReader};
use event_console::tokens::TokenRegistry;
use event_console::web;

#[derive(Parser)]
#[command(name = "event-console", about = "Event support console core")]
struct Cli {
    /// JSON document standing in for the shared store
    #[arg(long, global = true)]
    store: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List team leaders of a group
    Leaders {
        event: String,
        group: String,
        #[arg(long)]
        schedule: Option<String>,
    },
    /// Mint collision-free tokens against the store snapshot
    Tokens {
        #[arg(default_value_t = 1)]
        count: usize,
    },
    /// Resolve a deep-link query string against the stored events
    Open { query: String },
    /// Start the web server
    Web {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = ConsoleConfig::load()?;
    if let Some(path) = cli.store {
        config.store.document = path;
    }
    let store: Arc<dyn StoreReader> = Arc::new(JsonFileStore::new(&config.store.document));

    match cli.command {
        Command::Leaders {
            event,
            group,
            schedule,
        } => {
            let directory = GlDirectory::new(store, config.store.clone(), config.groups.clone());
            let schedule_id = schedule.as_deref().unwrap_or_default();
            let leaders = directory
                .collect_leaders(&group, LeaderSource::Event(&event), schedule_id)
                .await?;
            print_group_leaders(&group, schedule.as_deref(), &leaders);
        }
        Command::Tokens { count } => {
            let registry = TokenRegistry::new(store, config.store.tokens_path.clone(), &config.tokens);
            for token in registry.mint(count).await? {
                println!("{}", token);
            }
        }
        Command::Open { query } => {
            let mut session = SessionState::new(DeepLink::from_query(&query));
            let reconciler = SelectionReconciler::new(NoopRenderer);
            reconciler
                .reload(&mut session, store.as_ref(), &config.store.events_path, false)
                .await?;
            if let Some(notice) = &session.notice {
                println!("Notice: {}", notice);
            }
            println!("{}", selection_summary(&session));
        }
        Command::Web { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            println!("Access the console API at http://localhost:{}", config.server.port);
            web::start_server(web::AppState::new(store, config)).await?;
        }
    }

    Ok(())
}
