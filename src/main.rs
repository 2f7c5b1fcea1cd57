use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskboard::api::{self, AppState};
use taskboard::config::AppConfig;
use taskboard::events::EventBus;
use taskboard::store::Store;
use taskboard::sync::SyncEngine;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Personal task and project tracker with calendar feed sync")]
struct Cli {
    /// Data directory (overrides TASKBOARD_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and the calendar auto-sync
    Serve {
        /// Port for HTTP API
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not sync the calendar feed in the background
        #[arg(long)]
        no_auto_sync: bool,
    },
    /// Run one calendar sync and print the outcome
    Sync,
    /// Print a summary of stored data
    Status,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "taskboard=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let store = Store::open(&config.data_dir).await?;
    let events = EventBus::new();
    let engine = SyncEngine::new(store.clone(), events.clone(), config.sync_options());

    match cli.command {
        Some(Commands::Serve { port, no_auto_sync }) => {
            serve(
                AppState {
                    store,
                    sync: engine,
                    events,
                },
                port.unwrap_or(config.port),
                (!no_auto_sync).then_some(config.sync_interval),
            )
            .await?;
        }
        Some(Commands::Sync) => {
            let outcome = engine.sync().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Some(Commands::Status) => {
            let data = store.get_all().await?;
            let done = data.tasks.iter().filter(|t| t.is_done).count();
            let imported = data.tasks.iter().filter(|t| t.is_calendar_event).count();
            println!("Data directory: {}", store.data_dir().display());
            println!(
                "Tasks: {} ({} done, {} from calendar)",
                data.tasks.len(),
                done,
                imported
            );
            println!("Projects: {}", data.projects.len());
            println!(
                "Calendar feed: {}",
                data.settings.feed_url().unwrap_or("not configured")
            );
        }
        None => {
            serve(
                AppState {
                    store,
                    sync: engine,
                    events,
                },
                config.port,
                Some(config.sync_interval),
            )
            .await?;
        }
    }

    Ok(())
}

async fn serve(
    state: AppState,
    port: u16,
    auto_sync: Option<std::time::Duration>,
) -> anyhow::Result<()> {
    tracing::info!("Starting Taskboard on port {}", port);

    if let Some(interval) = auto_sync {
        state.sync.start_auto_sync(interval);
    }

    let app = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Taskboard listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
