use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kaede::{
    config::Config,
    database::{Database, repositories::SeaOrmJobStore},
    job_scheduling::{JobStore, Scheduler},
    recorder::Recorder,
    services::{
        CommandUpdater, FileWorkQueue, LogNotifier, Updater, signals::SignalAdapter,
    },
};

#[derive(Parser)]
#[command(name = "kaede")]
#[command(version)]
#[command(about = "Unattended broadcast recording scheduler")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the scheduler
    Scheduler,
    /// Add an available channel
    AddChannel {
        name: String,
        /// Channel number for the recorder
        #[arg(long, value_name = "CH")]
        recorder: i32,
        /// Channel number for the listings calendar
        #[arg(long, value_name = "CH")]
        syoboi: i32,
    },
    /// Add a tracking title
    AddTid { tid: i64 },
    /// List pending jobs
    List,
    /// Update jobs and programs with the sync command
    Update,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config.display());

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    let store = SeaOrmJobStore::new(database.connection());

    match cli.command {
        Command::Scheduler => run_scheduler(config, store).await,
        Command::AddChannel {
            name,
            recorder,
            syoboi,
        } => {
            let channel = store.add_channel(&name, recorder, syoboi).await?;
            info!(channel_id = channel.id, "Added channel {}", channel.name);
            Ok(())
        }
        Command::AddTid { tid } => {
            store.add_tracking_title(tid).await?;
            info!(tid, "Added tracking title");
            Ok(())
        }
        Command::List => list_jobs(&store).await,
        Command::Update => {
            let updater = CommandUpdater::new(config.sync.command.clone())
                .context("sync.command is not configured")?;
            updater.update().await?;
            Ok(())
        }
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let log_filter = format!("kaede={}", log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_scheduler(config: Config, store: SeaOrmJobStore) -> Result<()> {
    config.storage.ensure_directories()?;
    info!("Starting kaede v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn JobStore> = Arc::new(store);
    let recorder = Recorder::from_config(
        &config,
        store.clone(),
        Arc::new(LogNotifier::new()),
        Arc::new(FileWorkQueue::new(config.storage.work_queue_path.clone())),
    )?;

    let mut scheduler = Scheduler::setup(store, Arc::new(recorder));
    if let Some(updater) = CommandUpdater::new(config.sync.command.clone()) {
        scheduler = scheduler.with_updater(Arc::new(updater));
    }

    let signals = SignalAdapter::spawn(scheduler.handle())?;
    let result = scheduler.start().await;
    signals.shutdown(config.control.shutdown_timeout).await;

    if let Err(e) = &result {
        error!("Scheduler failed: {}", e);
    }
    Ok(result?)
}

async fn list_jobs(store: &SeaOrmJobStore) -> Result<()> {
    let jobs = store.due_jobs(Utc::now()).await?;
    let pids: Vec<i64> = jobs.iter().map(|job| job.pid).collect();
    let programs = store.programs(&pids).await?;
    for job in &jobs {
        match programs.iter().find(|program| program.pid == job.pid) {
            Some(program) => println!(
                "{}\t{}\t{}",
                job.enqueued_at.to_rfc3339(),
                program.pid,
                program.format_title()
            ),
            None => println!("{}\t{}\t(unknown program)", job.enqueued_at.to_rfc3339(), job.pid),
        }
    }
    Ok(())
}
