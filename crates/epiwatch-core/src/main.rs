//! EpiWatch CLI
//!
//! Command-line interface for the EpiWatch outbreak alerting service.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use epiwatch::alerting::FanoutService;
use epiwatch::api::{AppState, HttpServer};
use epiwatch::db::{
    AlertRepository, Database, NotificationRepository, OutbreakRepository, PgHospitalDirectory,
    PgUserDirectory,
};
use epiwatch::realtime::PresenceRegistry;
use epiwatch::Config;

/// EpiWatch - Disease Outbreak Alerting
#[derive(Parser)]
#[command(name = "epiwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "EPIWATCH_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the EpiWatch API server
    Serve {
        /// HTTP API port (overrides configuration)
        #[arg(long, env = "EPIWATCH_HTTP_PORT")]
        http_port: Option<u16>,
    },

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Show system health status
    Health,
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config, cli.verbose);

    let result = match cli.command {
        Commands::Serve { http_port } => run_serve(config, http_port).await,
        Commands::Db { command } => run_db(config, command).await,
        Commands::Health => run_health(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_serve(config: Config, http_port: Option<u16>) -> anyhow::Result<()> {
    let port = http_port.unwrap_or(config.server.http_port);
    let addr: SocketAddr = format!("{}:{port}", config.server.host).parse()?;

    let database = Database::new(&config).await?;
    database.migrate().await?;

    let pool = database.postgres.pool().clone();
    let outbreaks = OutbreakRepository::new(pool.clone());
    let alerts = AlertRepository::new(pool.clone());
    let notifications = NotificationRepository::new(pool.clone());
    let users = Arc::new(PgUserDirectory::new(pool.clone()));
    let hospitals = Arc::new(PgHospitalDirectory::new(pool));

    let presence = Arc::new(PresenceRegistry::new());
    let fanout = Arc::new(FanoutService::new(
        alerts.clone(),
        notifications.clone(),
        outbreaks.clone(),
        users.clone(),
        presence.clone(),
    ));

    let state = AppState {
        database,
        outbreaks,
        alerts,
        notifications,
        users,
        hospitals,
        presence,
        fanout,
        resync_limit: config.alerting.resync_limit,
    };

    info!(%addr, "starting EpiWatch");
    HttpServer::new(state).serve(addr).await?;

    info!("shutdown complete");
    Ok(())
}

async fn run_db(config: Config, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Migrate => {
            let database = Database::new(&config).await?;
            database.migrate().await?;
            println!("Migrations applied");
        }
    }
    Ok(())
}

async fn run_health(config: Config) -> anyhow::Result<()> {
    let database = Database::new(&config).await?;
    match database.health_check().await {
        Ok(()) => println!("Database: connected"),
        Err(e) => println!("Database: unavailable ({e})"),
    }
    Ok(())
}
