//! Leker Worker - visit scheduling backend for field sales vendors
//!
//! Connects to NATS and PostgreSQL and answers scheduling requests. The
//! `plan` subcommand runs the planner offline against a JSON client list.

mod cli;
mod config;
mod db;
mod defaults;
mod error;
mod handlers;
mod services;
mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::db::queries::{PgClientDirectory, PgScheduleRepository};
use crate::services::auto_reschedule;
use crate::services::fuel::FuelConfigService;
use crate::services::memory::{InMemoryClientDirectory, InMemoryScheduleRepository, RecordingNotifier};
use crate::services::notifications::NatsNotifier;
use crate::services::scheduler::ScheduleService;
use crate::types::{GenerateScheduleRequest, VisitObligation};

fn init_tracing(logs_dir: &str) -> WorkerGuard {
    std::fs::create_dir_all(logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "worker.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Console output goes to stderr so `plan` can print JSON on stdout
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,leker_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Loads .env before anything reads the environment
    let config = Config::from_env()?;
    let _guard = init_tracing(&config.logs_dir);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => migrate(config).await,
        Command::Plan {
            input,
            start,
            end,
            vendor,
        } => plan(config, &input, start, end, vendor).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Leker Worker...");

    let pool = db::create_pool(config.require_database_url()?).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    let service = Arc::new(ScheduleService::new(
        Arc::new(PgClientDirectory::new(pool.clone())),
        Arc::new(PgScheduleRepository::new(pool)),
        Arc::new(NatsNotifier::new(nats_client.clone(), config.notifications.clone())),
        Arc::new(FuelConfigService::new(config.fuel.clone())),
        config.planner.clone(),
    ));

    let cancel = CancellationToken::new();
    let trigger = tokio::spawn(auto_reschedule::run(
        service.clone(),
        config.auto_reschedule.clone(),
        cancel.clone(),
    ));

    let handler_result = tokio::select! {
        result = handlers::start_handlers(nats_client, service) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    };

    cancel.cancel();
    trigger.await.ok();

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

async fn migrate(config: Config) -> Result<()> {
    let pool = db::create_pool(config.require_database_url()?).await?;
    db::run_migrations(&pool).await
}

async fn plan(config: Config, input: &Path, start: NaiveDate, end: NaiveDate, vendor: Option<Uuid>) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let clients: Vec<VisitObligation> =
        serde_json::from_str(&raw).with_context(|| format!("Invalid client list in {}", input.display()))?;

    let vendor_id = vendor.unwrap_or_else(Uuid::nil);
    info!("Planning {} clients for vendor {} from {} to {}", clients.len(), vendor_id, start, end);

    let service = ScheduleService::new(
        Arc::new(InMemoryClientDirectory::with_clients(vendor_id, clients)),
        Arc::new(InMemoryScheduleRepository::new()),
        Arc::new(RecordingNotifier::new()),
        Arc::new(FuelConfigService::new(config.fuel.clone())),
        config.planner.clone(),
    );

    let result = service
        .generate(GenerateScheduleRequest {
            vendor_id,
            start_date: start,
            end_date: end,
            exclude_client_ids: Vec::new(),
            as_of: None,
            fuel_efficiency_kml: None,
        })
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.code(), e))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
