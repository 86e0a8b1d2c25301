// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use crate::cli_args::{AssistArgs, Command, CredentialArgs, CredentialCommand, LookupCommand};
use clap::Parser;
use skyblock_assistant::constants;
use skyblock_assistant::credential::{Credential, CredentialPool};
use skyblock_assistant::db::AssistDb;
use skyblock_assistant::fetch::{FetchError, Orchestrator, last_save};
use skyblock_assistant::http::hypixel::HypixelClient;
use skyblock_assistant::http::mojang::MojangClient;
use skyblock_assistant::time::{SimpleTime, SystemClock};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod cli_args;

type Error = Box<dyn std::error::Error + Send + Sync>;
type LiveOrchestrator = Orchestrator<HypixelClient, MojangClient>;

const DB_OPEN_ERROR_MESSAGE: &str = "Failed to open database";
const DB_READ_ERROR_MESSAGE: &str = "Failed to read from database";
const DB_WRITE_ERROR_MESSAGE: &str = "Failed to write to database";
const DEFAULT_LOG_FILTER: &str = "info,skyblock_assistant=debug";

const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const OPTIMIZE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli_args = AssistArgs::parse();
    init_logging();

    let db = match AssistDb::open(&cli_args.db).await {
        Ok(db) => db,
        Err(e) => {
            error!("{} {}: {:?}", DB_OPEN_ERROR_MESSAGE, cli_args.db.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let exit_code = match cli_args.command {
        Some(Command::Credential(CredentialArgs { command })) => credential_command(&db, command).await,
        Some(Command::LeaderboardUri { uri }) => match db.set_leaderboard_uri(&uri).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{}: {:?}", DB_WRITE_ERROR_MESSAGE, e);
                ExitCode::FAILURE
            }
        },
        Some(Command::Status) => status(&db).await,
        Some(Command::Lookup(command)) => match build_orchestrator(&db).await {
            Some(orchestrator) => lookup(&orchestrator, command).await,
            None => ExitCode::FAILURE,
        },
        None => match build_orchestrator(&db).await {
            Some(orchestrator) => run_jobs(orchestrator).await,
            None => ExitCode::FAILURE,
        },
    };

    db.close().await;
    exit_code
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .unwrap_or_default();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[allow(clippy::print_stdout)]
async fn credential_command(db: &AssistDb, command: CredentialCommand) -> ExitCode {
    let result = match command {
        CredentialCommand::Add { token } => {
            if Credential::parse(&token).is_none() {
                error!("that is not a valid Hypixel API key");
                return ExitCode::FAILURE;
            }
            db.add_credential(token.trim(), SimpleTime::now()).await.map(|added| {
                if !added {
                    info!("API key was already stored");
                }
            })
        }
        CredentialCommand::Rm { token } => db.remove_credential(token.trim()).await.map(|removed| {
            if !removed {
                warn!("API key was not stored");
            }
        }),
        CredentialCommand::Ls => db.credentials().await.map(|tokens| {
            for token in tokens {
                match Credential::parse(&token) {
                    Some(credential) => println!("{credential:?}"),
                    None => println!("{token} (malformed)"),
                }
            }
        }),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}: {:?}", DB_WRITE_ERROR_MESSAGE, e);
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stdout)]
async fn status(db: &AssistDb) -> ExitCode {
    let counts = match db.record_counts().await {
        Ok(counts) => counts,
        Err(e) => {
            error!("{}: {:?}", DB_READ_ERROR_MESSAGE, e);
            return ExitCode::FAILURE;
        }
    };
    for (table, count) in counts {
        println!("{}: {} records", table.name(), count);
    }
    match (db.identity_count().await, db.size().await) {
        (Ok(identities), Ok(size)) => {
            println!("identity: {identities} records");
            println!("database size: {size} bytes");
            ExitCode::SUCCESS
        }
        (Err(e), _) | (_, Err(e)) => {
            error!("{}: {:?}", DB_READ_ERROR_MESSAGE, e);
            ExitCode::FAILURE
        }
    }
}

/// Build the live orchestrator from the stored configuration. Logs and returns `None` if that is impossible.
async fn build_orchestrator(db: &AssistDb) -> Option<LiveOrchestrator> {
    let tokens = db
        .credentials()
        .await
        .inspect_err(|e| error!("{}: {:?}", DB_READ_ERROR_MESSAGE, e))
        .ok()?;
    let credentials = CredentialPool::new(tokens)
        .inspect_err(|e| error!("cannot start without an API key, add one with `credential add`: {}", e))
        .ok()?;
    let leaderboard_uri = db
        .leaderboard_uri()
        .await
        .inspect_err(|e| error!("{}: {:?}", DB_READ_ERROR_MESSAGE, e))
        .ok()?;
    if leaderboard_uri.is_none() {
        debug!("no leaderboard service configured");
    }
    let hypixel = HypixelClient::new(leaderboard_uri)
        .inspect_err(|e| error!("failed to build HTTP client: {:?}", e))
        .ok()?;
    let mojang = MojangClient::new()
        .inspect_err(|e| error!("failed to build HTTP client: {:?}", e))
        .ok()?;
    Some(Orchestrator::new(
        hypixel,
        mojang,
        credentials,
        db.clone(),
        Arc::new(SystemClock),
    ))
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
async fn lookup(orchestrator: &LiveOrchestrator, command: LookupCommand) -> ExitCode {
    let result: Result<String, FetchError> = match command {
        LookupCommand::Uuid { name } => orchestrator.resolve_id(&name).await.map(|id| id.hyphenated().to_string()),
        LookupCommand::Username { unique_id } => match Uuid::try_parse(unique_id.trim()) {
            Ok(unique_id) => orchestrator.resolve_name(unique_id).await,
            Err(_) => Err(FetchError::user_facing(format!("`{unique_id}` is not a valid uuid"))),
        },
        LookupCommand::Player { name } => orchestrator
            .player_by_name(&name)
            .await
            .map(|fetched| fetched.payload.to_string()),
        LookupCommand::Profile { name } => match orchestrator.resolve_id(&name).await {
            Ok(unique_id) => match orchestrator.select_profile(unique_id, last_save).await {
                Ok(Some(selected)) => Ok(selected.profile.payload.to_string()),
                Ok(None) => Err(FetchError::user_facing(format!("`{name}` has no SkyBlock profiles"))),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        },
        LookupCommand::Guild { name } => orchestrator
            .guild_by_name(&name)
            .await
            .map(|fetched| fetched.payload.to_string()),
    };
    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_jobs(orchestrator: LiveOrchestrator) -> ExitCode {
    info!(
        "starting {} {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        constants::GIT_COMMIT_HASH
    );

    let sweeper = orchestrator.clone();
    let result = Toplevel::new(async move |subsystem| {
        subsystem.start(SubsystemBuilder::new("memory sweep", move |handle| {
            sweep_subsystem(handle, sweeper)
        }));
        subsystem.start(SubsystemBuilder::new("db optimize", move |handle| {
            optimize_subsystem(handle, orchestrator)
        }));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(1000))
    .await;

    info!("shutting down now: {:?}", result);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn sweep_subsystem(subsystem: SubsystemHandle, orchestrator: LiveOrchestrator) -> Result<(), Error> {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = subsystem.on_shutdown_requested() => {
                info!("shutdown requested");
                return Ok(());
            },
            _ = interval.tick() => {
                if let Some(swept) = orchestrator.sweep() {
                    debug!("memory usage after sweeping {} entries: {:?}", swept, orchestrator.memory_usage());
                }
            }
        }
    }
}

async fn optimize_subsystem(subsystem: SubsystemHandle, orchestrator: LiveOrchestrator) -> Result<(), Error> {
    let mut interval = tokio::time::interval(OPTIMIZE_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick is immediate, and the schema setup already optimized
    interval.tick().await;
    loop {
        tokio::select! {
            _ = subsystem.on_shutdown_requested() => {
                return Ok(());
            },
            _ = interval.tick() => {
                match orchestrator.db().optimize().await {
                    Ok(()) => debug!("database optimized"),
                    Err(e) => warn!("database optimize failed: {:?}", e),
                }
            }
        }
    }
}
