use clap::Parser;
use gridiron::api::{create_router, AppState};
use gridiron::cli::{Cli, Commands};
use gridiron::config::AppConfig;
use gridiron::domain::BootstrapDecision;
use gridiron::error::{GridironError, Result};
use gridiron::etl::{EtlMode, EtlOrchestrator};
use gridiron::model::ModelBundle;
use gridiron::predict::PredictionEngine;
use gridiron::services;
use gridiron::store::{DataSnapshot, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    if let Err(errors) = config.validate() {
        return Err(GridironError::Validation(errors.join("; ")));
    }
    init_logging(&config);

    match cli.command {
        Some(Commands::Etl { import }) => run_etl_once(config, import).await,
        Some(Commands::Predict { player_id, week }) => {
            run_predict(config, &player_id, week).await
        }
        Some(Commands::Serve { port }) => run_serve(config, port).await,
        None => run_serve(config, None).await,
    }
}

async fn run_serve(config: AppConfig, port_override: Option<u16>) -> Result<()> {
    let config = Arc::new(config);
    let store = Arc::new(Store::new(&config.database.url, config.database.max_connections).await?);
    store.ensure_base_schema().await?;

    let models = Arc::new(ModelBundle::load_dir(&config.prediction.model_dir)?);

    // Resolved exactly once: an empty store blocks serving behind a
    // synchronous bootstrap run, a populated one refreshes in background.
    let populated = store.weekly_stats_populated(config.etl.season).await?;
    let decision = BootstrapDecision::resolve(populated, config.etl.bootstrap_sync);
    info!(?decision, populated, "Startup bootstrap decision");

    if decision.blocks_serving() {
        info!("Store is empty; running bootstrap ETL before serving");
        let orchestrator = EtlOrchestrator::new(
            Arc::clone(&store),
            config.etl.clone(),
            config.prediction.rolling_window,
        );
        let report = orchestrator.run(EtlMode::Full).await?;
        if !report.succeeded() {
            warn!(state = %report.state, "Bootstrap ETL did not complete; serving whatever loaded");
        }
    }

    let snapshot = DataSnapshot::build(&store, config.etl.season).await?;
    let state = AppState::new(
        Arc::clone(&store),
        snapshot,
        Arc::clone(&models),
        Arc::clone(&config),
    );

    if !decision.blocks_serving() {
        let bg = state.clone();
        tokio::spawn(async move {
            if let Err(e) = services::run_etl_and_refresh(&bg, EtlMode::Full).await {
                warn!(error = %e, "Background startup ETL failed");
            }
        });
    }

    services::spawn_daily_etl(state.clone());

    let port = port_override.unwrap_or(config.serving.port);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Serving predictions");

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

async fn run_etl_once(config: AppConfig, import: Option<PathBuf>) -> Result<()> {
    let store = Arc::new(Store::new(&config.database.url, config.database.max_connections).await?);
    store.ensure_base_schema().await?;

    let mode = match import {
        Some(dir) => EtlMode::Import(dir),
        None => EtlMode::Full,
    };
    let orchestrator = EtlOrchestrator::new(
        Arc::clone(&store),
        config.etl.clone(),
        config.prediction.rolling_window,
    );
    let report = orchestrator.run(mode).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.state == gridiron::domain::EtlRunState::Failed {
        return Err(GridironError::Internal(
            "ETL run failed; see step reports".to_string(),
        ));
    }
    Ok(())
}

async fn run_predict(config: AppConfig, player_id: &str, week: Option<i32>) -> Result<()> {
    let store = Store::new(&config.database.url, config.database.max_connections).await?;
    let snapshot = DataSnapshot::build(&store, config.etl.season).await?;
    let models = ModelBundle::load_dir(&config.prediction.model_dir)?;

    let week = week.unwrap_or_else(|| snapshot.last_stat_week() + 1);
    let engine = PredictionEngine::new(&snapshot, &models, &config.prediction);
    let prediction = engine.predict(player_id, week)?;

    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
