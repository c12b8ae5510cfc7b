// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trip Planner command line client
//!
//! Loads stops from a CSV file, has the route service order them, saves the
//! trip and prints the route as GeoJSON. Logs go to stderr as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use trip_planner::{
    config::Config,
    models::{TransportMode, Vehicle},
    services::{
        CacheStore, CredentialStore, InMemoryHost, RenderSink, RouteView, TracingNotifier,
    },
    PlannerContext,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "trip-planner", about = "Plan, save and revisit routes over CSV stops.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a route over the stops in a CSV file and print it as GeoJSON.
    Route {
        csv: PathBuf,
        #[arg(long, default_value = "baseline")]
        mode: TransportMode,
        #[arg(long, default_value = "car")]
        vehicle: Vehicle,
        /// Trip name used when saving
        #[arg(long)]
        name: Option<String>,
    },
    /// Print saved trips as JSON.
    History,
    /// Log in and store the credential.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PLANNER_PASSWORD")]
        password: String,
    },
    Logout,
}

/// Keeps the last drawn route so it can be printed once the command ends.
#[derive(Default)]
struct LastRoute {
    view: Mutex<Option<RouteView>>,
}

impl RenderSink for LastRoute {
    fn draw(&self, view: &RouteView) {
        *self.view.lock().unwrap_or_else(|e| e.into_inner()) = Some(view.clone());
    }

    fn clear(&self) {
        *self.view.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(api = %config.api_url, environment = ?config.environment, "Starting Trip Planner");

    let credentials = CredentialStore::load(&config.credential_path)
        .context("Failed to read stored credential")?;
    let store = CacheStore::open(&config.cache_path).context("Failed to open offline cache")?;
    let renderer = Arc::new(LastRoute::default());

    let mut ctx = PlannerContext::with_cache(
        config,
        credentials,
        store,
        Arc::new(InMemoryHost::new()),
        Arc::new(TracingNotifier),
        renderer.clone(),
    )?;

    if let Err(e) = ctx.prepare_offline().await {
        tracing::warn!(error = %e, "Offline cache not ready, continuing online");
    }

    let result = run(&mut ctx, cli.command, &renderer).await;

    if let Some(agent) = &ctx.cache {
        agent.shutdown().await;
    }
    result
}

async fn run(ctx: &mut PlannerContext, command: Command, renderer: &LastRoute) -> anyhow::Result<()> {
    match command {
        Command::Route {
            csv,
            mode,
            vehicle,
            name,
        } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("Failed to open {}", csv.display()))?;
            ctx.trips.load_csv(file)?;
            if let Some(name) = name {
                ctx.trips.rename(name);
            }
            ctx.trips.build_route(mode, vehicle).await?;

            if ctx.api.credentials().is_authenticated() {
                let entry = ctx.trips.save().await?;
                tracing::info!(id = ?entry.id(), name = entry.name(), "Trip stored");
            } else {
                tracing::info!("No stored credential, trip not saved");
            }

            let view = renderer.view.lock().unwrap_or_else(|e| e.into_inner()).clone();
            if let Some(view) = view {
                println!("{}", view.to_geojson());
            }
        }
        Command::History => {
            let entries = ctx.history.list().await?;
            println!("{}", serde_json::to_string_pretty(entries)?);
        }
        Command::Login { email, password } => {
            ctx.auth.login(&email, &password).await?;
        }
        Command::Logout => {
            ctx.auth.logout().await?;
        }
    }
    Ok(())
}

/// Initialize structured JSON logging on stderr.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true)
        .with_writer(std::io::stderr);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trip_planner=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
