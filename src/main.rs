use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use guardian_light::config::AppConfig;
use guardian_light::dataset::{load_points, rebuild_stores, HeatLayer};
use guardian_light::geocode::{GeocodeCache, GeocodeProvider, GeocodeResolver, GoogleGeocoder};
use guardian_light::grid::aggregate;
use guardian_light::server::{self, AppState};

/// Guardian Light: nearby stores, police stations and safety heat maps for Taipei.
///
/// Configuration comes from the environment (and `.env`); the flags below
/// override it.
///
/// Examples:
///   guardian
///   guardian serve --port 8080
///   guardian rebuild-stores
///   guardian geocode "台北市信義區松高路1號"
///   guardian heatmap accidents --cell 300
#[derive(Parser)]
#[command(name = "guardian", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Bind host (overrides HOST).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Bind port (overrides PORT).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Dataset and cache directory (overrides GUARDIAN_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Offline mode: only answer geocoding from the cache.
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API and static files (default).
    Serve,
    /// Regenerate the geocoded store dataset for the target cities.
    RebuildStores,
    /// Resolve one address through the cache and provider.
    Geocode {
        address: String,
    },
    /// Aggregate a heat-map layer and print its cells.
    Heatmap {
        /// accidents or streetlights
        #[arg(value_parser = parse_layer)]
        layer: HeatLayer,

        /// Cell size in meters (defaults to GUARDIAN_HEAT_CELL_METERS).
        #[arg(long)]
        cell: Option<f64>,
    },
}

fn parse_layer(s: &str) -> Result<HeatLayer, String> {
    s.parse()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(host) = cli.host.clone() {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut resolver = build_resolver(&config, cli.offline);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            // Dataset loading blocks on the open-data fetch; do it before the runtime starts.
            let state = Arc::new(AppState::load(config, resolver));
            let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
            runtime.block_on(server::start(state)).context("server error")?;
        }

        Command::RebuildStores => {
            let summary = rebuild_stores(
                &config.stores_source_path(),
                &config.stores_derived_path(),
                &config.target_cities,
                config.build_limit,
                &mut resolver,
            )?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.ok {
                bail!("store source dataset not found at {}", config.stores_source_path().display());
            }
        }

        Command::Geocode { address } => {
            let resolution = resolver.resolve_detailed(&address);
            let coordinate = resolution.coordinate();
            let out = serde_json::json!({
                "address": address,
                "status": resolution.status(),
                "lat": coordinate.map(|c| c.lat),
                "lng": coordinate.map(|c| c.lng),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::Heatmap { layer, cell } => {
            let cell_size_m = cell.unwrap_or(config.heat_cell_meters);
            if !cell_size_m.is_finite() || cell_size_m <= 0.0 {
                bail!("invalid cell size '{}': use a positive number of meters", cell_size_m);
            }
            let path = config.layer_path(layer.file_name());
            let points = load_points(&path).with_context(|| format!("failed to read {}", path.display()))?;
            let cells = aggregate(&points, cell_size_m);
            let out = serde_json::json!({
                "layer": layer,
                "cell_size_m": cell_size_m,
                "points": points.len(),
                "cells": cells,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}

/// Cache-backed resolver; the Google provider is attached only when a key
/// is configured and offline mode is off.
fn build_resolver(config: &AppConfig, offline: bool) -> GeocodeResolver {
    let cache = GeocodeCache::load_from(config.geocode_cache_path());
    let provider = match (&config.google_maps_api_key, offline) {
        (Some(key), false) => {
            Some(Box::new(GoogleGeocoder::new(key.clone(), config.geocode_timeout)) as Box<dyn GeocodeProvider>)
        }
        _ => None,
    };
    GeocodeResolver::new(cache, provider)
}
