//! Process configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLICE_API_URL: &str =
    "https://data.taipei/api/v1/dataset/a90ae184-c39e-4242-b2d6-d7a0403c0632?scope=resourceAquire";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Everything the server and batch commands need at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub public_dir: PathBuf,
    pub data_dir: PathBuf,
    /// `None` when unset or empty; geocoding then runs cache-only.
    pub google_maps_api_key: Option<String>,
    /// Address substrings that select stores for the derived dataset.
    pub target_cities: Vec<String>,
    /// Cap on stores geocoded per rebuild; `None` = all.
    pub build_limit: Option<usize>,
    pub geocode_timeout: Duration,
    pub open_data_timeout: Duration,
    pub police_api_url: String,
    pub nearby_radius_km: f64,
    pub heat_cell_meters: f64,
    pub log_level: String,
}

impl AppConfig {
    /// Load `.env` (if any), then read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Read the process environment without touching `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, so tests never mutate the real
    /// environment. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&get, "PORT", 5001u16)?;

        let public_dir = PathBuf::from(get("GUARDIAN_PUBLIC_DIR").unwrap_or_else(|| "public".to_string()));
        let data_dir = get("GUARDIAN_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| public_dir.join("data"));

        let target_cities = match get("GUARDIAN_TARGET_CITIES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => vec!["台北市".to_string(), "臺北市".to_string()],
        };

        let build_limit = match get("GUARDIAN_BUILD_LIMIT") {
            Some(raw) => Some(parse_value::<usize>("GUARDIAN_BUILD_LIMIT", &raw)?),
            None => None,
        };

        let geocode_timeout = Duration::from_secs(parse_or(&get, "GUARDIAN_GEOCODE_TIMEOUT_SECS", 8u64)?);
        let open_data_timeout = Duration::from_secs(parse_or(&get, "GUARDIAN_OPEN_DATA_TIMEOUT_SECS", 10u64)?);

        let nearby_radius_km = parse_or(&get, "GUARDIAN_NEARBY_RADIUS_KM", 30.0f64)?;
        let heat_cell_meters = parse_or(&get, "GUARDIAN_HEAT_CELL_METERS", 200.0f64)?;
        if !(heat_cell_meters.is_finite() && heat_cell_meters > 0.0) {
            return Err(ConfigError::InvalidEnvVar {
                var: "GUARDIAN_HEAT_CELL_METERS".to_string(),
                reason: "must be a positive number of meters".to_string(),
            });
        }

        Ok(Self {
            host,
            port,
            public_dir,
            data_dir,
            google_maps_api_key: get("GOOGLE_MAPS_API_KEY"),
            target_cities,
            build_limit,
            geocode_timeout,
            open_data_timeout,
            police_api_url: get("GUARDIAN_POLICE_API_URL").unwrap_or_else(|| DEFAULT_POLICE_API_URL.to_string()),
            nearby_radius_km,
            heat_cell_meters,
            log_level: get("GUARDIAN_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    // ─── Derived paths ──────────────────────────────────────────

    /// Raw national retail dataset.
    pub fn stores_source_path(&self) -> PathBuf {
        self.data_dir.join("stores.csv")
    }

    /// Derived, geocoded store dataset for the target city.
    pub fn stores_derived_path(&self) -> PathBuf {
        self.data_dir.join("stores_taipei.csv")
    }

    pub fn geocode_cache_path(&self) -> PathBuf {
        self.data_dir.join("geocode_cache.json")
    }

    pub fn police_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("police.json")
    }

    pub fn layer_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T, G>(get: &G, var: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => parse_value(var, &raw),
        None => Ok(default),
    }
}
