use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::dataset::{load_stores, rebuild_stores, DatasetError, HeatLayer, RebuildSummary};
use crate::distance::haversine_km;
use crate::grid::{aggregate, HeatCell};

use super::state::AppState;

/// Brand label carried by police entries in nearby results.
const POLICE_LABEL: &str = "警察局";
/// Brand filter value meaning "every brand".
const ALL_BRANDS: &str = "全部";
const DEFAULT_LIMIT: usize = 10;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    warn!(error = %e, "request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{}", e))
}

// ─── GET / ───────────────────────────────────────────────────────

pub async fn index() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/nearby.html")]).into_response()
}

// ─── GET /api/nearby ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub brand: Option<String>,
    pub limit: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NearbyEntry {
    pub brand: String,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    /// Kilometers, rounded to two decimals.
    pub distance: f64,
}

enum NearbyKind {
    Store,
    Police,
}

fn parse_kind(s: Option<&str>) -> Result<NearbyKind, ApiError> {
    match s.map(str::trim) {
        None | Some("") | Some("store") => Ok(NearbyKind::Store),
        Some("police") => Ok(NearbyKind::Police),
        Some(other) => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Unknown type '{}'. Use 'store' or 'police'.", other),
        )),
    }
}

fn parse_limit(s: Option<&str>) -> Result<usize, ApiError> {
    match s.map(str::trim) {
        None | Some("") => Ok(DEFAULT_LIMIT),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| api_error(StatusCode::BAD_REQUEST, format!("Invalid limit '{}'", raw))),
    }
}

/// Parse the query origin. `None` makes every distance unknown.
fn parse_origin(lat: Option<&str>, lng: Option<&str>) -> Option<(f64, f64)> {
    let lat = lat?.trim().parse::<f64>().ok()?;
    let lng = lng?.trim().parse::<f64>().ok()?;
    (lat.is_finite() && lng.is_finite()).then_some((lat, lng))
}

fn round2(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

fn nearby_police(state: &AppState, lat: f64, lng: f64) -> Vec<NearbyEntry> {
    let mut resolver = state.lock_resolver();
    state
        .police
        .iter()
        .filter_map(|station| {
            let address = station.address()?;
            let c = resolver.resolve(address)?;
            Some(NearbyEntry {
                brand: POLICE_LABEL.to_string(),
                name: station.name.clone(),
                address: address.to_string(),
                lat: c.lat,
                lng: c.lng,
                distance: haversine_km(lat, lng, c.lat, c.lng),
            })
        })
        .collect()
}

fn nearby_stores(state: &AppState, lat: f64, lng: f64, brand: Option<&str>) -> Vec<NearbyEntry> {
    let brand = brand.map(str::trim).unwrap_or("");
    let everything = brand.is_empty() || brand == ALL_BRANDS;
    let radius = state.config.nearby_radius_km;

    state
        .read_stores()
        .iter()
        .filter(|s| everything || s.brand.label() == brand)
        .filter_map(|s| {
            let distance = haversine_km(lat, lng, s.lat, s.lng);
            (distance <= radius).then(|| NearbyEntry {
                brand: s.brand.label().to_string(),
                name: s.name.clone(),
                address: s.address.clone(),
                lat: s.lat,
                lng: s.lng,
                distance,
            })
        })
        .collect()
}

pub async fn nearby(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyEntry>>, ApiError> {
    let start = Instant::now();

    let kind = parse_kind(params.kind.as_deref())?;
    let limit = parse_limit(params.limit.as_deref())?;

    let Some((lat, lng)) = parse_origin(params.lat.as_deref(), params.lng.as_deref()) else {
        info!("GET /api/nearby without a usable origin -> 0 results");
        return Ok(Json(Vec::new()));
    };

    let mut results = match kind {
        NearbyKind::Police => {
            // Station addresses go through the geocoder, which blocks.
            let worker = Arc::clone(&state);
            tokio::task::spawn_blocking(move || nearby_police(&worker, lat, lng))
                .await
                .map_err(internal)?
        }
        NearbyKind::Store => nearby_stores(&state, lat, lng, params.brand.as_deref()),
    };

    results.retain(|r| r.distance.is_finite());
    for r in &mut results {
        r.distance = round2(r.distance);
    }
    results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    results.truncate(limit);

    info!(
        results = results.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/nearby"
    );

    Ok(Json(results))
}

// ─── GET /api/brands ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct BrandsResponse {
    pub brands: BTreeMap<&'static str, usize>,
    pub total: usize,
}

pub async fn brands(State(state): State<Arc<AppState>>) -> Json<BrandsResponse> {
    let stores = state.read_stores();
    let mut brands = BTreeMap::new();
    for store in stores.iter() {
        *brands.entry(store.brand.label()).or_insert(0) += 1;
    }
    Json(BrandsResponse {
        brands,
        total: stores.len(),
    })
}

// ─── GET /api/rebuild_stores ─────────────────────────────────────

#[derive(Serialize)]
pub struct RebuildResponse {
    pub ok: bool,
    pub result: RebuildSummary,
    pub loaded: usize,
}

pub async fn rebuild(State(state): State<Arc<AppState>>) -> Result<Json<RebuildResponse>, ApiError> {
    let start = Instant::now();

    let worker = Arc::clone(&state);
    let (result, loaded) = tokio::task::spawn_blocking(move || -> Result<(RebuildSummary, usize), DatasetError> {
        let config = &worker.config;
        let summary = {
            let mut resolver = worker.lock_resolver();
            rebuild_stores(
                &config.stores_source_path(),
                &config.stores_derived_path(),
                &config.target_cities,
                config.build_limit,
                &mut resolver,
            )?
        };
        let stores = load_stores(&config.stores_derived_path())?;
        Ok((summary, worker.replace_stores(stores)))
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;

    info!(
        count = result.count,
        loaded,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/rebuild_stores"
    );

    Ok(Json(RebuildResponse { ok: true, result, loaded }))
}

// ─── GET /api/config ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct ConfigResponse {
    #[serde(rename = "GOOGLE_MAPS_API_KEY")]
    pub google_maps_api_key: String,
}

pub async fn client_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        google_maps_api_key: state.config.google_maps_api_key.clone().unwrap_or_default(),
    })
}

// ─── GET /api/geocode ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct GeocodeQuery {
    pub address: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct GeocodeResponse {
    pub address: String,
    pub status: &'static str,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

pub async fn geocode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeocodeQuery>,
) -> Result<Json<GeocodeResponse>, ApiError> {
    let address = params.address.unwrap_or_default();
    if address.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing 'address' parameter"));
    }

    let worker = Arc::clone(&state);
    let lookup = address.clone();
    let resolution = tokio::task::spawn_blocking(move || worker.lock_resolver().resolve_detailed(&lookup))
        .await
        .map_err(internal)?;

    let coordinate = resolution.coordinate();
    Ok(Json(GeocodeResponse {
        address,
        status: resolution.status(),
        lat: coordinate.map(|c| c.lat),
        lng: coordinate.map(|c| c.lng),
    }))
}

// ─── GET /api/heatmap ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct HeatmapQuery {
    pub layer: Option<String>,
    pub cell: Option<f64>,
}

#[derive(Serialize)]
pub struct HeatmapResponse {
    pub layer: HeatLayer,
    pub cell_size_m: f64,
    pub points: usize,
    pub cells: Vec<HeatCell>,
}

pub async fn heatmap(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HeatmapQuery>,
) -> Result<Json<HeatmapResponse>, ApiError> {
    let layer: HeatLayer = params
        .layer
        .as_deref()
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing 'layer' parameter"))?
        .parse()
        .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;

    let cell_size_m = params.cell.unwrap_or(state.config.heat_cell_meters);
    if !cell_size_m.is_finite() || cell_size_m <= 0.0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid cell size '{}'. Use a positive number of meters.", cell_size_m),
        ));
    }

    let points = state.layers.get(&layer).map(Vec::as_slice).unwrap_or(&[]);
    let cells = aggregate(points, cell_size_m);

    Ok(Json(HeatmapResponse {
        layer,
        cell_size_m,
        points: points.len(),
        cells,
    }))
}
