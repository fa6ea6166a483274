use crate::config::AppConfig;
use crate::dataset::{load_points, load_police, load_stores, HeatLayer, PoliceStation, StoreRecord};
use crate::geocode::GeocodeResolver;
use crate::grid::WeightedPoint;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use tracing::warn;

pub struct AppState {
    pub config: AppConfig,
    /// Held for a whole resolution so one address is never looked up twice.
    pub resolver: Mutex<GeocodeResolver>,
    /// Swapped wholesale after a rebuild.
    pub stores: RwLock<Vec<StoreRecord>>,
    pub police: Vec<PoliceStation>,
    pub layers: HashMap<HeatLayer, Vec<WeightedPoint>>,
}

impl AppState {
    pub fn new(config: AppConfig, resolver: GeocodeResolver) -> Self {
        Self {
            config,
            resolver: Mutex::new(resolver),
            stores: RwLock::new(Vec::new()),
            police: Vec::new(),
            layers: HashMap::new(),
        }
    }

    /// Load every dataset the server needs. Blocking: fetches police stations
    /// over HTTP and reads files.
    pub fn load(config: AppConfig, resolver: GeocodeResolver) -> Self {
        let police = load_police(&config.police_api_url, config.open_data_timeout, &config.police_snapshot_path());

        let stores = load_stores(&config.stores_derived_path()).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load derived store dataset, serving no stores");
            Vec::new()
        });

        let mut layers = HashMap::new();
        for layer in HeatLayer::ALL {
            let points = load_points(&config.layer_path(layer.file_name())).unwrap_or_else(|e| {
                warn!(layer = %layer, error = %e, "failed to load heat-map layer, using an empty layer");
                Vec::new()
            });
            layers.insert(layer, points);
        }

        Self {
            police,
            layers,
            stores: RwLock::new(stores),
            ..Self::new(config, resolver)
        }
    }

    pub fn lock_resolver(&self) -> MutexGuard<'_, GeocodeResolver> {
        self.resolver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read_stores(&self) -> RwLockReadGuard<'_, Vec<StoreRecord>> {
        self.stores.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn replace_stores(&self, stores: Vec<StoreRecord>) -> usize {
        let mut guard = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        *guard = stores;
        guard.len()
    }
}
