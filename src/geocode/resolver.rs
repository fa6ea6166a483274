//! Geocode resolver: orchestrates the lookup chain.
//!
//! Flow:  empty check → cache → (no credential: give up, uncached)
//!        → provider(original) → provider(simplified) → cache + flush

use super::cache::GeocodeCache;
use super::provider::GeocodeProvider;
use super::types::{Coordinate, Resolution};
use crate::normalize::clean_for_retry;
use tracing::{debug, warn};

/// Address resolver with its cache and optional provider.
///
/// Not internally synchronized: share it behind a `Mutex` so that cache reads,
/// provider calls and flushes for one address never interleave.
pub struct GeocodeResolver {
    cache: GeocodeCache,
    provider: Option<Box<dyn GeocodeProvider>>,
}

impl GeocodeResolver {
    /// `provider` is `None` when no geocoding credential is configured.
    pub fn new(cache: GeocodeCache, provider: Option<Box<dyn GeocodeProvider>>) -> Self {
        Self { cache, provider }
    }

    /// A resolver that can only answer from its cache.
    pub fn offline(cache: GeocodeCache) -> Self {
        Self::new(cache, None)
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    /// Resolve an address, folding every failure into `None`.
    pub fn resolve(&mut self, address: &str) -> Option<Coordinate> {
        self.resolve_detailed(address).coordinate()
    }

    /// Resolve an address and report why it failed, if it did.
    pub fn resolve_detailed(&mut self, address: &str) -> Resolution {
        // 1. Nothing to look up
        if address.trim().is_empty() {
            return Resolution::NotFound;
        }

        // 2. Cache, by exact original text. Cached failures are final.
        if let Some(hit) = self.cache.get(address) {
            debug!(address, status = hit.status(), "geocode cache hit");
            return hit;
        }

        // 3. No credential: leave it uncached so it can be retried later
        let Some(provider) = self.provider.as_deref() else {
            warn!(address, "no geocoding credential configured, skipping lookup");
            return Resolution::ServiceUnavailable;
        };

        // 4-5. Original address, then the simplified one if it differs
        let mut outcome = attempt(provider, address);
        if !matches!(outcome, Resolution::Resolved(_)) {
            let simplified = clean_for_retry(address);
            if !simplified.is_empty() && simplified != address {
                debug!(address, simplified = %simplified, "retrying with simplified address");
                outcome = match (outcome, attempt(provider, &simplified)) {
                    (_, resolved @ Resolution::Resolved(_)) => resolved,
                    (Resolution::ServiceUnavailable, _) | (_, Resolution::ServiceUnavailable) => {
                        Resolution::ServiceUnavailable
                    }
                    _ => Resolution::NotFound,
                };
            }
        }

        // 6. Remember the outcome under the original text, success or not
        if let Err(e) = self.cache.put(address, outcome.coordinate()) {
            warn!(address, error = %e, "failed to persist geocode cache");
        }

        outcome
    }
}

fn attempt(provider: &dyn GeocodeProvider, query: &str) -> Resolution {
    match provider.lookup(query) {
        Ok(Some(c)) => {
            debug!(query, coordinate = %c, "geocoded");
            Resolution::Resolved(c)
        }
        Ok(None) => Resolution::NotFound,
        Err(e) => {
            warn!(query, error = %e, "geocode lookup failed");
            Resolution::ServiceUnavailable
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geocode::GeocodeError;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Scripted provider that records every query it receives.
    #[derive(Clone, Default)]
    pub(crate) struct FakeProvider {
        pub answers: HashMap<String, Result<Option<Coordinate>, String>>,
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeProvider {
        pub fn with(mut self, query: &str, answer: Result<Option<Coordinate>, &str>) -> Self {
            self.answers.insert(query.to_string(), answer.map_err(str::to_string));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl GeocodeProvider for FakeProvider {
        fn lookup(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError> {
            self.calls.lock().unwrap().push(address.to_string());
            match self.answers.get(address) {
                Some(Ok(c)) => Ok(*c),
                Some(Err(msg)) => Err(GeocodeError::Network(msg.clone())),
                None => Ok(None),
            }
        }
    }

    const SONGGAO: &str = "台北市信義區松高路1號";
    const SONGGAO_B1: &str = "台北市信義區松高路1號B1";

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    fn resolver_with(fake: &FakeProvider) -> (GeocodeResolver, TempDir) {
        let dir = TempDir::new().unwrap();
        let cache = GeocodeCache::load_from(dir.path().join("geocode_cache.json"));
        (GeocodeResolver::new(cache, Some(Box::new(fake.clone()))), dir)
    }

    #[test]
    fn test_empty_address() {
        let fake = FakeProvider::default();
        let (mut resolver, _dir) = resolver_with(&fake);
        assert_eq!(resolver.resolve_detailed(""), Resolution::NotFound);
        assert_eq!(resolver.resolve_detailed("   "), Resolution::NotFound);
        assert!(fake.calls().is_empty());
        assert!(resolver.cache().is_empty());
    }

    #[test]
    fn test_seeded_cache_resolves_offline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("geocode_cache.json");
        std::fs::write(&path, r#"{"台北市信義區松高路1號": {"lat":25.03,"lng":121.57}}"#).unwrap();

        let mut resolver = GeocodeResolver::offline(GeocodeCache::load_from(path));
        assert_eq!(resolver.resolve(SONGGAO), Some(c(25.03, 121.57)));
    }

    #[test]
    fn test_warm_cache_skips_provider() {
        let fake = FakeProvider::default().with(SONGGAO, Ok(Some(c(25.039, 121.567))));
        let (mut resolver, _dir) = resolver_with(&fake);

        let first = resolver.resolve(SONGGAO);
        let second = resolver.resolve(SONGGAO);
        assert_eq!(first, Some(c(25.039, 121.567)));
        assert_eq!(first, second);
        assert_eq!(fake.calls(), vec![SONGGAO.to_string()]);
    }

    #[test]
    fn test_cached_failure_is_not_retried() {
        let fake = FakeProvider::default();
        let (mut resolver, _dir) = resolver_with(&fake);

        assert_eq!(resolver.resolve_detailed(SONGGAO), Resolution::NotFound);
        assert_eq!(resolver.resolve_detailed(SONGGAO), Resolution::NotFound);
        assert_eq!(fake.calls().len(), 1);
    }

    #[test]
    fn test_retry_with_simplified_address() {
        let fake = FakeProvider::default().with(SONGGAO, Ok(Some(c(25.039, 121.567))));
        let (mut resolver, _dir) = resolver_with(&fake);

        assert_eq!(resolver.resolve(SONGGAO_B1), Some(c(25.039, 121.567)));
        assert_eq!(fake.calls(), vec![SONGGAO_B1.to_string(), SONGGAO.to_string()]);
        // Cached under the original text only
        assert!(resolver.cache().get(SONGGAO_B1).is_some());
        assert!(resolver.cache().get(SONGGAO).is_none());
    }

    #[test]
    fn test_retry_after_transport_error() {
        let fake = FakeProvider::default()
            .with(SONGGAO_B1, Err("timed out"))
            .with(SONGGAO, Ok(Some(c(25.039, 121.567))));
        let (mut resolver, _dir) = resolver_with(&fake);

        assert_eq!(resolver.resolve_detailed(SONGGAO_B1), Resolution::Resolved(c(25.039, 121.567)));
        assert_eq!(fake.calls().len(), 2);
    }

    #[test]
    fn test_no_retry_when_simplified_is_identical() {
        let fake = FakeProvider::default();
        let (mut resolver, _dir) = resolver_with(&fake);

        resolver.resolve(SONGGAO);
        assert_eq!(fake.calls(), vec![SONGGAO.to_string()]);
    }

    #[test]
    fn test_transport_failure_is_cached_as_failure() {
        let fake = FakeProvider::default()
            .with(SONGGAO_B1, Err("connection reset"))
            .with(SONGGAO, Err("connection reset"));
        let (mut resolver, _dir) = resolver_with(&fake);

        assert_eq!(resolver.resolve_detailed(SONGGAO_B1), Resolution::ServiceUnavailable);
        // Second call hits the cached failure marker
        assert_eq!(resolver.resolve_detailed(SONGGAO_B1), Resolution::NotFound);
        assert_eq!(fake.calls().len(), 2);
    }

    #[test]
    fn test_missing_credential_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = GeocodeCache::load_from(dir.path().join("geocode_cache.json"));
        let mut resolver = GeocodeResolver::offline(cache);

        assert_eq!(resolver.resolve_detailed(SONGGAO), Resolution::ServiceUnavailable);
        assert!(resolver.resolve(SONGGAO).is_none());
        assert!(resolver.cache().is_empty());
        assert!(!resolver.has_provider());
    }

    #[test]
    fn test_result_persisted_before_return() {
        let fake = FakeProvider::default().with(SONGGAO, Ok(Some(c(25.039, 121.567))));
        let (mut resolver, dir) = resolver_with(&fake);
        resolver.resolve(SONGGAO);

        let reloaded = GeocodeCache::load_from(dir.path().join("geocode_cache.json"));
        assert_eq!(reloaded.get(SONGGAO), Some(Resolution::Resolved(c(25.039, 121.567))));
    }

    #[test]
    fn test_unwritable_cache_still_resolves() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let cache = GeocodeCache::load_from(blocker.join("geocode_cache.json"));

        let fake = FakeProvider::default().with(SONGGAO, Ok(Some(c(25.039, 121.567))));
        let mut resolver = GeocodeResolver::new(cache, Some(Box::new(fake.clone())));

        assert_eq!(resolver.resolve(SONGGAO), Some(c(25.039, 121.567)));
        // Served from memory the second time
        assert_eq!(resolver.resolve(SONGGAO), Some(c(25.039, 121.567)));
        assert_eq!(fake.calls().len(), 1);
    }
}
