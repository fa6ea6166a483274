//! Convenience-store datasets.
//!
//! `stores.csv` is the national company registry export. The rebuild job
//! keeps the rows located in the target city, classifies their brand,
//! geocodes their address and writes `stores_taipei.csv`, which is what the
//! server loads at startup.

use super::{strip_bom, write_atomic, DatasetError};
use crate::brand::{classify, Brand};
use crate::geocode::GeocodeResolver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// One row of the registry export. Unknown columns are ignored.
#[derive(Debug, Deserialize)]
struct SourceRow {
    #[serde(rename = "公司名稱", default)]
    company: String,
    #[serde(rename = "分公司名稱", default)]
    branch: String,
    #[serde(rename = "分公司地址", default)]
    address: String,
}

/// A store selected for geocoding.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCandidate {
    pub brand: Brand,
    pub name: String,
    pub address: String,
}

/// A geocoded store, as written to and read from the derived dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreRecord {
    pub brand: Brand,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildSummary {
    pub ok: bool,
    /// Stores written to the derived dataset.
    pub count: usize,
    /// Stores in the target city before geocoding.
    pub candidates: usize,
    pub built_at: Option<DateTime<Utc>>,
}

impl RebuildSummary {
    fn missing_source() -> Self {
        Self { ok: false, count: 0, candidates: 0, built_at: None }
    }
}

// ─── Selection ──────────────────────────────────────────────────

/// Read the registry export and keep the stores whose address mentions one of
/// `cities`.
pub fn select_candidates<R: Read>(reader: R, cities: &[String]) -> Result<Vec<StoreCandidate>, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut out = Vec::new();

    for result in rdr.deserialize::<SourceRow>() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "skipping malformed store row");
                continue;
            }
        };

        let address = row.address.trim();
        if !cities.iter().any(|city| address.contains(city.as_str())) {
            continue;
        }

        let company = row.company.trim();
        let name = match row.branch.trim() {
            "" => company,
            branch => branch,
        };

        out.push(StoreCandidate {
            brand: classify(company, name),
            name: name.to_string(),
            address: address.to_string(),
        });
    }

    Ok(out)
}

// ─── Rebuild ────────────────────────────────────────────────────

/// Regenerate the derived store dataset from the registry export.
///
/// Stores that cannot be geocoded are left out. At most `limit` candidates
/// are geocoded when a limit is given. A missing source file is not an
/// error: the summary comes back with `ok: false` and the derived file is
/// left untouched.
pub fn rebuild_stores(
    source: &Path,
    target: &Path,
    cities: &[String],
    limit: Option<usize>,
    resolver: &mut GeocodeResolver,
) -> Result<RebuildSummary, DatasetError> {
    let raw = match fs::read(source) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %source.display(), "store source dataset not found, cannot rebuild");
            return Ok(RebuildSummary::missing_source());
        }
        Err(e) => return Err(e.into()),
    };

    let candidates = select_candidates(strip_bom(&raw), cities)?;
    info!(candidates = candidates.len(), cities = ?cities, "selected stores in target cities");

    let take = limit.unwrap_or(candidates.len()).min(candidates.len());
    let mut records = Vec::with_capacity(take);
    for candidate in &candidates[..take] {
        match resolver.resolve(&candidate.address) {
            Some(c) => records.push(StoreRecord {
                brand: candidate.brand,
                name: candidate.name.clone(),
                address: candidate.address.clone(),
                lat: c.lat,
                lng: c.lng,
            }),
            None => debug!(address = %candidate.address, "store not geocoded, leaving it out"),
        }
    }

    write_stores(target, &records)?;
    info!(count = records.len(), path = %target.display(), "wrote derived store dataset");

    Ok(RebuildSummary {
        ok: true,
        count: records.len(),
        candidates: candidates.len(),
        built_at: Some(Utc::now()),
    })
}

fn write_stores(path: &Path, records: &[StoreRecord]) -> Result<(), DatasetError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    if records.is_empty() {
        wtr.write_record(["brand", "name", "address", "lat", "lng"])?;
    }
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| DatasetError::Io(e.into_error()))?;
    write_atomic(path, &bytes)
}

// ─── Load ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DerivedRow {
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    lat: String,
    #[serde(default)]
    lng: String,
}

/// Parse a derived store dataset. Rows without usable coordinates are
/// skipped; a missing or unknown brand is re-derived from the store name.
pub fn read_stores<R: Read>(reader: R) -> Result<Vec<StoreRecord>, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut stores = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.deserialize::<DerivedRow>() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "skipping malformed store row");
                skipped += 1;
                continue;
            }
        };

        let (Ok(lat), Ok(lng)) = (row.lat.trim().parse::<f64>(), row.lng.trim().parse::<f64>()) else {
            skipped += 1;
            continue;
        };
        if !lat.is_finite() || !lng.is_finite() {
            skipped += 1;
            continue;
        }

        let brand = row
            .brand
            .as_deref()
            .and_then(|b| b.parse::<Brand>().ok())
            .unwrap_or_else(|| classify(&row.name, ""));

        stores.push(StoreRecord {
            brand,
            name: row.name,
            address: row.address,
            lat,
            lng,
        });
    }

    if skipped > 0 {
        warn!(skipped, "skipped store rows without usable coordinates");
    }
    Ok(stores)
}

/// Load the derived store dataset. A missing file yields no stores.
pub fn load_stores(path: &Path) -> Result<Vec<StoreRecord>, DatasetError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "derived store dataset not found, serving no stores");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    let stores = read_stores(strip_bom(&raw))?;
    info!(count = stores.len(), path = %path.display(), "loaded stores");
    Ok(stores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::resolver::tests::FakeProvider;
    use crate::geocode::{Coordinate, GeocodeCache};
    use tempfile::TempDir;

    const SOURCE: &str = "\u{FEFF}公司名稱,分公司名稱,分公司地址,統一編號\n\
        統一超商股份有限公司,松高門市,台北市信義區松高路1號,1\n\
        全家便利商店股份有限公司,板橋門市,新北市板橋區文化路1號,2\n\
        全家便利商店股份有限公司,南京門市,臺北市中山區南京東路1號,3\n\
        萊爾富國際股份有限公司,,台北市大安區忠孝東路4段1號,4\n";

    fn cities() -> Vec<String> {
        vec!["台北市".to_string(), "臺北市".to_string()]
    }

    fn resolver(fake: &FakeProvider) -> GeocodeResolver {
        GeocodeResolver::new(GeocodeCache::in_memory(), Some(Box::new(fake.clone())))
    }

    #[test]
    fn test_select_candidates_filters_city() {
        let candidates = select_candidates(strip_bom(SOURCE.as_bytes()), &cities()).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].brand, Brand::SevenEleven);
        assert_eq!(candidates[0].name, "松高門市");
        assert_eq!(candidates[1].brand, Brand::FamilyMart);
        // Empty branch name falls back to the company name
        assert_eq!(candidates[2].name, "萊爾富國際股份有限公司");
        assert_eq!(candidates[2].brand, Brand::HiLife);
    }

    #[test]
    fn test_rebuild_skips_ungeocodable() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("stores.csv");
        let target = dir.path().join("stores_taipei.csv");
        fs::write(&source, SOURCE).unwrap();

        let fake = FakeProvider::default()
            .with("台北市信義區松高路1號", Ok(Some(Coordinate { lat: 25.039, lng: 121.567 })))
            .with("臺北市中山區南京東路1號", Ok(Some(Coordinate { lat: 25.052, lng: 121.520 })));
        let mut resolver = resolver(&fake);

        let summary = rebuild_stores(&source, &target, &cities(), None, &mut resolver).unwrap();
        assert!(summary.ok);
        assert_eq!(summary.candidates, 3);
        assert_eq!(summary.count, 2);
        assert!(summary.built_at.is_some());
        // The new-Taipei store is never looked up
        assert!(!fake.calls().iter().any(|a| a.contains("新北市")));

        let stores = load_stores(&target).unwrap();
        assert_eq!(stores.len(), 2);
        assert_eq!(stores[0].brand, Brand::SevenEleven);
        assert_eq!(stores[0].lat, 25.039);
    }

    #[test]
    fn test_rebuild_respects_limit() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("stores.csv");
        fs::write(&source, SOURCE).unwrap();

        let fake = FakeProvider::default();
        let mut resolver = resolver(&fake);
        let summary =
            rebuild_stores(&source, &dir.path().join("out.csv"), &cities(), Some(1), &mut resolver).unwrap();
        assert_eq!(summary.candidates, 3);
        assert_eq!(summary.count, 0);
        assert_eq!(fake.calls().len(), 1);
    }

    #[test]
    fn test_rebuild_missing_source() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("stores_taipei.csv");
        let mut resolver = resolver(&FakeProvider::default());

        let summary =
            rebuild_stores(&dir.path().join("stores.csv"), &target, &cities(), None, &mut resolver).unwrap();
        assert!(!summary.ok);
        assert!(summary.built_at.is_none());
        assert!(!target.exists());
    }

    #[test]
    fn test_read_stores_without_brand_column() {
        let data = "name,address,lat,lng\n全家南京門市,臺北市中山區,25.05,121.52\n";
        let stores = read_stores(data.as_bytes()).unwrap();
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].brand, Brand::FamilyMart);
    }

    #[test]
    fn test_read_stores_skips_bad_coordinates() {
        let data = "brand,name,address,lat,lng\n\
            7-ELEVEN,松高,台北市,25.03,121.56\n\
            全家,壞資料,台北市,north,121.5\n\
            全聯,空白,台北市,,\n";
        let stores = read_stores(data.as_bytes()).unwrap();
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].name, "松高");
    }

    #[test]
    fn test_load_stores_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(load_stores(&dir.path().join("nope.csv")).unwrap().is_empty());
    }
}
