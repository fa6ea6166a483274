//! Offline end-to-end run: seeded geocode cache -> store rebuild -> nearby
//! distances, plus a TWD97 heat-map layer.

use guardian_light::brand::{classify, Brand};
use guardian_light::dataset::{load_points, load_stores, rebuild_stores};
use guardian_light::distance::{distance_km, haversine_km};
use guardian_light::geocode::{GeocodeCache, GeocodeResolver, Resolution};
use guardian_light::grid::aggregate;
use guardian_light::twd97::wgs84_to_twd97;
use std::fs;
use tempfile::TempDir;

const CACHE: &str = r#"{
  "台北市信義區松高路1號": {"lat": 25.0390, "lng": 121.5670},
  "臺北市中山區南京東路1號": {"lat": 25.0520, "lng": 121.5200},
  "台北市大安區忠孝東路4段1號": null
}"#;

const STORES: &str = "公司名稱,分公司名稱,分公司地址\n\
    統一超商股份有限公司,松高門市,台北市信義區松高路1號\n\
    全家便利商店股份有限公司,南京門市,臺北市中山區南京東路1號\n\
    萊爾富國際股份有限公司,忠孝門市,台北市大安區忠孝東路4段1號\n\
    全聯實業股份有限公司,文化門市,新北市板橋區文化路1號\n";

#[test]
fn test_rebuild_from_seeded_cache() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("geocode_cache.json");
    fs::write(&cache_path, CACHE).unwrap();
    fs::write(dir.path().join("stores.csv"), STORES).unwrap();

    let mut resolver = GeocodeResolver::offline(GeocodeCache::load_from(cache_path));
    assert_eq!(
        resolver.resolve_detailed("台北市大安區忠孝東路4段1號"),
        Resolution::NotFound
    );

    let cities = vec!["台北市".to_string(), "臺北市".to_string()];
    let target = dir.path().join("stores_taipei.csv");
    let summary = rebuild_stores(&dir.path().join("stores.csv"), &target, &cities, None, &mut resolver).unwrap();
    assert!(summary.ok);
    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.count, 2);

    let stores = load_stores(&target).unwrap();
    let brands: Vec<Brand> = stores.iter().map(|s| s.brand).collect();
    assert_eq!(brands, vec![Brand::SevenEleven, Brand::FamilyMart]);

    // Taipei 101 is closer to Songgao than to Nanjing East Road
    let d: Vec<f64> = stores.iter().map(|s| haversine_km(25.0340, 121.5645, s.lat, s.lng)).collect();
    assert!(d[0] < 1.0);
    assert!(d[1] > d[0]);
}

#[test]
fn test_twd97_layer_to_heat_cells() {
    let dir = TempDir::new().unwrap();
    let mut csv = String::from("案件編號,座標X,座標Y\n");
    for (i, (lat, lng)) in [(25.0340, 121.5645), (25.03401, 121.56451), (25.0478, 121.5170)].iter().enumerate() {
        let (x, y) = wgs84_to_twd97(*lat, *lng);
        csv.push_str(&format!("{},{:.3},{:.3}\n", i, x, y));
    }
    let path = dir.path().join("accidents.csv");
    fs::write(&path, csv).unwrap();

    let points = load_points(&path).unwrap();
    assert_eq!(points.len(), 3);

    let cells = aggregate(&points, 200.0);
    assert_eq!(cells.len(), 2);
    let mut weights: Vec<f64> = cells.iter().map(|c| c.weight).collect();
    weights.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(weights, vec![0.5, 1.0]);
}

#[test]
fn test_core_sentinels() {
    assert_eq!(distance_km("25.0", "121.5", "25.0", "121.5"), 0.0);
    assert!(distance_km("north", "121.5", "25.0", "121.5").is_infinite());
    assert_eq!(classify("", ""), Brand::Other);
    assert_eq!(classify("統一超商", ""), Brand::SevenEleven);
}
