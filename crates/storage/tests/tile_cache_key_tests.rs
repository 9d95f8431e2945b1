//! Tests for TileCacheKey canonicalisation and source change detection.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use storage::{TileCache, TileCacheKey};
use test_utils::{reference_time, TempDataFile, TestDataset, TestLayer};
use wms_common::{BoundingBox, CrsCode, DataTile, RegularGrid, WmsError};

fn std_hash(key: &TileCacheKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

fn layer_for(location: &str) -> TestLayer {
    TestLayer::new("roms/temp", TestDataset::new("roms", location))
}

fn grid(crs: &str, bbox: [f64; 4]) -> RegularGrid {
    RegularGrid::new(
        CrsCode::from_wms_string(crs).unwrap(),
        BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
        256,
        256,
    )
}

// ============================================================================
// Canonicalisation
// ============================================================================

#[test]
fn test_wrapped_longitudes_collide() {
    let path = "/nonexistent/roms.nc";
    let layer = layer_for(path);
    let a = TileCacheKey::new(path, &layer, &grid("EPSG:4326", [-180.0, -90.0, 180.0, 90.0]), Some(0), None)
        .unwrap();
    let b = TileCacheKey::new(path, &layer, &grid("EPSG:4326", [180.0, -90.0, 540.0, 90.0]), Some(0), None)
        .unwrap();

    assert_eq!(a, b);
    assert_eq!(std_hash(&a), std_hash(&b));
    assert_eq!(a.to_string(), b.to_string());
}

#[test]
fn test_equivalent_crs_codes_collide() {
    let path = "/nonexistent/roms.nc";
    let layer = layer_for(path);
    let bbox = [-10.0, 40.0, 5.0, 55.0];
    let a = TileCacheKey::new(path, &layer, &grid("EPSG:4326", bbox), None, None).unwrap();
    let b = TileCacheKey::new(path, &layer, &grid("CRS:84", bbox), None, None).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.crs_code(), "CRS:84");
    assert_eq!(std_hash(&a), std_hash(&b));
}

#[test]
fn test_projected_crs_is_not_wrapped() {
    let path = "/nonexistent/roms.nc";
    let layer = layer_for(path);
    let a = TileCacheKey::new(path, &layer, &grid("EPSG:3857", [0.0, 0.0, 400.0, 100.0]), None, None)
        .unwrap();
    let b = TileCacheKey::new(path, &layer, &grid("EPSG:900913", [0.0, 0.0, 400.0, 100.0]), None, None)
        .unwrap();

    assert_eq!(a.bbox(), [0.0, 0.0, 400.0, 100.0]);
    assert_eq!(a, b);
}

#[test]
fn test_each_field_distinguishes_keys() {
    let path = "/nonexistent/roms.nc";
    let layer = layer_for(path);
    let g = grid("EPSG:4326", [0.0, 0.0, 10.0, 10.0]);
    let base = TileCacheKey::new(path, &layer, &g, Some(1), Some(2)).unwrap();

    let other_layer = TestLayer::new("roms/salt", TestDataset::new("roms", path));
    let mut smaller = g.clone();
    smaller.width = 128;

    let variants = [
        TileCacheKey::new(path, &other_layer, &g, Some(1), Some(2)).unwrap(),
        TileCacheKey::new(path, &layer, &smaller, Some(1), Some(2)).unwrap(),
        TileCacheKey::new(path, &layer, &grid("EPSG:4326", [0.0, 0.0, 10.0, 11.0]), Some(1), Some(2))
            .unwrap(),
        TileCacheKey::new("/nonexistent/other.nc", &layer, &g, Some(1), Some(2)).unwrap(),
        TileCacheKey::new(path, &layer, &g, Some(0), Some(2)).unwrap(),
        TileCacheKey::new(path, &layer, &g, Some(1), None).unwrap(),
    ];
    for variant in &variants {
        assert_ne!(&base, variant, "{} vs {}", base, variant);
        assert_ne!(base.to_string(), variant.to_string());
    }
}

// ============================================================================
// Source change detection
// ============================================================================

#[test]
fn test_modification_time_changes_key() {
    let file = TempDataFile::new("roms_his.nc", b"CDF\x01 some bytes").unwrap();
    let path = file.path_str();
    let layer = layer_for(&path);
    let g = grid("EPSG:4326", [-10.0, 40.0, 5.0, 55.0]);

    file.set_modified_secs(1_600_000_000).unwrap();
    let before = TileCacheKey::new(&path, &layer, &g, Some(3), None).unwrap();
    let again = TileCacheKey::new(&path, &layer, &g, Some(3), None).unwrap();
    assert_eq!(before, again);
    assert_eq!(before.last_modified(), 1_600_000_000_000);
    assert_eq!(before.file_size(), 15);

    file.set_modified_secs(1_600_000_060).unwrap();
    let after = TileCacheKey::new(&path, &layer, &g, Some(3), None).unwrap();
    assert_ne!(before, after);
    assert_ne!(std_hash(&before), std_hash(&after));
}

#[test]
fn test_directory_is_invalid_location() {
    let file = TempDataFile::new("roms_his.nc", b"CDF").unwrap();
    let dir = file.dir_str();
    let layer = layer_for(&dir);

    let err = TileCacheKey::new(&dir, &layer, &grid("EPSG:4326", [0.0, 0.0, 1.0, 1.0]), None, None)
        .unwrap_err();
    assert!(matches!(err, WmsError::InvalidDataLocation(ref p) if *p == dir));
    assert!(err.to_string().contains("exists but is not a valid file"));
}

#[test]
fn test_path_below_regular_file_has_zero_stamp() {
    let file = TempDataFile::new("roms_his.nc", b"CDF").unwrap();
    let path = format!("{}/child.nc", file.path_str());

    let key = TileCacheKey::new(&path, &layer_for(&path), &grid("EPSG:4326", [0.0, 0.0, 1.0, 1.0]), None, None)
        .unwrap();
    assert_eq!(key.last_modified(), 0);
    assert_eq!(key.file_size(), 0);
    assert_eq!(key.dataset_last_modified(), 0);
}

#[test]
fn test_remote_dataset_uses_reload_time() {
    let url = "https://example.org/thredds/dodsC/roms";
    let g = grid("EPSG:4326", [0.0, 0.0, 1.0, 1.0]);

    let layer = layer_for(url);
    let first = TileCacheKey::new(url, &layer, &g, Some(0), None).unwrap();
    assert_eq!(first.last_modified(), 0);
    assert_eq!(first.dataset_last_modified(), reference_time().timestamp_millis());

    let reloaded = TestLayer::new(
        "roms/temp",
        TestDataset::new("roms", url).with_last_update(reference_time() + chrono::Duration::minutes(5)),
    );
    let second = TileCacheKey::new(url, &reloaded, &g, Some(0), None).unwrap();
    assert_ne!(first, second);
}

#[test]
fn test_local_ncml_records_both_stamps() {
    let file = TempDataFile::new("aggregation.ncml", b"<netcdf/>").unwrap();
    let path = file.path_str();
    file.set_modified_secs(1_650_000_000).unwrap();

    let key = TileCacheKey::new(&path, &layer_for(&path), &grid("EPSG:4326", [0.0, 0.0, 1.0, 1.0]), None, None)
        .unwrap();
    assert_eq!(key.last_modified(), 1_650_000_000_000);
    assert_eq!(key.file_size(), 9);
    assert_eq!(key.dataset_last_modified(), reference_time().timestamp_millis());
}

// ============================================================================
// Round trip through the cache
// ============================================================================

#[tokio::test]
async fn test_put_then_get_with_rebuilt_key() {
    let cache = TileCache::with_limits(100, 16 * 1024 * 1024, Duration::from_secs(60));
    let path = "/nonexistent/roms.nc";
    let layer = layer_for(path);

    let tile = Arc::new(DataTile::from_samples(
        2,
        2,
        vec![Some(1.0), None, Some(-3.5), Some(0.25)],
    ));
    let key = TileCacheKey::new(path, &layer, &grid("CRS:84", [-180.0, -90.0, 180.0, 90.0]), Some(0), None)
        .unwrap();
    assert!(cache.put(key, Arc::clone(&tile)).await);

    // Equivalent request spelled differently
    let lookup = TileCacheKey::new(path, &layer, &grid("EPSG:4326", [180.0, -90.0, 540.0, 90.0]), Some(0), None)
        .unwrap();
    let cached = cache.get(&lookup).await.unwrap();
    assert_eq!(*cached, *tile);
    assert_eq!(cached.get(1), None);
}
