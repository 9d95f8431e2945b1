//! Nearest-grid-point tests on synthetic curvilinear grids.

use std::sync::Arc;

use projection::{
    CurvilinearGrid, GridCoordinates, HorizontalPosition, LonLat, LookUpTableGrid, LutGridCache,
    ProjectionError,
};
use test_utils::{interior_indices, RotatedGrid};
use wms_common::CrsCode;

fn build(synthetic: &RotatedGrid) -> LookUpTableGrid {
    let grid = CurvilinearGrid::new(synthetic.coordinates()).unwrap();
    LookUpTableGrid::build(grid, 3.0).unwrap()
}

fn to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    const R: f64 = 6378137.0;
    let x = R * lon.to_radians();
    let y = R * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[test]
fn test_rotated_4x4_grid() {
    let synthetic = RotatedGrid::new(4, 4).with_rotation(15.0);
    let lut_grid = build(&synthetic);

    let (lon, lat) = synthetic.position(2.0, 2.0);
    let found = lut_grid
        .find_nearest_grid_point(&HorizontalPosition::lon_lat(lon, lat))
        .unwrap();
    assert_eq!(found, Some(GridCoordinates::new(2, 2)));

    let far = lut_grid
        .find_nearest_grid_point(&HorizontalPosition::lon_lat(100.0, 60.0))
        .unwrap();
    assert_eq!(far, None);
}

// ============================================================================
// Correctness on interior points
// ============================================================================

#[test]
fn test_interior_points_resolve_to_containing_cell() {
    let synthetic = RotatedGrid::new(20, 15)
        .with_origin(-10.0, 40.0)
        .with_spacing(0.5)
        .with_rotation(25.0);
    let lut_grid = build(&synthetic);

    for (fi, fj) in interior_indices(synthetic.ni, synthetic.nj, 3, 0.02) {
        let (lon, lat) = synthetic.position(fi, fj);
        let point = LonLat::new(lon, lat);
        let found = lut_grid
            .find_nearest_lon_lat(point)
            .unwrap_or_else(|| panic!("no cell for index ({}, {})", fi, fj));

        let cell = lut_grid.grid().cell(found.i, found.j).unwrap();
        assert!(cell.contains(&point), "({}, {}) not in {:?}", fi, fj, found);
        assert_eq!(
            Some((found.i, found.j)),
            synthetic.cell_containing(lon, lat),
            "index ({}, {})",
            fi,
            fj
        );
    }
}

#[test]
fn test_point_on_shared_edge() {
    let synthetic = RotatedGrid::new(6, 6).with_rotation(15.0);
    let lut_grid = build(&synthetic);

    let (lon, lat) = synthetic.position(2.5, 3.0);
    let found = lut_grid.find_nearest_lon_lat(LonLat::new(lon, lat)).unwrap();
    assert!(
        [GridCoordinates::new(2, 3), GridCoordinates::new(3, 3)].contains(&found),
        "unexpected cell {:?}",
        found
    );
}

#[test]
fn test_point_just_outside_boundary_still_found() {
    let synthetic = RotatedGrid::new(8, 8).with_rotation(10.0);
    let lut_grid = build(&synthetic);

    // Inside the LUT margin but outside every cell: best cell by distance
    let (lon, lat) = synthetic.position(-0.6, 4.0);
    let found = lut_grid.find_nearest_lon_lat(LonLat::new(lon, lat));
    assert_eq!(found, Some(GridCoordinates::new(0, 4)));
}

// ============================================================================
// Longitude conventions
// ============================================================================

#[test]
fn test_grid_in_0_360() {
    let synthetic = RotatedGrid::new(10, 10).with_origin(200.0, -10.0);
    let lut_grid = build(&synthetic);

    let expected = Some(GridCoordinates::new(5, 5));
    assert_eq!(lut_grid.find_nearest_lon_lat(LonLat::new(204.7, -5.0)), expected);
    assert_eq!(lut_grid.find_nearest_lon_lat(LonLat::new(-155.3, -5.0)), expected);
}

#[test]
fn test_grid_crossing_antimeridian() {
    let synthetic = RotatedGrid::new(10, 6)
        .with_origin(175.0, -3.0)
        .with_rotation(5.0)
        .wrapped();
    let lut_grid = build(&synthetic);

    for (fi, fj) in [(4.8, 3.2), (5.4, 2.9), (5.6, 3.1), (9.2, 0.1), (0.3, 5.2)] {
        let (lon, lat) = synthetic.position(fi, fj);
        for query_lon in [lon, lon - 360.0, lon + 360.0] {
            let found = lut_grid.find_nearest_lon_lat(LonLat::new(query_lon, lat));
            let expected = synthetic
                .cell_containing(lon, lat)
                .map(|(i, j)| GridCoordinates::new(i, j));
            assert_eq!(found, expected, "query ({}, {})", query_lon, lat);
        }
    }
}

// ============================================================================
// Query CRS
// ============================================================================

#[test]
fn test_web_mercator_query() {
    let synthetic = RotatedGrid::new(8, 8)
        .with_origin(5.0, 45.0)
        .with_spacing(0.25)
        .with_rotation(20.0);
    let lut_grid = build(&synthetic);

    let (lon, lat) = synthetic.position(3.1, 5.9);
    let (x, y) = to_mercator(lon, lat);
    let found = lut_grid
        .find_nearest_grid_point(&HorizontalPosition::new(x, y, CrsCode::Epsg3857))
        .unwrap();
    assert_eq!(found, Some(GridCoordinates::new(3, 6)));
}

#[test]
fn test_unsupported_query_crs() {
    let lut_grid = build(&RotatedGrid::new(4, 4));
    let result =
        lut_grid.find_nearest_grid_point(&HorizontalPosition::new(0.0, 0.0, CrsCode::Epsg3413));
    assert!(matches!(result, Err(ProjectionError::UnsupportedCrs(_))));
}

// ============================================================================
// LutGridCache
// ============================================================================

#[test]
fn test_generate_is_idempotent() {
    let cache = LutGridCache::new();
    let synthetic = RotatedGrid::new(12, 9).with_rotation(15.0);

    let first = cache.generate(synthetic.coordinates()).unwrap();
    let second = cache.generate(synthetic.coordinates()).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.stats().builds, 1);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_distinct_grids_get_distinct_entries() {
    let cache = LutGridCache::new();
    let a = cache
        .generate(RotatedGrid::new(6, 6).with_rotation(15.0).coordinates())
        .unwrap();
    let b = cache
        .generate(RotatedGrid::new(6, 6).with_rotation(16.0).coordinates())
        .unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(cache.stats().builds, 2);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_clear_forces_rebuild() {
    let cache = LutGridCache::new();
    let synthetic = RotatedGrid::new(6, 5);

    let before = cache.generate(synthetic.coordinates()).unwrap();
    cache.clear();
    assert!(cache.is_empty());

    let after = cache.generate(synthetic.coordinates()).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(cache.stats().builds, 2);
    assert_eq!(before.grid(), after.grid());
}

#[test]
fn test_concurrent_generate_builds_once() {
    let cache = Arc::new(LutGridCache::new());
    let synthetic = RotatedGrid::new(60, 40).with_rotation(15.0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.generate(synthetic.coordinates()).unwrap())
        })
        .collect();
    let grids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(grids.iter().all(|g| Arc::ptr_eq(g, &grids[0])));
    assert_eq!(cache.stats().builds, 1);
    assert_eq!(cache.stats().hits, 7);
}
