//! Look-up table build and query benchmark on a synthetic curvilinear grid.
//!
//! Builds a rotated regular grid, times look-up table generation, then
//! resolves random points inside the grid and reports how many results
//! contain their query point. The resolution divisor and whether queries
//! run on the rayon pool come from the same environment as the server
//! (`LUT_RESOLUTION_DIVISOR`, `GRID_PARALLEL_SAMPLING`).
//!
//! Run with: cargo run --release --bin lut-benchmark -- --ni 1000 --nj 800

use std::time::Instant;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use grid_processor::GridProcessorConfig;
use projection::{CurvilinearCoordinates, LonLat, LookUpTableGrid, LutGridCache};
use rand::Rng;
use rayon::prelude::*;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "lut-benchmark")]
#[command(about = "Benchmark curvilinear look-up table generation and queries")]
struct Args {
    /// Grid points along i
    #[arg(long, default_value_t = 500)]
    ni: usize,

    /// Grid points along j
    #[arg(long, default_value_t = 400)]
    nj: usize,

    /// Grid spacing in degrees
    #[arg(long, default_value_t = 0.05)]
    spacing: f64,

    /// Grid rotation in degrees
    #[arg(long, default_value_t = 15.0)]
    rotation: f64,

    /// Number of random queries
    #[arg(long, default_value_t = 100_000)]
    queries: usize,

    /// Overrides LUT_RESOLUTION_DIVISOR
    #[arg(long)]
    resolution_divisor: Option<f64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = GridProcessorConfig::from_env();
    if let Some(divisor) = args.resolution_divisor {
        config.lut_resolution_divisor = divisor;
    }
    config.validate().map_err(|e| anyhow!(e))?;

    if args.ni < 2 || args.nj < 2 {
        bail!("grid must be at least 2 x 2");
    }

    let (sin, cos) = args.rotation.to_radians().sin_cos();
    let spacing = args.spacing;
    let to_lon_lat = |fi: f64, fj: f64| {
        (
            -20.0 + spacing * (fi * cos - fj * sin),
            10.0 + spacing * (fi * sin + fj * cos),
        )
    };
    let coords = CurvilinearCoordinates::from_fn(args.ni, args.nj, |i, j| {
        to_lon_lat(i as f64, j as f64)
    });

    info!(
        ni = args.ni,
        nj = args.nj,
        spacing = args.spacing,
        rotation = args.rotation,
        resolution_divisor = config.lut_resolution_divisor,
        "Generating look-up table"
    );
    let cache = LutGridCache::with_resolution_divisor(config.lut_resolution_divisor);
    let start = Instant::now();
    let lut_grid = cache.generate(coords)?;
    let build_ms = start.elapsed().as_millis();

    let (n_lon, n_lat) = lut_grid.lut().dimensions();
    println!("Look-up table");
    println!("{:-<50}", "");
    println!("{:<25} {:>24}", "Grid", format!("{} x {}", args.ni, args.nj));
    println!("{:<25} {:>24}", "Bins", format!("{} x {}", n_lon, n_lat));
    println!("{:<25} {:>21.5} deg", "Resolution", lut_grid.lut().resolution());
    println!(
        "{:<25} {:>21.1} MB",
        "Size",
        lut_grid.lut().byte_size() as f64 / (1024.0 * 1024.0)
    );
    println!("{:<25} {:>21} ms", "Build time", build_ms);

    let mut rng = rand::thread_rng();
    let points: Vec<LonLat> = (0..args.queries)
        .map(|_| {
            let fi = rng.gen_range(-0.5..(args.ni as f64 - 0.5));
            let fj = rng.gen_range(-0.5..(args.nj as f64 - 0.5));
            let (lon, lat) = to_lon_lat(fi, fj);
            LonLat::new(lon, lat)
        })
        .collect();

    let start = Instant::now();
    let (found, containing) = if config.parallel_sampling {
        points
            .par_iter()
            .map(|p| resolve(&lut_grid, p))
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
    } else {
        points
            .iter()
            .map(|p| resolve(&lut_grid, p))
            .fold((0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
    };
    let elapsed = start.elapsed();
    let per_query_ns = if points.is_empty() {
        0.0
    } else {
        elapsed.as_nanos() as f64 / points.len() as f64
    };

    println!();
    println!("Queries");
    println!("{:-<50}", "");
    println!("{:<25} {:>24}", "Count", points.len());
    println!("{:<25} {:>24}", "Parallel", config.parallel_sampling);
    println!("{:<25} {:>24}", "Found", found);
    println!("{:<25} {:>24}", "Containing cell", containing);
    println!("{:<25} {:>21.1} ns", "Mean query time", per_query_ns);

    Ok(())
}

/// (found, containing) counts for one query point.
fn resolve(lut_grid: &LookUpTableGrid, point: &LonLat) -> (usize, usize) {
    match lut_grid.find_nearest_lon_lat(*point) {
        Some(c) => {
            let contains = lut_grid
                .grid()
                .cell(c.i, c.j)
                .map(|cell| cell.contains(point))
                .unwrap_or(false);
            (1, usize::from(contains))
        }
        None => (0, 0),
    }
}
