//! Terrain probe
//!
//! Builds a height-field terrain into a shared triangle index, casts a
//! battery of picking rays from worker threads, then writes the index to a
//! file and checks the reloaded copy answers the same rays identically.
//!
//! Usage: `terrain_probe [config.toml|config.ron]`

use std::path::PathBuf;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use triangle_bvh::prelude::*;
use triangle_bvh::spatial::codec;

/// Grid cells along each horizontal axis
const GRID: u32 = 48;

/// Rays cast by each worker
const RAYS_PER_WORKER: usize = 2_000;

const WORKERS: usize = 4;

/// Per-triangle payload stored with the terrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Surface {
    cell: (u32, u32),
    material: Material,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Material {
    Grass,
    Rock,
    Snow,
}

impl Material {
    fn for_height(height: f32, top: f32) -> Self {
        let fraction = height / top;
        if fraction > 0.75 {
            Self::Snow
        } else if fraction > 0.4 {
            Self::Rock
        } else {
            Self::Grass
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum ProbeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Ray worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    #[error("Reloaded index disagrees on ray {ray}: {before:?} vs {after:?}")]
    Mismatch {
        ray: usize,
        before: Option<RayHit>,
        after: Option<RayHit>,
    },
}

fn default_config() -> IndexConfig {
    let region = Aabb::new(Vec3::new(-32.0, -32.0, -1.0), Vec3::new(32.0, 32.0, 12.0));
    IndexConfig::new(region, (GRID * GRID * 2) as usize)
}

fn height_at(x: f32, y: f32, top: f32, phase: f32) -> f32 {
    let wave = (x * 0.15 + phase).sin() * (y * 0.11).cos() + 0.5 * (x * 0.05 + y * 0.07 - phase).sin();
    (wave * 0.5 + 0.5).clamp(0.0, 1.0) * top
}

/// Two triangles per grid cell, wound to face up
fn build_terrain(index: &SharedTriangleBvh<Surface>, region: &Aabb, rng: &mut StdRng) -> Result<(), IndexError> {
    let top = region.max.z * 0.8;
    let step_x = region.size().x / GRID as f32;
    let step_y = region.size().y / GRID as f32;
    let phase = rng.gen_range(0.0..std::f32::consts::TAU);
    let corner = |i: u32, j: u32| {
        let x = region.min.x + i as f32 * step_x;
        let y = region.min.y + j as f32 * step_y;
        Vec3::new(x, y, height_at(x, y, top, phase))
    };

    let up = Some(Vec3::z());
    for i in 0..GRID {
        for j in 0..GRID {
            let p00 = corner(i, j);
            let p10 = corner(i + 1, j);
            let p01 = corner(i, j + 1);
            let p11 = corner(i + 1, j + 1);
            let material = Material::for_height(p00.z, top);

            index.insert(p00, p10, p11, Surface { cell: (i, j), material }, up)?;
            index.insert(p00, p11, p01, Surface { cell: (i, j), material }, up)?;
        }
    }
    Ok(())
}

/// Downward picking rays over the terrain footprint
fn picking_rays(region: &Aabb, count: usize, rng: &mut StdRng) -> Vec<Ray> {
    (0..count)
        .map(|_| {
            let origin = Vec3::new(
                rng.gen_range(region.min.x..region.max.x),
                rng.gen_range(region.min.y..region.max.y),
                region.max.z + 5.0,
            );
            let slant = Vec3::new(rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3), -1.0);
            Ray::new(origin, slant)
        })
        .collect()
}

fn run(config_path: Option<PathBuf>) -> Result<(), ProbeError> {
    let config = match &config_path {
        Some(path) => {
            log::info!("Loading index config from {}", path.display());
            IndexConfig::load_from_file(path)?
        }
        None => default_config(),
    };
    let region = config.region();
    let mut rng = StdRng::seed_from_u64(0x7e44a1);

    let started = Instant::now();
    let index = SharedTriangleBvh::with_config(&config)?;
    build_terrain(&index, &region, &mut rng)?;
    let stats = index.stats();
    log::info!(
        "Built terrain: {} triangles, {} nodes ({} leaves, depth {}, largest leaf {}) in {:?}",
        index.len(),
        stats.node_count,
        stats.leaf_count,
        stats.max_depth,
        stats.largest_leaf,
        started.elapsed()
    );

    let batteries: Vec<Vec<Ray>> = (0..WORKERS)
        .map(|_| picking_rays(&region, RAYS_PER_WORKER, &mut rng))
        .collect();

    let started = Instant::now();
    let results: Vec<Vec<Option<RayHit>>> = std::thread::scope(|scope| {
        let index = &index;
        let handles: Vec<_> = batteries
            .iter()
            .map(|rays| scope.spawn(move || rays.iter().map(|ray| index.ray_cast(ray)).collect::<Vec<_>>()))
            .collect();
        join_workers(handles)
    })?;
    let hits = results.iter().flatten().flatten().count();
    log::info!(
        "Cast {} rays on {} threads in {:?}: {} hits",
        WORKERS * RAYS_PER_WORKER,
        WORKERS,
        started.elapsed(),
        hits
    );

    let mut materials = [0_usize; 3];
    for hit in results.iter().flatten().flatten() {
        if let Some(material) = index.with_payload(hit.triangle_id, |surface| surface.material) {
            materials[material as usize] += 1;
        }
    }
    log::info!(
        "Hits by material: grass {}, rock {}, snow {}",
        materials[0],
        materials[1],
        materials[2]
    );

    let path = std::env::temp_dir().join(format!("terrain_probe_{}.bvh", std::process::id()));
    {
        let snapshot = index.read();
        codec::save_to_file(&*snapshot, &path, &RonCodec)?;
    }
    let size = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
    let reloaded: TriangleBvh<Surface> = codec::load_from_file(&path, &RonCodec)?;
    let _ = std::fs::remove_file(&path);
    log::info!("Round-tripped index through {} ({} bytes)", path.display(), size);

    let rays: Vec<&Ray> = batteries.iter().flatten().collect();
    let before = results.iter().flatten();
    for (ray_index, (ray, before)) in rays.iter().zip(before).enumerate() {
        let after = reloaded.ray_cast(ray);
        if after != *before {
            return Err(ProbeError::Mismatch {
                ray: ray_index,
                before: *before,
                after,
            });
        }
        if let Some(hit) = after {
            if reloaded.payload(hit.triangle_id) != index.payload(hit.triangle_id).as_ref() {
                log::warn!("Payload of triangle {} changed across the round trip", hit.triangle_id);
            }
        }
    }
    log::info!("Reloaded index answered all {} rays identically", rays.len());
    Ok(())
}

/// Wait for every ray worker, failing on the first one that panicked
fn join_workers<T>(handles: Vec<std::thread::ScopedJoinHandle<'_, T>>) -> Result<Vec<T>, ProbeError> {
    handles
        .into_iter()
        .enumerate()
        .map(|(worker, handle)| handle.join().map_err(|_| ProbeError::WorkerPanicked { worker }))
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    if let Err(e) = run(config_path) {
        log::error!("Terrain probe failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}
