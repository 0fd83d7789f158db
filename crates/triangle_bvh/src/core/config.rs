//! # Index Configuration
//!
//! Construction parameters for a [`TriangleBvh`](crate::spatial::TriangleBvh):
//! the covering region, the expected triangle count and the subdivision
//! depth limit. Loadable from TOML or RON through the [`Config`] trait.
//!
//! ```toml
//! region_min = [-64.0, -16.0, -64.0]
//! region_max = [64.0, 48.0, 64.0]
//! triangle_capacity_hint = 4096
//! max_depth = 12
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::foundation::math::{self, Vec3};
use crate::geometry::Aabb;

/// Deepest subdivision a configuration may request
pub const MAX_SUPPORTED_DEPTH: u32 = 32;

/// Configuration for a triangle index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Minimum corner of the root cell
    pub region_min: Vec3,
    /// Maximum corner of the root cell
    pub region_max: Vec3,
    /// Expected number of triangles, used to size the backing arrays
    pub triangle_capacity_hint: usize,
    /// Leaves at this depth are never split, even when over capacity
    pub max_depth: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            region_min: Vec3::zeros(),
            region_max: Vec3::new(1.0, 1.0, 1.0),
            triangle_capacity_hint: 1024,
            max_depth: 16,
        }
    }
}

impl IndexConfig {
    /// Create a configuration covering `region`
    pub fn new(region: Aabb, triangle_capacity_hint: usize) -> Self {
        Self {
            region_min: region.min,
            region_max: region.max,
            triangle_capacity_hint,
            ..Default::default()
        }
    }

    /// Builder-style depth limit
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Root cell described by this configuration
    pub fn region(&self) -> Aabb {
        Aabb::new(self.region_min, self.region_max)
    }

    /// Check that the region is usable and the depth limit is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !math::is_finite(&self.region_min) || !math::is_finite(&self.region_max) {
            return Err(ConfigError::Invalid("region corners must be finite".to_string()));
        }
        if !self.region().is_valid() {
            return Err(ConfigError::Invalid(format!(
                "region_min {:?} exceeds region_max {:?}",
                self.region_min.as_slice(),
                self.region_max.as_slice()
            )));
        }
        if self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "max_depth {} exceeds {}",
                self.max_depth, MAX_SUPPORTED_DEPTH
            )));
        }
        Ok(())
    }
}

impl Config for IndexConfig {}
