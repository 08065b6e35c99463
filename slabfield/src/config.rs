//! # Run Configuration
//!
//! Parameters of a tracer run, read from YAML. Every field has a default, so a file only needs
//! to list what it changes.
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::traits::types::{Result, SlabError};

/// Parameters of a tracer run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Grid points along x, y, z.
    pub grid: [usize; 3],

    /// Extent of the periodic box along x, y, z.
    pub box_width: [f64; 3],

    /// Lower corner of the periodic box.
    pub box_offset: [f64; 3],

    /// Ghost slices on either side of each slab.
    pub margin: usize,

    /// Interpolation stencil half width, the stencil spans `2n + 2` points per axis.
    pub interp_neighbours: usize,

    /// Number of tracers.
    pub nparticles: usize,

    /// Values per tracer, position first.
    pub ncomponents: usize,

    /// Tracers per storage chunk.
    pub chunk_size: usize,

    /// Time step.
    pub dt: f64,

    /// Number of steps.
    pub iterations: usize,

    /// Ranks of the in-process run.
    pub nprocs: usize,

    /// Seed of the initial tracer positions.
    pub seed: u64,

    /// Uniform velocity advecting the tracers.
    pub velocity: [f64; 3],
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            grid: [32, 32, 32],
            box_width: [2.0 * PI; 3],
            box_offset: [0.0; 3],
            margin: 2,
            interp_neighbours: 1,
            nparticles: 1000,
            ncomponents: 3,
            chunk_size: 256,
            dt: 0.01,
            iterations: 100,
            nprocs: 4,
            seed: 0,
            velocity: [1.0, 0.5, 0.25],
        }
    }
}

impl RunConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| SlabError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = fs::read_to_string(path.as_ref()).map_err(|e| {
            SlabError::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check the parameters are consistent.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(SlabError::Config(message));

        if self.grid.iter().any(|&n| n == 0) {
            return fail(format!("grid {:?} has an empty axis", self.grid));
        }
        if self.box_width.iter().any(|&w| !(w > 0.0)) {
            return fail(format!("box widths {:?} must be positive", self.box_width));
        }
        if self.ncomponents < 3 {
            return fail(format!(
                "tracers need at least 3 components, found {}",
                self.ncomponents
            ));
        }
        if self.chunk_size == 0 {
            return fail("chunk size must be positive".to_string());
        }
        if self.nprocs == 0 {
            return fail("at least one rank is needed".to_string());
        }

        let stencil = 2 * self.interp_neighbours + 2;
        let thinnest = self.grid.iter().min().copied().unwrap_or(0);
        if stencil > thinnest {
            return fail(format!(
                "stencil of {} points wider than the grid {:?}",
                stencil, self.grid
            ));
        }
        if self.margin <= self.interp_neighbours {
            return fail(format!(
                "margin {} must exceed the stencil half width {}",
                self.margin, self.interp_neighbours
            ));
        }
        Ok(())
    }

    /// Width of a grid cell along x, y, z.
    pub fn step_width(&self) -> [f64; 3] {
        [0, 1, 2].map(|axis| self.box_width[axis] / self.grid[axis] as f64)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_valid() {
        let config = RunConfig::default();
        config.validate().unwrap();
        assert_relative_eq!(config.step_width()[0], 2.0 * PI / 32.0);
    }

    #[test]
    fn test_partial_yaml() {
        let config = RunConfig::from_yaml_str(
            "grid: [16, 8, 12]\nmargin: 3\ninterp_neighbours: 2\nvelocity: [0.0, 0.0, 1.0]\n",
        )
        .unwrap();
        assert_eq!(config.grid, [16, 8, 12]);
        assert_eq!(config.margin, 3);
        assert_eq!(config.nprocs, RunConfig::default().nprocs);
        assert_relative_eq!(config.step_width()[1], 2.0 * PI / 8.0);
    }

    #[test]
    fn test_invalid() {
        for yaml in [
            "grid: [16, 0, 16]",
            "box_width: [1.0, -1.0, 1.0]",
            "ncomponents: 2",
            "chunk_size: 0",
            "margin: 1",
            "grid: [16, 16, 3]",
            "nprocs: 0",
            "unknown: 3",
            "grid: 16",
        ] {
            assert!(
                matches!(RunConfig::from_yaml_str(yaml), Err(SlabError::Config(_))),
                "{} accepted",
                yaml
            );
        }
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "nparticles: 12\nseed: 7").unwrap();
        let config = RunConfig::from_path(file.path()).unwrap();
        assert_eq!(config.nparticles, 12);
        assert_eq!(config.seed, 7);

        assert!(RunConfig::from_path(file.path().with_extension("missing")).is_err());
    }
}
