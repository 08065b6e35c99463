//! Accumulation of stencil sums at particle positions.
use num::Float;
use rayon::prelude::*;

use crate::interpolation::types::PeriodicInterpolator;
use crate::traits::field::{LocalField, WeightKernel};
use crate::traits::types::{Result, SlabError, IDX_X, IDX_Y, IDX_Z};

/// Cell of a periodic axis of `ncells` cells of width `step` containing `position` once wrapped
/// into `[offset, offset + width)`, and the fractional position within the cell in `[0, 1)`.
pub(crate) fn periodic_cell<T: Float>(
    position: T,
    offset: T,
    width: T,
    step: T,
    ncells: usize,
) -> (usize, T) {
    let shifted = position - offset;
    let mut in_box = shifted - (shifted / width).floor() * width;
    // The quotient may round to a whole number on either side of the true one
    if in_box < T::zero() {
        in_box = in_box + width;
    }
    if in_box >= width {
        in_box = T::zero();
    }

    let last = T::from(ncells - 1).unwrap_or_else(T::zero);
    let mut cell = (in_box / step).floor().max(T::zero()).min(last);
    let mut fraction = ((in_box - cell * step) / step).max(T::zero());
    if fraction >= T::one() {
        cell = cell + T::one();
        fraction = T::zero();
    }
    assert!(
        fraction >= T::zero() && fraction < T::one(),
        "fractional cell coordinate out of [0, 1)"
    );

    let cell = cell.to_usize().unwrap_or(0) % ncells;
    (cell, fraction)
}

/// Zero the first `nparticles * ncomponents` entries of a result buffer.
pub fn init_result_array<T: Float>(results: &mut [T], nparticles: usize, ncomponents: usize) {
    results[..nparticles * ncomponents].fill(T::zero());
}

/// Add `extra` into `results` element by element.
pub fn reduce<T: Float>(results: &mut [T], extra: &[T]) {
    results
        .iter_mut()
        .zip(extra.iter())
        .for_each(|(r, &e)| *r = *r + e);
}

impl<T, K> PeriodicInterpolator<T, K>
where
    T: Float + Send + Sync,
    K: WeightKernel<T> + Sync,
{
    /// Constructor.
    ///
    /// # Arguments
    /// * `kernel` - Source of stencil weights.
    /// * `grid` - Number of grid points along x, y, z.
    /// * `box_width` - Extent of the periodic box along x, y, z, positive.
    /// * `box_offset` - Lower corner of the periodic box.
    pub fn new(kernel: K, grid: [usize; 3], box_width: [T; 3], box_offset: [T; 3]) -> Result<Self> {
        if grid.iter().any(|&n| n == 0) {
            return Err(SlabError::Configuration(format!(
                "grid {:?} has an empty axis",
                grid
            )));
        }

        if box_width.iter().any(|&w| !(w > T::zero())) {
            return Err(SlabError::Configuration(
                "box widths must be positive".to_string(),
            ));
        }

        // A z stencil wider than the axis would read some layer twice
        if kernel.stencil_size() > grid[IDX_Z] {
            return Err(SlabError::Configuration(format!(
                "stencil of {} points wider than the {} z layers",
                kernel.stencil_size(),
                grid[IDX_Z]
            )));
        }

        let mut step = [T::zero(); 3];
        for axis in 0..3 {
            let cells = T::from(grid[axis]).unwrap_or_else(T::one);
            step[axis] = box_width[axis] / cells;
        }

        Ok(Self {
            kernel,
            grid,
            box_width,
            box_offset,
            step,
            derivative: [0; 3],
        })
    }

    /// Interpolate the given derivative order along x, y and z instead of the values. Weights
    /// are derivatives with respect to the position in units of cells.
    pub fn with_derivative(mut self, derivative: [usize; 3]) -> Self {
        self.derivative = derivative;
        self
    }

    /// The weight kernel.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Width of a cell along x, y, z.
    pub fn step(&self) -> [T; 3] {
        self.step
    }

    /// Number of grid points along x, y, z.
    pub fn grid(&self) -> [usize; 3] {
        self.grid
    }

    /// The cell containing a coordinate once wrapped into the box, and the fractional position
    /// within that cell in `[0, 1)`.
    ///
    /// # Arguments
    /// * `position` - Coordinate along `axis`.
    /// * `axis` - One of [`IDX_X`], [`IDX_Y`], [`IDX_Z`].
    pub fn map_to_cell(&self, position: T, axis: usize) -> (usize, T) {
        periodic_cell(
            position,
            self.box_offset[axis],
            self.box_width[axis],
            self.step[axis],
            self.grid[axis],
        )
    }

    /// Accumulate into `results` the stencil sums of every particle whose z stencil overlaps
    /// the locally readable layers of `field`. Stencil points outside those layers are skipped.
    ///
    /// # Arguments
    /// * `field` - Field to interpolate, on the same grid.
    /// * `positions` - Particle states, `stride` values per particle with the position first.
    /// * `stride` - Values per particle, at least 3.
    /// * `results` - Per particle accumulators, `field.ncomponents()` values per particle.
    pub fn apply<F>(&self, field: &F, positions: &[T], stride: usize, results: &mut [T])
    where
        F: LocalField<Scalar = T> + Sync,
    {
        self.apply_selected(field, positions, stride, results, |_| true)
    }

    /// As [`PeriodicInterpolator::apply`], restricted to the particles for which `select` holds.
    pub fn apply_selected<F, S>(
        &self,
        field: &F,
        positions: &[T],
        stride: usize,
        results: &mut [T],
        select: S,
    ) where
        F: LocalField<Scalar = T> + Sync,
        S: Fn(usize) -> bool + Sync,
    {
        assert!(stride >= 3, "particle states need at least a position");
        assert_eq!(field.grid(), self.grid, "field and interpolator grids differ");

        let ncomponents = field.ncomponents();
        let nparticles = positions.len() / stride;
        assert!(
            results.len() >= nparticles * ncomponents,
            "result buffer too short"
        );

        let stencil_size = self.kernel.stencil_size();

        results[..nparticles * ncomponents]
            .par_chunks_mut(ncomponents)
            .zip(positions.par_chunks_exact(stride))
            .enumerate()
            .filter(|(index, _)| select(*index))
            .for_each_init(
                || vec![T::zero(); 3 * stencil_size],
                |weights, (_, (result, state))| {
                    self.accumulate(field, &state[..3], weights, result)
                },
            );
    }

    fn accumulate<F>(&self, field: &F, position: &[T], weights: &mut [T], result: &mut [T])
    where
        F: LocalField<Scalar = T>,
    {
        let n = self.kernel.neighbours() as i64;
        let size = self.kernel.stencil_size();
        let [nx, ny, nz] = self.grid;

        let mut cells = [0i64; 3];
        for axis in [IDX_X, IDX_Y, IDX_Z] {
            let (cell, fraction) = self.map_to_cell(position[axis], axis);
            cells[axis] = cell as i64;
            self.kernel.compute_beta(
                self.derivative[axis],
                fraction,
                &mut weights[axis * size..(axis + 1) * size],
            );
        }

        let (wx, rest) = weights.split_at(size);
        let (wy, wz) = rest.split_at(size);

        let lower = [cells[IDX_X] - n, cells[IDX_Y] - n, cells[IDX_Z] - n];
        let upper_z = cells[IDX_Z] + n + 1;
        let (first_layer, end_layer) = field.z_interval();

        // The stencil, shifted by a period if needed, split into its parts inside the readable layers
        for shift in [-(nz as i64), 0, nz as i64] {
            let first = (lower[IDX_Z] + shift).max(first_layer);
            let last = (upper_z + shift).min(end_layer - 1);

            for z in first..=last {
                let iz = (z - lower[IDX_Z]).rem_euclid(nz as i64) as usize;
                assert!(iz < size, "z stencil index out of range");
                let weight_z = wz[iz];

                for (iy, &weight_y) in wy.iter().enumerate() {
                    let y = (lower[IDX_Y] + iy as i64).rem_euclid(ny as i64) as usize;
                    let weight_yz = weight_z * weight_y;

                    for (ix, &weight_x) in wx.iter().enumerate() {
                        let x = (lower[IDX_X] + ix as i64).rem_euclid(nx as i64) as usize;
                        let coefficient = weight_yz * weight_x;

                        for (r, &value) in result.iter_mut().zip(field.point(x, y, z).iter()) {
                            *r = *r + coefficient * value;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decomposition::DomainDecomposition;
    use crate::field::{FieldBuffer, SlabField};
    use crate::helpers::{particles_fixture, sample_field};
    use crate::interpolation::LagrangeKernel;
    use crate::parallel::{run_spmd, LocalCommunicator};
    use crate::traits::parallel::Communicator;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn smooth(p: [f64; 3], out: &mut [f64]) {
        out[0] = p[0].sin() + (2.0 * p[1]).cos() * p[2].sin();
        out[1] = p[2].cos();
    }

    #[test]
    fn test_map_to_cell() {
        let interpolator = PeriodicInterpolator::new(
            LagrangeKernel::<f64>::new(1),
            [4, 8, 4],
            [4.0, 2.0, 4.0],
            [0.0, 0.0, -1.0],
        )
        .unwrap();

        assert_eq!(interpolator.map_to_cell(1.0, IDX_X), (1, 0.0));
        assert_eq!(interpolator.map_to_cell(4.0, IDX_X), (0, 0.0));
        assert_eq!(interpolator.map_to_cell(-0.5, IDX_X), (3, 0.5));
        assert_eq!(interpolator.map_to_cell(9.25, IDX_X), (1, 0.25));
        assert_eq!(interpolator.map_to_cell(0.0, IDX_Z), (1, 0.0));

        let (cell, fraction) = interpolator.map_to_cell(-1e-18, IDX_Y);
        assert!(cell < 8);
        assert!((0.0..1.0).contains(&fraction));
    }

    #[test]
    fn test_map_to_cell_below_period_multiple() {
        let width = 2.0 * PI;
        let interpolator =
            PeriodicInterpolator::new(LagrangeKernel::<f64>::new(2), [16, 6, 6], [width; 3], [0.0; 3])
                .unwrap();
        let step = interpolator.step()[IDX_X];

        let mut positions = Vec::new();
        for k in 1..5000u64 {
            for ulps in 1..=3 {
                let x = f64::from_bits((k as f64 * width).to_bits() - ulps);
                let (cell, fraction) = interpolator.map_to_cell(x, IDX_X);
                let wrapped = (cell as f64 + fraction) * step;
                assert!(
                    wrapped < 1e-9 || width - wrapped < 1e-9,
                    "{} mapped to cell {} fraction {}",
                    x,
                    cell,
                    fraction
                );
                if k < 500 {
                    positions.extend_from_slice(&[x, 0.3, 0.3]);
                }
            }
        }

        // A non-constant field tells neighbouring cells apart
        let comm = LocalCommunicator::solo();
        let d = DomainDecomposition::<f64, _>::new(&[6, 6, 16], &comm).unwrap();
        let values = sample_field(&d, [step, width / 6.0, width / 6.0], [0.0; 3], |p, out| {
            out[0] = p[0].sin()
        });
        let field = SlabField::new(&d, &values).unwrap();

        let mut results = vec![0.0; positions.len() / 3];
        interpolator.apply(&field, &positions, 3, &mut results);
        for r in results {
            assert!(r.abs() < 1e-9, "value {} just below a period", r);
        }

        let mut far = Vec::new();
        for k in [0.0, 1.0, 10.0, 1000.0, 100000.0, -3.0, -100000.0] {
            far.extend_from_slice(&[0.7 + k * width, 0.3, 0.3]);
        }
        let mut results = vec![0.0; far.len() / 3];
        interpolator.apply(&field, &far, 3, &mut results);
        for r in &results[1..] {
            assert_relative_eq!(*r, results[0], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_rejects_wide_stencil() {
        let kernel = LagrangeKernel::<f64>::new(2);
        assert!(PeriodicInterpolator::new(kernel.clone(), [8, 8, 5], [1.0; 3], [0.0; 3]).is_err());
        assert!(PeriodicInterpolator::new(kernel.clone(), [8, 8, 6], [1.0; 3], [0.0; 3]).is_ok());
        assert!(PeriodicInterpolator::new(kernel, [8, 8, 6], [1.0, 0.0, 1.0], [0.0; 3]).is_err());
    }

    #[test]
    fn test_constant_field() {
        let comm = LocalCommunicator::solo();
        let d = DomainDecomposition::<f64, _>::new(&[6, 5, 4], &comm).unwrap();
        let values = vec![2.5; d.local_size()];
        let field = SlabField::new(&d, &values).unwrap();

        let interpolator =
            PeriodicInterpolator::new(LagrangeKernel::new(2), [4, 5, 6], [1.0, 1.0, 1.5], [0.0; 3])
                .unwrap();

        let mut positions = particles_fixture(20, 3, Some([-3.0; 3]), Some([3.0; 3]), Some(1));
        // On cell boundaries, on the box boundary, far outside the box
        positions.extend_from_slice(&[0.25, 0.2, 0.75, 1.0, 1.0, 1.5, -7.0, 12.0, 3.0]);

        let nparticles = positions.len() / 3;
        let mut results = vec![0.0; nparticles];
        interpolator.apply(&field, &positions, 3, &mut results);
        for r in results {
            assert_relative_eq!(r, 2.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_scenario_stencil_across_slab_boundary() {
        let results = run_spmd(2, |comm| {
            let d = DomainDecomposition::<f64, _>::new(&[4, 4, 4], &comm).unwrap();
            assert_eq!(d.starts()[0], 2 * comm.rank() as usize);
            let slab = vec![1.0; d.local_size()];

            let mut buffer = FieldBuffer::new(d, 1).unwrap();
            buffer.refresh(&slab).unwrap();

            let interpolator =
                PeriodicInterpolator::new(LagrangeKernel::new(1), [4, 4, 4], [4.0; 3], [0.0; 3])
                    .unwrap();

            let mut result = [0.0];
            init_result_array(&mut result, 1, 1);
            interpolator.apply(&buffer.view(), &[0.0, 0.0, 1.99], 3, &mut result);
            result[0]
        });

        for r in results {
            assert_relative_eq!(r, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_buffered_matches_global() {
        let width = 2.0 * PI;
        let grid = [8, 6, 12];
        let step = grid.map(|n| width / n as f64);
        let positions = particles_fixture(200, 4, Some([-1.0; 3]), Some([7.0; 3]), Some(3));

        let reference = {
            let comm = LocalCommunicator::solo();
            let d = DomainDecomposition::<f64, _>::new(&[12, 6, 8, 2], &comm).unwrap();
            let values = sample_field(&d, step, [0.0; 3], smooth);
            let field = SlabField::new(&d, &values).unwrap();
            let interpolator =
                PeriodicInterpolator::new(LagrangeKernel::new(2), grid, [width; 3], [0.0; 3]).unwrap();
            let mut results = vec![0.0; 400];
            interpolator.apply(&field, &positions, 4, &mut results);
            results
        };

        for nprocs in [2, 3, 4] {
            let per_rank = run_spmd(nprocs, |comm| {
                let d = DomainDecomposition::<f64, _>::new(&[12, 6, 8, 2], &comm).unwrap();
                let values = sample_field(&d, step, [0.0; 3], smooth);
                let interpolator =
                    PeriodicInterpolator::new(LagrangeKernel::new(2), grid, [width; 3], [0.0; 3])
                        .unwrap();

                // Partial sums over ghost-free slabs add up to the full stencil
                let slab = SlabField::new(&d, &values).unwrap();
                let mut partial = vec![0.0; 400];
                interpolator.apply(&slab, &positions, 4, &mut partial);
                let mut summed = vec![0.0; 400];
                comm.all_reduce_sum(&partial, &mut summed);

                // Owners see the whole stencil through the ghosts
                let owned = |p: usize| {
                    let (cell, _) = interpolator.map_to_cell(positions[4 * p + 2], IDX_Z);
                    d.owner(cell) == comm.rank()
                };
                let owned_particles = (0..200).filter(|&p| owned(p)).collect::<Vec<_>>();

                let mut buffer = FieldBuffer::new(
                    DomainDecomposition::<f64, _>::new(&[12, 6, 8, 2], &comm).unwrap(),
                    3,
                )
                .unwrap();
                buffer.refresh(&values).unwrap();
                let mut buffered = vec![0.0; 400];
                interpolator.apply_selected(&buffer.view(), &positions, 4, &mut buffered, |p| {
                    owned_particles.contains(&p)
                });

                (summed, owned_particles, buffered)
            });

            let mut seen = vec![false; 200];
            for (summed, owned, buffered) in per_rank {
                for (s, r) in summed.iter().zip(reference.iter()) {
                    assert_relative_eq!(*s, *r, epsilon = 1e-12);
                }
                for p in owned {
                    assert!(!seen[p]);
                    seen[p] = true;
                    for c in 0..2 {
                        assert_relative_eq!(buffered[2 * p + c], reference[2 * p + c], epsilon = 1e-12);
                    }
                }
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn test_derivative_of_linear_field() {
        let comm = LocalCommunicator::solo();
        let d = DomainDecomposition::<f64, _>::new(&[4, 4, 8], &comm).unwrap();
        // Linear in x away from the periodic seam
        let values = sample_field(&d, [1.0; 3], [0.0; 3], |p, out| out[0] = 3.0 * p[0]);
        let field = SlabField::new(&d, &values).unwrap();

        let interpolator =
            PeriodicInterpolator::new(LagrangeKernel::new(1), [8, 4, 4], [8.0, 4.0, 4.0], [0.0; 3])
                .unwrap()
                .with_derivative([1, 0, 0]);

        let mut result = [0.0];
        interpolator.apply(&field, &[3.4, 1.2, 2.9], 3, &mut result);
        assert_relative_eq!(result[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reduce() {
        let mut results = vec![1.0, 2.0, 3.0, 4.0];
        init_result_array(&mut results, 1, 2);
        assert_eq!(results, vec![0.0, 0.0, 3.0, 4.0]);
        reduce(&mut results, &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(results, vec![1.0, 1.0, 4.0, 5.0]);
    }
}
