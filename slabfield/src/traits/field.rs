//! Field Traits
use num::Float;

/// A distributed 3D field, some of whose z layers can be read by the calling rank.
///
/// Grid values are stored with the components of a point adjacent, and points ordered with x
/// fastest and z slowest. The z axis is the distributed one.
pub trait LocalField {
    /// Scalar type of the field values.
    type Scalar: Float;

    /// Global number of grid points along x, y and z.
    fn grid(&self) -> [usize; 3];

    /// Number of components stored per grid point.
    fn ncomponents(&self) -> usize;

    /// Half-open interval of z layers readable here, in unwrapped global coordinates.
    ///
    /// The interval may start below zero or end past the z extent when it includes ghost layers
    /// across the periodic boundary, but never spans more than the z extent, so each global
    /// layer is readable at most once.
    fn z_interval(&self) -> (i64, i64);

    /// Components of the grid point at global `x`, `y` and unwrapped `z` within [`Self::z_interval`].
    fn point(&self, x: usize, y: usize, z: i64) -> &[Self::Scalar];
}

/// Interpolation weights for a stencil of `2 * neighbours() + 2` grid points.
pub trait WeightKernel<T>
where
    T: Float,
{
    /// Half-width `n` of the stencil, points `-n..=n+1` around the base cell.
    fn neighbours(&self) -> usize;

    /// Number of weights produced, `2 * neighbours() + 2`.
    fn stencil_size(&self) -> usize {
        2 * self.neighbours() + 2
    }

    /// Weights of the `derivative`-th derivative of the interpolant at fractional offset `x`.
    ///
    /// # Arguments
    /// * `derivative` - Derivative order, 0 for plain interpolation.
    /// * `x` - Position within the base cell, in `[0, 1)`.
    /// * `weights` - Output, `stencil_size()` values.
    fn compute_beta(&self, derivative: usize, x: T, weights: &mut [T]);
}
