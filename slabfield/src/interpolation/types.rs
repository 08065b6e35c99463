//! Data structures for field to particle interpolation.
use num::Float;

use crate::traits::field::WeightKernel;

/// Interpolates fields at arbitrary positions of a periodic box.
///
/// The box spans `box_width` along each axis starting at `box_offset`, and is divided into
/// `grid` cells per axis. Positions outside the box are wrapped into it.
#[derive(Clone, Debug)]
pub struct PeriodicInterpolator<T, K>
where
    T: Float,
    K: WeightKernel<T>,
{
    /// Source of the stencil weights.
    pub(crate) kernel: K,

    /// Number of grid points along x, y, z.
    pub(crate) grid: [usize; 3],

    /// Extent of the periodic box along x, y, z.
    pub(crate) box_width: [T; 3],

    /// Lower corner of the periodic box.
    pub(crate) box_offset: [T; 3],

    /// Width of a cell along x, y, z.
    pub(crate) step: [T; 3],

    /// Derivative order along x, y, z.
    pub(crate) derivative: [usize; 3],
}

/// Lagrange interpolation weights on the `2n + 2` nodes `-n..=n+1`.
#[derive(Clone, Debug)]
pub struct LagrangeKernel<T>
where
    T: Float,
{
    /// Stencil half-width.
    pub(crate) neighbours: usize,

    /// Monomial coefficients of each basis polynomial, lowest degree first.
    pub(crate) basis: Vec<Vec<T>>,
}
