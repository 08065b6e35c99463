//! Lagrange polynomial weight kernel.
use num::Float;

use crate::interpolation::types::LagrangeKernel;
use crate::traits::field::WeightKernel;

impl<T> LagrangeKernel<T>
where
    T: Float,
{
    /// Kernel of stencil half-width `neighbours`, polynomials of degree `2 * neighbours + 1`.
    pub fn new(neighbours: usize) -> Self {
        let size = 2 * neighbours + 2;
        let node = |i: usize| T::from(i as i64 - neighbours as i64).unwrap_or_else(T::zero);

        let basis = (0..size)
            .map(|j| {
                let mut coefficients = vec![T::zero(); size];
                coefficients[0] = T::one();
                let mut degree = 0;

                for i in (0..size).filter(|&i| i != j) {
                    let denominator = node(j) - node(i);
                    // Multiply by (x - x_i) / (x_j - x_i)
                    for k in (0..=degree + 1).rev() {
                        let shifted = if k > 0 { coefficients[k - 1] } else { T::zero() };
                        coefficients[k] = (shifted - node(i) * coefficients[k]) / denominator;
                    }
                    degree += 1;
                }
                coefficients
            })
            .collect();

        Self { neighbours, basis }
    }
}

/// Value of the `derivative`-th derivative of a polynomial at `x`.
fn evaluate<T: Float>(coefficients: &[T], derivative: usize, x: T) -> T {
    let mut result = T::zero();
    for k in (derivative..coefficients.len()).rev() {
        let falling = ((k - derivative + 1)..=k).fold(T::one(), |acc, f| {
            acc * T::from(f).unwrap_or_else(T::zero)
        });
        result = result * x + coefficients[k] * falling;
    }
    result
}

impl<T> WeightKernel<T> for LagrangeKernel<T>
where
    T: Float,
{
    fn neighbours(&self) -> usize {
        self.neighbours
    }

    fn compute_beta(&self, derivative: usize, x: T, weights: &mut [T]) {
        debug_assert_eq!(weights.len(), self.stencil_size());
        for (weight, coefficients) in weights.iter_mut().zip(self.basis.iter()) {
            *weight = evaluate(coefficients, derivative, x);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_partition_of_unity() {
        for neighbours in 0..4 {
            let kernel = LagrangeKernel::<f64>::new(neighbours);
            let mut weights = vec![0.0; kernel.stencil_size()];
            for &x in &[0.0, 0.1, 0.5, 0.99] {
                kernel.compute_beta(0, x, &mut weights);
                assert_relative_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);

                kernel.compute_beta(1, x, &mut weights);
                assert_relative_eq!(weights.iter().sum::<f64>(), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_nodes_are_exact() {
        let kernel = LagrangeKernel::<f64>::new(2);
        let mut weights = vec![0.0; 6];
        kernel.compute_beta(0, 0.0, &mut weights);
        let expected = [0., 0., 1., 0., 0., 0.];
        for (w, e) in weights.iter().zip(expected.iter()) {
            assert_relative_eq!(*w, *e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_reproduces_polynomials() {
        // Degree 3 is exact for n = 1
        let kernel = LagrangeKernel::<f64>::new(1);
        let f = |x: f64| 2.0 * x * x * x - x + 0.5;
        let df = |x: f64| 6.0 * x * x - 1.0;
        let nodes = [-1.0, 0.0, 1.0, 2.0];
        let mut weights = vec![0.0; 4];

        for &x in &[0.0, 0.3, 0.75] {
            kernel.compute_beta(0, x, &mut weights);
            let value: f64 = weights.iter().zip(nodes.iter()).map(|(w, &n)| w * f(n)).sum();
            assert_relative_eq!(value, f(x), epsilon = 1e-12);

            kernel.compute_beta(1, x, &mut weights);
            let slope: f64 = weights.iter().zip(nodes.iter()).map(|(w, &n)| w * f(n)).sum();
            assert_relative_eq!(slope, df(x), epsilon = 1e-10);
        }
    }
}
