//! Particle Traits
use num::Float;

/// Upper bound of the distance a particle may travel along z before the next residency update.
pub trait JumpEstimate<T>
where
    T: Float,
{
    /// Jump bound of one particle.
    ///
    /// # Arguments
    /// * `index` - Index of the particle.
    /// * `state` - The particle's state, position first.
    fn jump(&self, index: usize, state: &[T]) -> T;
}

/// Particles that do not move before the next residency update.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroJump;

impl<T: Float> JumpEstimate<T> for ZeroJump {
    fn jump(&self, _index: usize, _state: &[T]) -> T {
        T::zero()
    }
}

impl<T, F> JumpEstimate<T> for F
where
    T: Float,
    F: Fn(usize, &[T]) -> T,
{
    fn jump(&self, index: usize, state: &[T]) -> T {
        self(index, state)
    }
}
