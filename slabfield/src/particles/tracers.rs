//! Explicit Euler advection of tracers through a buffered velocity field.
use log::debug;
use num::Float;

use crate::field::{field_shape, FieldBuffer};
use crate::interpolation::{init_result_array, PeriodicInterpolator};
use crate::particles::types::{ParticleResidency, ParticleState, Tracers};
use crate::traits::field::WeightKernel;
use crate::traits::parallel::{Communicator, Reducible};
use crate::traits::storage::ChunkStore;
use crate::traits::types::{Result, SlabError, IDX_Z};

impl<T, C, K> Tracers<T, C, K>
where
    T: Float + Reducible,
    C: Communicator,
    K: WeightKernel<T> + Sync,
{
    /// Bundle a particle table with the velocity field advecting it.
    ///
    /// Every rank must pass the same table. Fails if the field does not carry 3 components, if
    /// its grid differs from the interpolator's, or if its margin cannot hold the stencil.
    ///
    /// # Arguments
    /// * `state` - Particle table, identical on every rank.
    /// * `velocity` - Buffer of the velocity field, `[nz, ny, nx, 3]`.
    /// * `interpolator` - Samples the velocity at particle positions.
    /// * `dt` - Time step.
    pub fn new(
        state: ParticleState<T>,
        velocity: FieldBuffer<T, C>,
        interpolator: PeriodicInterpolator<T, K>,
        dt: T,
    ) -> Result<Self> {
        let (grid, ncomponents) = field_shape(velocity.decomposition())?;
        if ncomponents != 3 {
            return Err(SlabError::Configuration(format!(
                "velocity fields have 3 components, found {}",
                ncomponents
            )));
        }

        if grid != interpolator.grid() {
            return Err(SlabError::Configuration(format!(
                "velocity grid {:?} differs from interpolation grid {:?}",
                grid,
                interpolator.grid()
            )));
        }

        // Owners read n + 1 layers past their slab on either side
        let reach = interpolator.kernel().neighbours() + 1;
        if velocity.margin() < reach {
            return Err(SlabError::Configuration(format!(
                "margin {} cannot hold a stencil reaching {} layers",
                velocity.margin(),
                reach
            )));
        }

        let mut residency = ParticleResidency::from_decomposition(
            state.nparticles(),
            velocity.decomposition(),
            interpolator.box_width[IDX_Z],
            interpolator.box_offset[IDX_Z],
        )?;
        residency.assign(&state, &vec![T::zero(); state.nparticles()]);

        let rhs = vec![T::zero(); 3 * state.nparticles()];
        Ok(Self {
            state,
            residency,
            velocity,
            interpolator,
            dt,
            rhs,
            iteration: 0,
        })
    }

    /// The particle table, synchronised after every step.
    pub fn state(&self) -> &ParticleState<T> {
        &self.state
    }

    /// Ownership of the particles.
    pub fn residency(&self) -> &ParticleResidency<T> {
        &self.residency
    }

    /// The buffered velocity field.
    pub fn velocity(&self) -> &FieldBuffer<T, C> {
        &self.velocity
    }

    /// Steps taken so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Advance every particle by one step through the velocity field whose local slab is
    /// `source`.
    ///
    /// Collective. Ghosts are refreshed, each owner samples the velocity at its particles and
    /// moves them, then the table is synchronised with jump bounds `|v_z| dt`.
    pub fn step(&mut self, source: &[T]) -> Result<()> {
        self.velocity.refresh(source)?;

        let comm = self.velocity.decomposition().comm();
        let me = comm.rank();
        let nparticles = self.state.nparticles();
        debug!("rank {} tracer step {}", me, self.iteration);

        init_result_array(&mut self.rhs, nparticles, 3);
        let residency = &self.residency;
        self.interpolator.apply_selected(
            &self.velocity.view(),
            self.state.values(),
            self.state.ncomponents(),
            &mut self.rhs,
            |particle| residency.owner(particle) == me,
        );

        self.state
            .euler_step(self.dt, &self.rhs, &self.residency, me);

        let rhs = &self.rhs;
        let dt = self.dt;
        let estimator = |particle: usize, _: &[T]| rhs[3 * particle + IDX_Z].abs() * dt;
        self.residency
            .synchronize(comm, &mut self.state, &estimator)?;

        self.iteration += 1;
        Ok(())
    }

    /// Write the particle table of the current iteration to chunked storage.
    ///
    /// Collective.
    pub fn checkpoint<S>(&mut self, store: &S, chunk_size: usize) -> Result<()>
    where
        S: ChunkStore<T>,
    {
        let comm = self.velocity.decomposition().comm();
        let rhs = &self.rhs;
        let dt = self.dt;
        let estimator = |particle: usize, _: &[T]| rhs[3 * particle + IDX_Z].abs() * dt;
        self.state.write(
            comm,
            store,
            self.iteration,
            chunk_size,
            &mut self.residency,
            &estimator,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decomposition::DomainDecomposition;
    use crate::helpers::{particles_fixture, sample_field};
    use crate::interpolation::LagrangeKernel;
    use crate::parallel::run_spmd;
    use crate::particles::MemoryChunkStore;
    use approx::assert_relative_eq;

    fn uniform_velocity<C: Communicator>(buffer: &FieldBuffer<f64, C>, value: [f64; 3]) -> Vec<f64> {
        sample_field(buffer.decomposition(), [1.0; 3], [0.0; 3], |_, v| {
            v.copy_from_slice(&value)
        })
    }

    type Setup = (ParticleState<f64>, FieldBuffer<f64, crate::parallel::LocalCommunicator>);

    fn setup(comm: &crate::parallel::LocalCommunicator, margin: usize) -> Setup {
        let values = particles_fixture(20, 4, Some([0.0; 3]), Some([8.0; 3]), Some(3));
        let state = ParticleState::from_root(comm, 20, 4, || values).unwrap();
        let d = DomainDecomposition::new(&[8, 8, 8, 3], comm).unwrap();
        (state, FieldBuffer::new(d, margin).unwrap())
    }

    #[test]
    fn test_rejects_thin_margin() {
        run_spmd(2, |comm| {
            let (state, buffer) = setup(&comm, 1);
            let interpolator =
                PeriodicInterpolator::new(LagrangeKernel::new(1), [8, 8, 8], [8.0; 3], [0.0; 3])
                    .unwrap();
            assert!(Tracers::new(state, buffer, interpolator, 0.1).is_err());
        });
    }

    #[test]
    fn test_uniform_advection() {
        let velocity = [1.0, 0.5, -2.5];
        let (dt, nsteps) = (0.3, 6);

        for nprocs in [1, 2, 3] {
            let results = run_spmd(nprocs, |comm| {
                let (state, buffer) = setup(&comm, 2);
                let initial = state.clone();
                let source = uniform_velocity(&buffer, velocity);
                let interpolator =
                    PeriodicInterpolator::new(LagrangeKernel::new(1), [8, 8, 8], [8.0; 3], [0.0; 3])
                        .unwrap();

                let mut tracers = Tracers::new(state, buffer, interpolator, dt).unwrap();
                for _ in 0..nsteps {
                    tracers.step(&source).unwrap();
                }
                assert_eq!(tracers.iteration(), nsteps);

                // Owners follow the particles
                for particle in 0..20 {
                    let z = tracers.state().position(particle)[IDX_Z].rem_euclid(8.0);
                    let slab = z.floor() as usize;
                    let owner = tracers.residency().owner(particle);
                    assert_eq!(owner, tracers.velocity().decomposition().owner(slab));
                    assert!(tracers.residency().is_active(particle, owner));
                }
                (initial, tracers.state().clone())
            });

            for (initial, last) in &results {
                assert_eq!(last, &results[0].1);
                for particle in 0..20 {
                    for axis in 0..3 {
                        assert_relative_eq!(
                            last.position(particle)[axis],
                            initial.position(particle)[axis] + nsteps as f64 * dt * velocity[axis],
                            epsilon = 1e-10
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_checkpoint() {
        let store = MemoryChunkStore::new();
        run_spmd(2, |comm| {
            let (state, buffer) = setup(&comm, 2);
            let source = uniform_velocity(&buffer, [0.0, 0.0, 1.0]);
            let interpolator =
                PeriodicInterpolator::new(LagrangeKernel::new(1), [8, 8, 8], [8.0; 3], [0.0; 3])
                    .unwrap();

            let mut tracers = Tracers::new(state, buffer, interpolator, 0.5).unwrap();
            tracers.step(&source).unwrap();
            tracers.checkpoint(&store, 6).unwrap();

            let mut residency =
                ParticleResidency::from_decomposition(20, tracers.velocity().decomposition(), 8.0, 0.0)
                    .unwrap();
            let back = ParticleState::read(&comm, &store, 1, 20, 4, 6, &mut residency).unwrap();
            assert_eq!(&back, tracers.state());
            for p in 0..20 {
                assert_eq!(residency.owner(p), tracers.residency().owner(p));
            }
        });
        assert_eq!(store.len(), 4);
    }
}
