//? mpirun -n {{NPROCESSES}} --features "mpi"

#[cfg(feature = "mpi")]
fn main() {
    use mpi::environment::Universe;
    use slabfield::{
        decomposition::DomainDecomposition,
        field::{FieldBuffer, SlabField},
        helpers::{particles_fixture, sample_field},
        interpolation::{init_result_array, LagrangeKernel, PeriodicInterpolator},
        traits::parallel::Communicator,
    };

    let universe: Universe = mpi::initialize().unwrap();
    let world = universe.world();

    // Grid parameters
    let n = 24;
    let width = 1.0f64;
    let step = width / n as f64;
    let neighbours = 1;

    let d = DomainDecomposition::<f64, _>::new(&[n, n, n], &world).unwrap();
    let data = sample_field(&d, [step; 3], [0.0; 3], |[x, y, z], v| {
        let tau = 2.0 * std::f64::consts::PI;
        v[0] = (tau * x).sin() + (tau * y).cos() * (tau * z).sin();
    });

    // Same particles everywhere
    let nparticles = 500;
    let positions = particles_fixture(nparticles, 3, None, None, Some(0));
    let interpolator =
        PeriodicInterpolator::new(LagrangeKernel::new(neighbours), [n; 3], [width; 3], [0.0; 3])
            .unwrap();

    // Partial sums over plain slabs, reduced over the ranks
    let mut partial = vec![0.0; nparticles];
    init_result_array(&mut partial, nparticles, 1);
    let slab = SlabField::new(&d, &data).unwrap();
    interpolator.apply(&slab, &positions, 3, &mut partial);
    let mut expected = vec![0.0; nparticles];
    world.all_reduce_sum(&partial, &mut expected);

    // Owners alone, reading their ghosts
    let me = Communicator::rank(&world);
    let owners = positions
        .chunks_exact(3)
        .map(|position| d.owner(interpolator.map_to_cell(position[2], 2).0))
        .collect::<Vec<_>>();
    let layout = DomainDecomposition::<f64, _>::new(&[n, n, n], &world).unwrap();
    let mut buffer = FieldBuffer::new(layout, neighbours + 1).unwrap();
    buffer.refresh(&data).unwrap();

    let mut owned = vec![0.0; nparticles];
    interpolator.apply_selected(&buffer.view(), &positions, 3, &mut owned, |p| owners[p] == me);
    let mut found = vec![0.0; nparticles];
    world.all_reduce_sum(&owned, &mut found);

    let error = expected
        .iter()
        .zip(found.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    assert!(error < 1e-12, "halo interpolation differs by {}", error);

    if me == 0 {
        println!("...test_halo_interpolation passed");
    }
}

#[cfg(not(feature = "mpi"))]
fn main() {}
