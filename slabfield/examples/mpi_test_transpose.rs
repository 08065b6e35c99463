//? mpirun -n {{NPROCESSES}} --features "mpi"

#[cfg(feature = "mpi")]
fn main() {
    use mpi::environment::Universe;
    use slabfield::{
        decomposition::{transpose, DomainDecomposition},
        traits::parallel::Communicator,
    };

    let universe: Universe = mpi::initialize().unwrap();
    let world = universe.world();

    let sizes = [12, 7, 5];
    let a = DomainDecomposition::<f64, _>::new(&sizes, &world).unwrap();
    let b = a.transposed().unwrap();

    // Every element holds its global offset
    let input = (0..a.local_size())
        .map(|offset| {
            let index = a.global_index(offset);
            ((index[0] * sizes[1] + index[1]) * sizes[2] + index[2]) as f64
        })
        .collect::<Vec<_>>();

    let mut middle = vec![0.0; b.local_size()];
    transpose(&a, &b, &input, &mut middle).unwrap();

    for (offset, &value) in middle.iter().enumerate() {
        let index = b.global_index(offset);
        let expected = ((index[2] * sizes[1] + index[1]) * sizes[2] + index[0]) as f64;
        assert_eq!(value, expected);
    }

    let mut back = vec![0.0; a.local_size()];
    transpose(&b, &a, &middle, &mut back).unwrap();
    assert_eq!(back, input);

    if Communicator::rank(&world) == 0 {
        println!("...test_transpose_round_trip passed");
    }
}

#[cfg(not(feature = "mpi"))]
fn main() {}
