use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use slabfield::decomposition::DomainDecomposition;
use slabfield::field::SlabField;
use slabfield::helpers::{particles_fixture, sample_field};
use slabfield::interpolation::{init_result_array, LagrangeKernel, PeriodicInterpolator};
use slabfield::parallel::LocalCommunicator;

fn interpolation_f64(c: &mut Criterion) {
    let comm = LocalCommunicator::solo();
    let n = 64;
    let width = 2.0 * std::f64::consts::PI;
    let step = width / n as f64;

    let d = DomainDecomposition::<f64, _>::new(&[n, n, n, 3], &comm).unwrap();
    let data = sample_field(&d, [step; 3], [0.0; 3], |[x, y, z], v| {
        v[0] = x.sin() * z.cos();
        v[1] = y.cos();
        v[2] = (x + y + z).sin();
    });
    let field = SlabField::new(&d, &data).unwrap();

    let nparticles = 100000;
    let positions = particles_fixture(nparticles, 3, None, Some([width; 3]), Some(0));
    let mut results = vec![0.0; 3 * nparticles];

    let mut group = c.benchmark_group("Interpolation f64");
    group
        .sample_size(10)
        .measurement_time(Duration::from_secs(10));

    for neighbours in [1, 2, 3] {
        let interpolator =
            PeriodicInterpolator::new(LagrangeKernel::new(neighbours), [n; 3], [width; 3], [0.0; 3])
                .unwrap();

        group.bench_function(format!("{} particles, {} neighbours", nparticles, neighbours), |b| {
            b.iter(|| {
                init_result_array(&mut results, nparticles, 3);
                interpolator.apply(&field, &positions, 3, &mut results);
            })
        });
    }
    group.finish();
}

criterion_group!(interpolation, interpolation_f64);
criterion_main!(interpolation);
