use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use slabfield::decomposition::{transpose, DomainDecomposition};
use slabfield::parallel::run_spmd;

fn transpose_f32(c: &mut Criterion) {
    let mut group = c.benchmark_group("Transpose f32");
    group
        .sample_size(10)
        .measurement_time(Duration::from_secs(10));

    let sizes = [64, 96, 128];
    for nprocs in [1, 2, 4] {
        group.bench_function(format!("{:?} over {} ranks", sizes, nprocs), |b| {
            b.iter(|| {
                run_spmd(nprocs, |comm| {
                    let source = DomainDecomposition::<f32, _>::new(&sizes, &comm).unwrap();
                    let dest = source.transposed().unwrap();
                    let input = vec![1f32; source.local_size()];
                    let mut output = vec![0f32; dest.local_size()];
                    transpose(&source, &dest, &input, &mut output).unwrap();
                })
            })
        });
    }
    group.finish();
}

criterion_group!(transposes, transpose_f32);
criterion_main!(transposes);
