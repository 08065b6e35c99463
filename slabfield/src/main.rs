//! Advect tracers through a uniform velocity field on in-process ranks and report how far they
//! drift from the exact trajectories.
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use flexi_logger::Logger;
use log::{info, warn};
use slabfield::{
    config::RunConfig,
    decomposition::DomainDecomposition,
    field::FieldBuffer,
    helpers::{particles_fixture, sample_field},
    interpolation::{LagrangeKernel, PeriodicInterpolator},
    parallel::{run_spmd, LocalCommunicator},
    particles::{ParticleState, RawChunkStore, Tracers},
    traits::{parallel::Communicator, types::Result},
};

/// Struct for parsing command-line arguments
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// YAML run configuration, defaults are used when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of in-process ranks
    #[arg(long)]
    nprocs: Option<usize>,

    /// Number of steps
    #[arg(long)]
    iterations: Option<usize>,

    /// Directory receiving the final tracer state
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Largest distance between a tracer and its exact position, on one rank.
fn advect(config: &RunConfig, output: Option<&PathBuf>, comm: LocalCommunicator) -> Result<f64> {
    let [nx, ny, nz] = config.grid;
    let decomposition = DomainDecomposition::<f64, _>::new(&[nz, ny, nx, 3], &comm)?;
    let source = sample_field(
        &decomposition,
        config.step_width(),
        config.box_offset,
        |_, value| value.copy_from_slice(&config.velocity),
    );
    let velocity = FieldBuffer::new(decomposition, config.margin)?;

    let upper = [0, 1, 2].map(|axis| config.box_offset[axis] + config.box_width[axis]);
    let state = ParticleState::from_root(&comm, config.nparticles, config.ncomponents, || {
        particles_fixture(
            config.nparticles,
            config.ncomponents,
            Some(config.box_offset),
            Some(upper),
            Some(config.seed),
        )
    })?;
    let initial = state.clone();

    let interpolator = PeriodicInterpolator::new(
        LagrangeKernel::new(config.interp_neighbours),
        config.grid,
        config.box_width,
        config.box_offset,
    )?;

    let mut tracers = Tracers::new(state, velocity, interpolator, config.dt)?;
    for _ in 0..config.iterations {
        tracers.step(&source)?;
    }

    if let Some(directory) = output {
        tracers.checkpoint(&RawChunkStore::new(directory, "tracers"), config.chunk_size)?;
    }

    let elapsed = config.iterations as f64 * config.dt;
    let drift = (0..config.nparticles)
        .flat_map(|particle| {
            let start = initial.position(particle);
            let end = tracers.state().position(particle);
            (0..3).map(move |axis| (start[axis], end[axis]))
        })
        .zip(config.velocity.iter().cycle())
        .map(|((start, end), v)| (end - start - elapsed * v).abs())
        .fold(0.0, f64::max);

    if comm.rank() == 0 {
        info!(
            "rank 0 owns {} of {} tracers",
            tracers.residency().owned_by(0).count(),
            config.nparticles
        );
    }
    Ok(drift)
}

fn main() {
    let _logger = Logger::try_with_env_or_str("info")
        .and_then(|logger| logger.start())
        .map_err(|e| eprintln!("logging disabled: {}", e))
        .ok();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match RunConfig::from_path(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },
        None => RunConfig::default(),
    };
    if let Some(nprocs) = args.nprocs {
        config.nprocs = nprocs;
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Some(directory) = &args.output {
        if let Err(e) = std::fs::create_dir_all(directory) {
            eprintln!("cannot create {}: {}", directory.display(), e);
            std::process::exit(1);
        }
    }

    info!(
        "advecting {} tracers on a {:?} grid over {} ranks for {} steps",
        config.nparticles, config.grid, config.nprocs, config.iterations
    );

    let start = Instant::now();
    let results = run_spmd(config.nprocs, |comm| {
        advect(&config, args.output.as_ref(), comm)
    });
    let runtime = start.elapsed().as_millis();

    let mut drift = 0.0f64;
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Ok(d) => drift = drift.max(d),
            Err(e) => {
                warn!("rank {} failed: {}", rank, e);
                std::process::exit(1);
            }
        }
    }

    info!("done in {} ms, largest drift {:e}", runtime, drift);
}
