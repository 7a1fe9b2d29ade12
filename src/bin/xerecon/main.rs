mod cli;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    rayon::ThreadPoolBuilder::new().num_threads(args.threads).build_global()?;

    match args.command {
        Command::Recon { input, config, out, bias_field, bias_field_args } => {
            let bias_field = match bias_field {
                Some(program) => BiasField::External(ExternalProcess::new(program, bias_field_args)),
                None          => BiasField::Skip,
            };
            recon(&input, config.as_deref(), &out, &bias_field)
        }
        Command::Simulate { out, n_projections, n_points, noise, offset, seed } =>
            simulate(&out, n_projections, n_points, noise, offset, seed),
    }
}

fn recon(input: &Path, config: Option<&Path>, out: &Path, bias_field: &BiasField) -> Result<(), Box<dyn Error>> {
    let config = match config {
        Some(path) => read_config_file(path)?,
        None       => Config::default(),
    };
    // Make sure that results can be written before starting the computation
    create_dir_all(out)?;

    let acquisition = KSpaceFile::read_from_file(input)?
        .into_acquisition()?
        .truncate(config.trajectory.n_skip_start, config.trajectory.n_skip_end)?
        .scale_trajectory(config.trajectory.scale);
    info!(projections = acquisition.n_projections(), points = acquisition.n_points(), "read {}", input.display());
    let (data, trajectory) = acquisition.flatten();

    let progress = ProgressBar::new_spinner().with_message(format!("{} passes", config.passes.len()));
    progress.set_style(ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] reconstructing {msg}")?);
    progress.enable_steady_tick(Duration::from_millis(200));
    let images = reconstruct_passes(&data, &trajectory, &config)?;
    progress.finish_and_clear();

    for (name, image) in images {
        let magnitude = magnitude(&image);
        let mask = Array3::ones(magnitude.dim());
        let corrected = bias_field.run(&magnitude, &mask)?;
        let path = out.join(format!("{name}.raw"));
        raw::write_volume(&corrected.image, &path)?;
        if let BiasField::External(_) = bias_field {
            raw::write_volume(&corrected.side_output, &out.join(format!("{name}_bias_field.raw")))?;
        }
        println!("Wrote {}", path.display());
    }
    Ok(())
}

/// A point source observed on radial spokes: every sample has unit magnitude,
/// with a phase encoding the source's position.
fn simulate(out: &Path, n_projections: usize, n_points: usize, noise: f64, offset: (f64, f64, f64), seed: u64) -> Result<(), Box<dyn Error>> {
    let spokes = Radial { n_projections, n_points, max_radius: 0.5 };
    let trajectory = Trajectory::from_sampling(&spokes);
    let noise = Normal::new(0.0, noise)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let (x, y, z) = offset;
    let data = Array2::from_shape_vec(
        (n_projections, n_points),
        trajectory
            .iter()
            .map(|[kx, ky, kz]| {
                let phase = -2.0 * PI * (kx * x + ky * y + kz * z);
                C64::from_polar(1.0, phase) + C64::new(noise.sample(&mut rng), noise.sample(&mut rng))
            })
            .collect(),
    )?;
    let coordinates = Array3::from_shape_fn((n_projections, n_points, 3), |(p, i, c)| trajectory[p * n_points + i][c]);
    let acquisition = Acquisition::new(data, coordinates)?;
    KSpaceFile::from(&acquisition).write_to_file(out)?;
    println!("Wrote {} samples to {}", trajectory.len(), out.display());
    Ok(())
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::error::Error;
use std::f64::consts::PI;
use std::fs::create_dir_all;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, Array3};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use xerecon::{
    collaborator::{BiasField, Collaborator, ExternalProcess},
    config::{read_config_file, Config},
    image::magnitude,
    io::{kspace::KSpaceFile, raw},
    preprocess::Acquisition,
    recon::reconstruct_passes,
    trajectory::{Radial, Trajectory},
    types::C64,
};
use cli::{Cli, Command};
