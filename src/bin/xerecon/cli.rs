/// Command line interface for `xerecon` executable
#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "xerecon",
    about = "Gridding reconstruction of radial 3-D k-space data",
)]
pub (super) struct Cli {
    /// Maximum number of rayon threads
    #[clap(short = 'j', long, default_value = "4", global = true)]
    pub threads: usize,

    #[clap(subcommand)]
    pub (super) command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub (super) enum Command {

    /// Reconstruct one image per configured pass from a k-space file
    Recon {
        /// k-space file (XEKS format)
        input: PathBuf,

        /// TOML reconstruction config; built-in defaults if absent
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// Directory in which magnitude images are written, one per pass
        #[clap(short, long)]
        out: PathBuf,

        /// Bias-field correction executable; correction is skipped if absent
        #[clap(long)]
        bias_field: Option<String>,

        /// Arguments of the bias-field executable, with `{image}`, `{mask}`,
        /// `{output}` and `{side_output}` placeholders
        #[clap(long = "bias-field-arg", allow_hyphen_values = true)]
        bias_field_args: Vec<String>,
    },

    /// Write a simulated point-source acquisition on radial spokes
    Simulate {
        /// k-space output file (XEKS format)
        #[clap(short, long)]
        out: PathBuf,

        #[clap(long, default_value = "1000")]
        n_projections: usize,

        #[clap(long, default_value = "64")]
        n_points: usize,

        /// Standard deviation of the complex Gaussian noise added to each sample
        #[clap(long, default_value = "0")]
        noise: f64,

        /// Position of the point source, in voxels from the image centre
        #[clap(long, value_parser = parse_triplet, default_value = "0,0,0")]
        offset: (f64, f64, f64),

        /// Seed of the noise generator
        #[clap(long, default_value = "0")]
        seed: u64,
    },
}

fn parse_triplet(s: &str) -> Result<(f64, f64, f64), String> {
    let v = s.split(',')
             .map(|x| x.trim().parse::<f64>().map_err(|e| format!("`{x}`: {e}")))
             .collect::<Result<Vec<_>, _>>()?;
    match v[..] {
        [x, y, z] => Ok((x, y, z)),
        _ => Err(format!("expected three comma-separated numbers, got `{s}`")),
    }
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::path::PathBuf;
