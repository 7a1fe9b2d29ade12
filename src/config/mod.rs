pub mod recon;

pub use recon::{read_config_file, Config, KernelConfig, Pass, TrajectoryConfig};
