mod exports;
pub use exports::*;

pub mod types;
pub mod index;
pub mod error;
pub mod kernel;
pub mod grid;
pub mod trajectory;
pub mod system_model;
pub mod dcf;
pub mod fft;
pub mod image;
pub mod recon;
pub mod config;
pub mod preprocess;
pub mod collaborator;
pub mod io;
