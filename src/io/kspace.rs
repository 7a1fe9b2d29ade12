//! Binary k-space files: a radial acquisition's samples, with their
//! coordinates, in one little-endian stream.
//!
//! ```text
//! "XEKS"  n_projections: u32  n_points: u32
//! n_projections * n_points × { re: f32  im: f32  kx: f32  ky: f32  kz: f32 }
//! ```
//! Samples are stored projection-major.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use binrw::{binrw, BinReaderExt, BinResult, BinWrite};
use ndarray::{Array2, Array3};

use crate::error::InputError;
use crate::preprocess::Acquisition;
use crate::types::C64;

#[binrw]
#[brw(little, magic = b"XEKS")]
#[derive(Debug, Clone, PartialEq)]
pub struct KSpaceFile {
    pub n_projections: u32,
    pub n_points: u32,
    #[br(count = n_projections as usize * n_points as usize)]
    pub samples: Vec<Sample>,
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub re: f32,
    pub im: f32,
    pub k: [f32; 3],
}

impl KSpaceFile {

    pub fn read_from_file(path: &Path) -> BinResult<Self> {
        let mut file = BufReader::new(File::open(path)?);
        file.read_le()
    }

    pub fn write_to_file(&self, path: &Path) -> BinResult<()> {
        let mut file = BufWriter::new(File::create(path)?);
        self.write_le(&mut file)
    }

    pub fn into_acquisition(self) -> Result<Acquisition, InputError> {
        let (np, nk) = (self.n_projections as usize, self.n_points as usize);
        if self.samples.len() != np * nk {
            return Err(InputError::AcquisitionShape { data: [np, nk], trajectory: [self.samples.len(), 1, 3] })
        }
        let data = Array2::from_shape_fn((np, nk), |(p, i)| {
            let s = self.samples[p * nk + i];
            C64::new(s.re.into(), s.im.into())
        });
        let trajectory = Array3::from_shape_fn((np, nk, 3), |(p, i, c)| {
            f64::from(self.samples[p * nk + i].k[c])
        });
        Acquisition::new(data, trajectory)
    }
}

impl From<&Acquisition> for KSpaceFile {
    fn from(acquisition: &Acquisition) -> Self {
        let (data, trajectory) = acquisition.flatten();
        let samples = data
            .iter()
            .zip(trajectory.iter())
            .map(|(v, k)| Sample { re: v.re as f32, im: v.im as f32, k: k.map(|c| c as f32) })
            .collect();
        Self {
            n_projections: acquisition.n_projections() as u32,
            n_points: acquisition.n_points() as u32,
            samples,
        }
    }
}
