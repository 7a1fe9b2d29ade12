/// Read / write float arrays and volumes as raw little-endian binary

use std::fs::File;
use std::io::{Write, Read, BufWriter, BufReader};
use std::path::Path;

use ndarray::{Array3, ShapeBuilder};

type IORes<T> = std::io::Result<T>;

pub fn write(data: impl Iterator<Item = f32>, path: &Path) -> IORes<()> {
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    for datum in data {
        buf.write_all(&datum.to_le_bytes())?;
    }
    buf.flush()
}

pub fn read<'a>(path: &Path) -> IORes<impl Iterator<Item = IORes<f32>> + 'a> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    let mut buffer = [0; 4];

    Ok(std::iter::from_fn(move || {
        use std::io::ErrorKind::UnexpectedEof;
        match buf.read_exact(&mut buffer) {
            Ok(()) => Some(Ok(f32::from_le_bytes(buffer))),
            Err(e) if e.kind() == UnexpectedEof => None,
            Err(e) => Some(Err(e)),
        }
    }))
}

/// Write a volume in x-fastest order, converting to `f32`
pub fn write_volume(volume: &Array3<f64>, path: &Path) -> IORes<()> {
    // The reversed-axes view iterates with x fastest, whatever the memory order
    write(volume.t().iter().map(|&v| v as f32), path)
}

/// Read an x-fastest volume of known dimensions
pub fn read_volume(path: &Path, (nx, ny, nz): (usize, usize, usize)) -> IORes<Array3<f64>> {
    let data = read(path)?
        .map(|v| v.map(f64::from))
        .collect::<IORes<Vec<_>>>()?;
    let found = data.len();
    Array3::from_shape_vec((nx, ny, nz).f(), data).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} holds {found} values, expected {nx}x{ny}x{nz}", path.display()),
        )
    })
}
