use float_eq::assert_float_eq;
use pretty_assertions::assert_eq;
use rstest::rstest;

use xerecon::image::{centre_index, magnitude, peak};
use xerecon::{
    reconstruct, reconstruct_with, ConfigurationError, Coordinate, Error, InputError, Method, Radial, ReconModel,
    ReconParams, Sampling, Shells, C64,
};

const IMAGE_SIZE: usize = 8;
const OVERGRID: usize = 3;
const SHARPNESS: f64 = 0.32;
const EXTENT: f64 = 3.0 * SHARPNESS;
const DCF_ITERATIONS: usize = 20;

/// Concentric shells reaching well inside the oversampled grid, so that no
/// kernel footprint is clipped
fn shells() -> Vec<Coordinate> {
    Shells { n_shells: 6, points_per_shell: 300, max_radius: 0.3 }.coordinates()
}

fn params() -> ReconParams {
    ReconParams::gaussian(SHARPNESS, EXTENT, OVERGRID, IMAGE_SIZE, DCF_ITERATIONS).unwrap()
}

#[rstest(/**/ image_size, overgrid_factor,
         case(8, 3),
         case(7, 3),
         case(6, 2),
)]
fn output_is_a_cube_of_the_requested_size(image_size: usize, overgrid_factor: usize) {
    let trajectory = shells();
    let data = vec![C64::new(1.0, 0.0); trajectory.len()];
    let image = reconstruct(&data, &trajectory, SHARPNESS, EXTENT, overgrid_factor, image_size, 5).unwrap();
    assert_eq!(image.dim(), (image_size, image_size, image_size));
}

// Uniform unit data is the transform of a point source at the image centre.
// Its reconstruction at the centre is the sum of the density compensation
// weights: the DC value of the compensated data.
#[rstest(/**/ amplitude, case(1.0), case(2.5))]
fn point_source_reconstructs_to_dc_value(amplitude: f64) {
    let trajectory = shells();
    let data = vec![C64::new(amplitude, 0.0); trajectory.len()];
    let image = reconstruct(&data, &trajectory, SHARPNESS, EXTENT, OVERGRID, IMAGE_SIZE, DCF_ITERATIONS).unwrap();

    let model = ReconModel::new(&trajectory, &params()).unwrap();
    let reference = amplitude * model.weights().iter().sum::<f64>();

    let centre = centre_index(IMAGE_SIZE);
    assert_float_eq!(image[centre].norm(), reference, rmax <= 0.05);
    let (brightest, _) = peak(&image).unwrap();
    assert_eq!(brightest, centre);
}

// Kernel extent as used by the configured passes: 9 × sharpness, so that
// footprints of the outermost samples reach the edge of the grid
#[test]
fn point_source_reconstructs_to_dc_value_with_wide_kernel_support() {
    let (image_size, sharpness) = (16, 0.32);
    let trajectory = Shells { n_shells: 8, points_per_shell: 400, max_radius: 0.45 }.coordinates();
    let data = vec![C64::new(1.0, 0.0); trajectory.len()];
    let params = ReconParams::gaussian(sharpness, 9.0 * sharpness, OVERGRID, image_size, DCF_ITERATIONS).unwrap();
    let model = ReconModel::new(&trajectory, &params).unwrap();
    let image = model.reconstruct(&data).unwrap();
    let reference = model.weights().iter().sum::<f64>();

    let centre = centre_index(image_size);
    assert_float_eq!(image[centre].norm(), reference, rmax <= 0.05);
    let (brightest, _) = peak(&image).unwrap();
    assert_eq!(brightest, centre);
}

// Larger sharpness boosts the density compensation of the outermost
// samples, which narrows the point spread function
#[test]
fn point_spread_narrows_as_sharpness_grows() {
    let image_size = 16;
    let trajectory = Radial { n_projections: 2000, n_points: 16, max_radius: 0.5 }.coordinates();
    let data = vec![C64::new(1.0, 0.0); trajectory.len()];
    let [c, _, _] = centre_index(image_size);
    let spread = |sharpness: f64| {
        let image = reconstruct(&data, &trajectory, sharpness, 9.0 * sharpness, OVERGRID, image_size, DCF_ITERATIONS).unwrap();
        let image = magnitude(&image);
        image[[c + 1, c, c]] / image[[c, c, c]]
    };
    let spreads: Vec<f64> = [0.14, 0.2, 0.32].into_iter().map(spread).collect();
    for pair in spreads.windows(2) {
        assert!(pair[1] < pair[0], "point spread did not narrow: {spreads:?}");
    }
}

// Support far larger than the grid is clipped to the grid: the result is an
// image or an error, never an abort
#[test]
fn kernel_support_beyond_the_grid() {
    let data = [C64::new(1.0, 0.0); 2];
    let trajectory = [[0.0; 3], [0.1, 0.0, 0.0]];
    match reconstruct(&data, &trajectory, SHARPNESS, 1.0e4, OVERGRID, 4, 1) {
        Ok(image) => assert_eq!(image.dim(), (4, 4, 4)),
        Err(Error::NumericDegeneracy { .. }) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn point_source_image_is_symmetric() {
    let trajectory = shells();
    let data = vec![C64::new(1.0, 0.0); trajectory.len()];
    let image = magnitude(&reconstruct(&data, &trajectory, SHARPNESS, EXTENT, OVERGRID, IMAGE_SIZE, DCF_ITERATIONS).unwrap());
    let [c, _, _] = centre_index(IMAGE_SIZE);
    for d in 1..3 {
        let reference = image[[c + d, c, c]];
        assert_float_eq!(image[[c - d, c, c]], reference, rmax <= 0.05);
        assert!(image[[c, c, c]] > reference);
    }
}

#[test]
fn empty_data_is_an_input_error() {
    let result = reconstruct(&[], &[], SHARPNESS, EXTENT, OVERGRID, IMAGE_SIZE, DCF_ITERATIONS);
    assert!(matches!(result, Err(Error::Input(InputError::Empty))));
}

#[test]
fn mismatched_lengths_are_an_input_error() {
    let trajectory: Vec<Coordinate> = shells().into_iter().take(99).collect();
    let data = vec![C64::new(1.0, 0.0); 100];
    let result = reconstruct(&data, &trajectory, SHARPNESS, EXTENT, OVERGRID, IMAGE_SIZE, DCF_ITERATIONS);
    assert!(matches!(result, Err(Error::Input(InputError::LengthMismatch { data: 100, trajectory: 99 }))));
}

#[test]
fn reconstruction_is_reproducible() {
    let trajectory = shells();
    let data: Vec<C64> = (0..trajectory.len())
        .map(|i| C64::from_polar(1.0, 0.1 * i as f64))
        .collect();
    let run = || reconstruct(&data, &trajectory, SHARPNESS, EXTENT, OVERGRID, IMAGE_SIZE, DCF_ITERATIONS).unwrap();
    assert_eq!(run(), run());
}

#[test]
fn invalid_parameters_are_configuration_errors() {
    let trajectory = shells();
    let data = vec![C64::new(1.0, 0.0); trajectory.len()];
    let result = reconstruct(&data, &trajectory, -1.0, EXTENT, OVERGRID, IMAGE_SIZE, DCF_ITERATIONS);
    assert!(matches!(result, Err(Error::Configuration(ConfigurationError::Kernel(_)))));
    let result = reconstruct(&data, &trajectory, SHARPNESS, EXTENT, 0, IMAGE_SIZE, DCF_ITERATIONS);
    assert!(matches!(result, Err(Error::Configuration(ConfigurationError::OvergridFactor(0)))));
}

#[test]
fn compressed_sensing_is_not_available() {
    let trajectory = shells();
    let data = vec![C64::new(1.0, 0.0); trajectory.len()];
    let result = reconstruct_with(Method::CompressedSensing, &data, &trajectory, &params());
    assert!(matches!(result, Err(Error::Configuration(ConfigurationError::UnsupportedMethod(_)))));
}
