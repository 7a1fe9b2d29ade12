//! Iterative (Pipe-Menon) density compensation.
//!
//! Radial trajectories sample the centre of k-space far more densely than
//! the periphery. Each sample gets a weight, found by repeatedly dividing the
//! current weights by their own gridded-then-resampled values, until the
//! weighted sampling density is approximately uniform.

use tracing::debug;

use crate::error::{ConfigurationError, Error, Result, Stage};
use crate::system_model::SystemModel;
use crate::types::Weight;

/// One non-negative, finite weight per sample
pub type DensityWeights = Vec<Weight>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterativeDcf {
    pub iterations: usize,
    /// Lower bound on the divisor, protecting against division by zero
    pub epsilon: f64,
    /// Stop early once the largest change, relative to the largest weight,
    /// falls below this
    pub tolerance: Option<f64>,
}

impl Default for IterativeDcf {
    fn default() -> Self { Self { iterations: 20, epsilon: 1e-12, tolerance: None } }
}

impl IterativeDcf {

    pub fn new(iterations: usize) -> Self { Self { iterations, ..Self::default() } }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.epsilon.is_finite() && self.epsilon > 0.0 { Ok(()) }
        else { Err(ConfigurationError::DcfEpsilon(self.epsilon)) }
    }

    /// The infinite sequence of weight vectors, each made by performing one
    /// iteration on the previous one. The starting weights are 1 for every
    /// sample which touches the grid, 0 for the rest.
    pub fn iter<'m>(&self, model: &'m SystemModel) -> impl Iterator<Item = Result<DensityWeights>> + 'm {
        let epsilon = self.epsilon;
        let mut weights = initial_weights(model);
        std::iter::from_fn(move || {
            Some(one_iteration(model, &weights, epsilon).map(|next| {
                weights.clone_from(&next);
                next
            }))
        })
    }

    pub fn compute(&self, model: &SystemModel) -> Result<DensityWeights> {
        self.validate()?;
        let mut weights = initial_weights(model);
        check(&weights)?;
        for (i, next) in self.iter(model).take(self.iterations).enumerate() {
            let next = next?;
            let change = relative_change(&weights, &next);
            debug!(iteration = i + 1, change, "density compensation");
            weights = next;
            if let Some(tolerance) = self.tolerance {
                if change < tolerance { break }
            }
        }
        Ok(weights)
    }
}

fn initial_weights(model: &SystemModel) -> DensityWeights {
    model.supported().into_iter().map(|s| if s { 1.0 } else { 0.0 }).collect()
}

fn one_iteration(model: &SystemModel, weights: &[Weight], epsilon: f64) -> Result<DensityWeights> {
    let density = model.forward(&model.adjoint(weights)?)?;
    let next: DensityWeights = weights
        .iter()
        .zip(density)
        .map(|(w, d)| w / d.max(epsilon))
        .collect();
    check(&next)?;
    Ok(next)
}

fn check(weights: &[Weight]) -> Result<()> {
    if let Some(i) = weights.iter().position(|w| !(w.is_finite() && *w >= 0.0)) {
        return Err(Error::degenerate(Stage::Dcf, format!("weight {i} is {}", weights[i])))
    }
    if !weights.iter().any(|&w| w > 0.0) {
        return Err(Error::degenerate(Stage::Dcf, "no sample contributes to the grid"))
    }
    Ok(())
}

fn relative_change(old: &[Weight], new: &[Weight]) -> f64 {
    let scale = new.iter().cloned().fold(0.0, f64::max);
    let change = old.iter().zip(new).map(|(o, n)| (o - n).abs()).fold(0.0, f64::max);
    if scale > 0.0 { change / scale } else { change }
}
