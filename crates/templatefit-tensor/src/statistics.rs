//! Statistical tensors: log-kappa, Barlow-Beeston factors and pseudo-data

use ndarray::{Array1, ArrayView1, Zip};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};
use templatefit_core::{Error, Result};
use tracing::debug;

/// Relative variation assigned where a log-ratio is undefined
pub const LOGK_EPSILON: f64 = 1e-3;

/// `ln(variation / nominal)`, or `ln(1e-3)` unless both have the same strict sign
#[inline]
pub fn log_kappa(variation: f64, nominal: f64) -> f64 {
    if variation * nominal > 0.0 {
        (variation / nominal).ln()
    } else {
        LOGK_EPSILON.ln()
    }
}

/// `(logkavg, logkhalfdiff)` of one bin
///
/// The down log-ratio enters with its sign flipped. Both are zero where the
/// nominal yield is zero.
#[inline]
pub fn log_kappa_pair(down: f64, up: f64, nominal: f64) -> (f64, f64) {
    if nominal == 0.0 {
        return (0.0, 0.0);
    }
    let down = -log_kappa(down, nominal);
    let up = log_kappa(up, nominal);
    (0.5 * (up + down), 0.5 * (up - down))
}

/// Barlow-Beeston factors `sumw² / sumw2`, 1 where `sumw` is zero
pub fn kstat(sumw: ArrayView1<f64>, sumw2: ArrayView1<f64>) -> Result<Array1<f64>> {
    if sumw.len() != sumw2.len() {
        return Err(Error::size_mismatch(sumw.len(), sumw2.len(), "sumw2"));
    }
    Ok(Zip::from(&sumw)
        .and(&sumw2)
        .map_collect(|&w, &w2| if w == 0.0 { 1.0 } else { w * w / w2 }))
}

/// Pseudo-data `x + Poisson(x)` from a seeded generator
///
/// The Poisson noise is added on top of the Asimov value. Bins with `x == 0`
/// stay at zero; negative or non-finite bins are rejected.
pub fn poisson_pseudodata(asimov: ArrayView1<f64>, seed: u64) -> Result<Array1<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    debug!("Generating pseudo-data for {} bins with seed {}", asimov.len(), seed);
    asimov
        .iter()
        .enumerate()
        .map(|(bin, &x)| {
            if !x.is_finite() || x < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "cannot draw pseudo-data around {x} in bin {bin}"
                )));
            }
            if x == 0.0 {
                return Ok(0.0);
            }
            let poisson = Poisson::new(x)
                .map_err(|e| Error::Computation(format!("Poisson({x}) in bin {bin}: {e}")))?;
            Ok(x + poisson.sample(&mut rng))
        })
        .collect::<Result<Vec<_>>>()
        .map(Array1::from)
}
