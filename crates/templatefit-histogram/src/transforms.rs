//! Pre-transforms applied to variation histograms before tensor assembly

use crate::ops::HistogramOps;
use crate::types::{Axis, Histogram};
use ndarray::{stack, ArrayD, Axis as ArrayAxis, Dimension, IxDyn};
use templatefit_core::{Error, Result};

/// Labels of the down/up axis created by [`mirror`]
pub const DOWN_UP_LABELS: [&str; 2] = ["down", "up"];

/// Decorrelate a scale-factor variation in reco eta
///
/// The scale-factor axis `sf_axis` of `variation` is replaced by a copy of the
/// `reco_axis` binning. Entry `(reco = i, sf = i)` takes the raw variation at
/// `(reco = i, sf = 0)`; every other entry takes the nominal, so each new
/// scale-factor bin moves only its own eta slice.
pub fn decorrelate_in_eta(
    nominal: &Histogram,
    variation: &Histogram,
    sf_axis: &str,
    reco_axis: &str,
) -> Result<Histogram> {
    let sf_pos = variation.axis_index(sf_axis)?;
    let reco_pos = variation.axis_index(reco_axis)?;
    if variation.axes()[sf_pos].is_empty() {
        return Err(Error::InvalidInput(format!(
            "scale-factor axis {sf_axis} of {} has no bins",
            variation.name()
        )));
    }

    let mut axes = variation.axes().to_vec();
    axes[sf_pos] = variation.axes()[reco_pos].renamed(sf_axis);

    let base = nominal.broadcast_to(&axes)?;
    let raw = variation.select(sf_axis, 0)?;
    let base_values = base.values();
    let raw_values = raw.values();

    let shape: Vec<usize> = axes.iter().map(Axis::len).collect();
    let values = ArrayD::from_shape_fn(IxDyn(&shape), |idx: IxDyn| {
        let idx = idx.slice();
        if idx[reco_pos] == idx[sf_pos] {
            let mut reduced = idx.to_vec();
            reduced.remove(sf_pos);
            raw_values[reduced.as_slice()]
        } else {
            base_values[idx]
        }
    });
    Histogram::new(variation.name(), axes, values, None)
}

/// Move a generator-level smearing variation onto reco-level yields
///
/// Computes `nominal_reco * (variation / nominal_gensmear)`, with the ratio's
/// zero denominators mapped to 1.
pub fn reco_transport(
    variation: &Histogram,
    nominal_reco: &Histogram,
    nominal_gensmear: &Histogram,
) -> Result<Histogram> {
    let ratio = variation.divide(nominal_gensmear)?;
    ratio.multiply(nominal_reco)
}

/// Symmetrize a one-sided variation
///
/// Returns a histogram with a trailing `down_up_axis` holding
/// `(nominal² / variation, variation)`, built as the ratio histogram
/// `(nominal / variation, variation / nominal)` times the nominal.
pub fn mirror(nominal: &Histogram, variation: &Histogram, down_up_axis: &str) -> Result<Histogram> {
    let nominal = nominal.broadcast_to(variation.axes())?;
    let down = nominal.divide(variation)?;
    let up = variation.divide(&nominal)?;

    let ndim = variation.axes().len();
    let ratios = stack(ArrayAxis(ndim), &[down.values().view(), up.values().view()])?;

    let mut axes = variation.axes().to_vec();
    axes.push(Axis::category(down_up_axis, DOWN_UP_LABELS.to_vec()));
    let ratio = Histogram::new(variation.name(), axes, ratios, None)?;
    ratio.multiply(&nominal)
}
