//! Operations on histograms
//!
//! Every binary operation aligns the right-hand side onto the axes of the
//! left-hand side by axis name, so operands may store their axes in any order
//! and the right-hand side may lack axes the left-hand side has.

use crate::types::{Axis, Histogram};
use ndarray::{ArrayD, Axis as ArrayAxis, IxDyn, Zip};
use templatefit_core::{Error, Result};

/// Operations that can be performed on histograms
pub trait HistogramOps: Sized {
    /// Multiply values by `factor` and variances by `factor²`
    fn scaled(&self, factor: f64) -> Self;

    /// Bin-wise ratio; bins with a zero denominator are set to 1
    ///
    /// The result carries no variances.
    fn divide(&self, denominator: &Self) -> Result<Self>;

    /// Bin-wise product
    ///
    /// Variances propagate as `a²·var(b) + b²·var(a)` when both operands
    /// carry them, otherwise the result carries none.
    fn multiply(&self, other: &Self) -> Result<Self>;

    /// Reorder axes to the given names, which must name every axis once
    fn permute(&self, order: &[&str]) -> Result<Self>;

    /// Fix one axis at a bin index, dropping that axis
    fn select(&self, axis: &str, index: usize) -> Result<Self>;

    /// Sum over the named axes, dropping them
    fn project_out(&self, axes: &[&str]) -> Result<Self>;

    /// Broadcast onto a superset of axes, matched by name
    fn broadcast_to(&self, axes: &[Axis]) -> Result<Self>;
}

impl HistogramOps for Histogram {
    fn scaled(&self, factor: f64) -> Self {
        Histogram::from_parts(
            self.name().to_string(),
            self.axes().to_vec(),
            self.values().mapv(|v| v * factor),
            self.variances().map(|var| var.mapv(|v| v * factor * factor)),
        )
    }

    fn divide(&self, denominator: &Self) -> Result<Self> {
        let den = align_values(
            denominator.values(),
            denominator.axes(),
            self.axes(),
            denominator.name(),
        )?;
        let mut ratio = self.values().clone();
        Zip::from(&mut ratio).and(&den).for_each(|n, &d| {
            *n = if d == 0.0 { 1.0 } else { *n / d };
        });
        Histogram::new(self.name(), self.axes().to_vec(), ratio, None)
    }

    fn multiply(&self, other: &Self) -> Result<Self> {
        let b = align_values(other.values(), other.axes(), self.axes(), other.name())?;
        let a = self.values();
        let values = a * &b;
        let variances = match (self.variances(), other.variances()) {
            (Some(var_a), Some(var_b)) => {
                let var_b = align_values(var_b, other.axes(), self.axes(), other.name())?;
                let mut out = ArrayD::zeros(a.raw_dim());
                Zip::from(&mut out)
                    .and(a)
                    .and(&b)
                    .and(var_a)
                    .and(&var_b)
                    .for_each(|o, &x, &y, &vx, &vy| *o = x * x * vy + y * y * vx);
                Some(out)
            }
            _ => None,
        };
        Histogram::new(self.name(), self.axes().to_vec(), values, variances)
    }

    fn permute(&self, order: &[&str]) -> Result<Self> {
        if order.len() != self.axes().len() {
            return Err(Error::InvalidParameter(format!(
                "permutation {order:?} of {} must name all {} axes",
                self.name(),
                self.axes().len()
            )));
        }
        let target = order
            .iter()
            .map(|name| self.axis(name).cloned())
            .collect::<Result<Vec<_>>>()?;
        self.broadcast_to(&target)
    }

    fn select(&self, axis: &str, index: usize) -> Result<Self> {
        let k = self.axis_index(axis)?;
        let len = self.axes()[k].len();
        if index >= len {
            return Err(Error::InvalidParameter(format!(
                "index {index} out of range for axis {axis} of length {len}"
            )));
        }
        let mut axes = self.axes().to_vec();
        axes.remove(k);
        let values = self.values().index_axis(ArrayAxis(k), index).to_owned();
        let variances = self
            .variances()
            .map(|var| var.index_axis(ArrayAxis(k), index).to_owned());
        Histogram::new(self.name(), axes, values, variances)
    }

    fn project_out(&self, axes: &[&str]) -> Result<Self> {
        let mut positions = axes
            .iter()
            .map(|name| self.axis_index(name))
            .collect::<Result<Vec<_>>>()?;
        positions.sort_unstable();
        positions.dedup();

        let mut remaining = self.axes().to_vec();
        let mut values = self.values().clone();
        let mut variances = self.variances().cloned();
        // Highest position first so earlier positions stay valid
        for &k in positions.iter().rev() {
            remaining.remove(k);
            values = values.sum_axis(ArrayAxis(k));
            variances = variances.map(|var| var.sum_axis(ArrayAxis(k)));
        }
        Histogram::new(self.name(), remaining, values, variances)
    }

    fn broadcast_to(&self, axes: &[Axis]) -> Result<Self> {
        let values = align_values(self.values(), self.axes(), axes, self.name())?;
        let variances = self
            .variances()
            .map(|var| align_values(var, self.axes(), axes, self.name()))
            .transpose()?;
        Histogram::new(self.name(), axes.to_vec(), values, variances)
    }
}

/// Lay out `values` (stored over `from`) over the axes `to`
///
/// Every axis of `from` must appear in `to` with the same length; axes of `to`
/// missing from `from` are broadcast.
fn align_values(
    values: &ArrayD<f64>,
    from: &[Axis],
    to: &[Axis],
    context: &str,
) -> Result<ArrayD<f64>> {
    let mut positions = Vec::with_capacity(from.len());
    for axis in from {
        let pos = to
            .iter()
            .position(|t| t.name == axis.name)
            .ok_or_else(|| Error::axis_not_found(&axis.name, &format!("target of {context}")))?;
        if to[pos].len() != axis.len() {
            return Err(Error::shape_mismatch(
                &[to[pos].len()],
                &[axis.len()],
                &format!("axis {} of {context}", axis.name),
            ));
        }
        positions.push(pos);
    }

    let mut perm: Vec<usize> = (0..from.len()).collect();
    perm.sort_by_key(|&i| positions[i]);

    let mut expanded = vec![1usize; to.len()];
    for &i in &perm {
        expanded[positions[i]] = from[i].len();
    }
    let flat: Vec<f64> = values.view().permuted_axes(perm).iter().copied().collect();
    let compact = ArrayD::from_shape_vec(IxDyn(&expanded), flat)?;

    let target: Vec<usize> = to.iter().map(Axis::len).collect();
    let view = compact
        .broadcast(IxDyn(&target))
        .ok_or_else(|| Error::shape_mismatch(&target, &expanded, context))?;
    Ok(view.to_owned())
}
