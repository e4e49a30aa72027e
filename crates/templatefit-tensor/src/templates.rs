//! Canonical layout of templates
//!
//! Every template is pivoted so that its process rows come first, then the
//! realized nuisance axes, then the unrolled reco bins, then the down/up pair:
//! `[rows, extra, bins, tail]`. Signal rows run over (rapidity, qt, helicity),
//! backgrounds have a single row. The selected charge is sliced out on the way.

use crate::config::AxisNames;
use crate::grouping::SignalId;
use ndarray::{Array2, Array4, ArrayView2, Axis as ArrayAxis};
use templatefit_core::{Decimal1, Error, Result};
use templatefit_histogram::{Axis, Histogram, HistogramOps};

/// Tolerance when matching the selected charge against axis centers
const CHARGE_TOLERANCE: f64 = 1e-6;

/// Which leading axes a template carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Rapidity, qt, helicity and charge
    Signal,
    /// Charge only
    Background,
}

/// Binning of the signal nominal, shared by every other template
#[derive(Debug, Clone)]
pub struct Binning {
    names: AxisNames,
    rapidity: Axis,
    qt: Axis,
    helicity: Axis,
    charge: Axis,
    reco: Vec<Axis>,
    charge_index: usize,
    y_labels: Vec<Decimal1>,
    qt_labels: Vec<Decimal1>,
}

impl Binning {
    /// Take the binning from the signal nominal
    pub fn from_signal_nominal(
        nominal: &Histogram,
        names: &AxisNames,
        selected_charge: f64,
    ) -> Result<Self> {
        let rapidity = nominal.axis(&names.rapidity)?.clone();
        let qt = nominal.axis(&names.qt)?.clone();
        let helicity = nominal.axis(&names.helicity)?.clone();
        let charge = nominal.axis(&names.charge)?.clone();
        let reco = names
            .reco
            .iter()
            .map(|name| nominal.axis(name).cloned())
            .collect::<Result<Vec<_>>>()?;

        let charge_index = charge
            .centers()?
            .iter()
            .position(|c| (c - selected_charge).abs() < CHARGE_TOLERANCE)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "charge {selected_charge} is not a bin of axis {charge} in {}",
                    nominal.name()
                ))
            })?;

        let y_labels = Decimal1::round_all(&rapidity.centers()?)?;
        let qt_labels = Decimal1::round_all(&qt.centers()?)?;
        Ok(Self {
            names: names.clone(),
            rapidity,
            qt,
            helicity,
            charge,
            reco,
            charge_index,
            y_labels,
            qt_labels,
        })
    }

    /// Rounded rapidity bin centers
    pub fn y_labels(&self) -> &[Decimal1] {
        &self.y_labels
    }

    /// Rounded qt bin centers
    pub fn qt_labels(&self) -> &[Decimal1] {
        &self.qt_labels
    }

    /// Helicity labels
    pub fn helicities(&self) -> Vec<String> {
        self.helicity.labels()
    }

    pub fn nhel(&self) -> usize {
        self.helicity.len()
    }

    /// Number of unrolled reco bins
    pub fn nbins(&self) -> usize {
        self.reco.iter().map(Axis::len).product()
    }

    /// Number of signal processes
    pub fn nsignals(&self) -> usize {
        self.rapidity.len() * self.qt.len() * self.helicity.len()
    }

    /// Signal processes in row order: rapidity outermost, helicity innermost
    pub fn signal_ids(&self) -> Vec<SignalId> {
        let helicities = self.helicities();
        let mut ids = Vec::with_capacity(self.nsignals());
        for &y in &self.y_labels {
            for &qt in &self.qt_labels {
                for hel in &helicities {
                    ids.push(SignalId::new(hel.clone(), y, qt));
                }
            }
        }
        ids
    }

    fn leading(&self, role: Role) -> Vec<&Axis> {
        match role {
            Role::Signal => vec![&self.rapidity, &self.qt, &self.helicity, &self.charge],
            Role::Background => vec![&self.charge],
        }
    }

    /// Lay out a template as `[rows, extra, bins, tail]` at the selected charge
    ///
    /// With a `tail` axis (the down/up pair) it must have two bins; without,
    /// the tail dimension has length one. Axes that are neither leading, reco
    /// nor tail are realized nuisance axes and keep their histogram order.
    pub fn pivot(&self, hist: &Histogram, role: Role, tail: Option<&str>) -> Result<Pivoted> {
        let leading = self.leading(role);
        let mut order: Vec<&str> = leading.iter().map(|a| a.name.as_str()).collect();

        let is_fixed = |name: &str| {
            order.contains(&name)
                || self.reco.iter().any(|a| a.name == name)
                || tail == Some(name)
        };
        let extras: Vec<Axis> = hist
            .axes()
            .iter()
            .filter(|a| !is_fixed(&a.name))
            .cloned()
            .collect();
        if let Some(stray) = extras.iter().find(|a| self.names.is_canonical(&a.name)) {
            return Err(Error::InvalidInput(format!(
                "axis {} of {} is not expected here",
                stray.name,
                hist.name()
            )));
        }

        for axis in leading.iter().copied().chain(self.reco.iter()) {
            let found = hist.axis(&axis.name)?;
            if found.len() != axis.len() {
                return Err(Error::shape_mismatch(
                    &[axis.len()],
                    &[found.len()],
                    &format!("axis {} of {}", axis.name, hist.name()),
                ));
            }
        }
        let tail_len = match tail {
            Some(name) => {
                let len = hist.axis(name)?.len();
                if len != 2 {
                    return Err(Error::shape_mismatch(
                        &[2],
                        &[len],
                        &format!("down/up axis {name} of {}", hist.name()),
                    ));
                }
                2
            }
            None => 1,
        };

        order.extend(extras.iter().map(|a| a.name.as_str()));
        order.extend(self.reco.iter().map(|a| a.name.as_str()));
        order.extend(tail);

        let permuted = hist.permute(&order)?;
        let charge_pos = leading.len() - 1;
        let at_charge = permuted
            .values()
            .index_axis(ArrayAxis(charge_pos), self.charge_index);

        let rows: usize = leading[..charge_pos].iter().map(|a| a.len()).product();
        let extra: usize = extras.iter().map(Axis::len).product();
        let values = at_charge
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((rows, extra, self.nbins(), tail_len))?;
        Ok(Pivoted { values, extras })
    }

    /// Leading `ny × nqt` bins of the cross-section table, in signal row order
    pub fn xsec_row(&self, xsec: &Histogram) -> Result<Vec<f64>> {
        let names = [
            self.rapidity.name.as_str(),
            self.qt.name.as_str(),
            self.helicity.name.as_str(),
        ];
        let table = xsec.permute(&names)?;
        let shape = table.shape();
        let (ny, nqt, nhel) = (self.rapidity.len(), self.qt.len(), self.nhel());
        if shape[0] < ny || shape[1] < nqt || shape[2] != nhel {
            return Err(Error::shape_mismatch(
                &[ny, nqt, nhel],
                &shape,
                &format!("cross-section table {}", xsec.name()),
            ));
        }
        let values = table.values();
        let mut row = Vec::with_capacity(self.nsignals());
        for iy in 0..ny {
            for iq in 0..nqt {
                for ih in 0..nhel {
                    row.push(values[[iy, iq, ih].as_slice()]);
                }
            }
        }
        Ok(row)
    }
}

/// A template in canonical layout
#[derive(Debug, Clone)]
pub struct Pivoted {
    /// `[rows, extra, bins, tail]`
    pub values: Array4<f64>,
    /// Realized nuisance axes, in histogram order
    pub extras: Vec<Axis>,
}

impl Pivoted {
    /// `[rows, bins]` view of a nominal template
    pub fn nominal_rows(&self) -> Result<ArrayView2<'_, f64>> {
        let (_, extra, _, tail) = self.values.dim();
        if extra != 1 || tail != 1 || !self.extras.is_empty() {
            let names: Vec<&str> = self.extras.iter().map(|a| a.name.as_str()).collect();
            return Err(Error::InvalidInput(format!(
                "nominal template carries unexpected axes {names:?}"
            )));
        }
        Ok(self
            .values
            .index_axis(ArrayAxis(3), 0)
            .index_axis_move(ArrayAxis(1), 0))
    }

    /// Owned `[rows, bins]` copy of a nominal template
    pub fn into_nominal_rows(self) -> Result<Array2<f64>> {
        Ok(self.nominal_rows()?.to_owned())
    }
}

/// One label per realized nuisance, in row-major order over `extras`
///
/// `mass_var` with an axis `SF eta` of centers `0.5, 1.5` gives
/// `mass_var_SFeta_0.5`, `mass_var_SFeta_1.5`.
pub fn nuisance_labels(nuisance: &str, extras: &[Axis]) -> Vec<String> {
    let mut labels = vec![nuisance.to_string()];
    for axis in extras {
        let name: String = axis.name.chars().filter(|c| *c != ' ').collect();
        let name = name.as_str();
        let bins = axis.labels();
        labels = labels
            .iter()
            .flat_map(|prefix| bins.iter().map(move |bin| format!("{prefix}_{name}_{bin}")))
            .collect();
    }
    labels
}
