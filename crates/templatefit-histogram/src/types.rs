//! Core types for histogram representation

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::fmt;
use templatefit_core::{float_label, Error, Result};

/// Binning of a single axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AxisBins {
    /// Numeric bins delimited by increasing edges
    Edges { edges: Vec<f64> },
    /// String categories (helicity components, variation labels, ...)
    Category { labels: Vec<String> },
}

/// A named histogram axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis name, unique within a histogram
    pub name: String,
    /// Bin definition
    #[serde(flatten)]
    pub bins: AxisBins,
}

impl Axis {
    /// Create an axis with `n` equal-width bins on `[lo, hi)`
    pub fn regular(name: impl Into<String>, n: usize, lo: f64, hi: f64) -> Result<Self> {
        if n == 0 || !(hi > lo) {
            return Err(Error::InvalidParameter(format!(
                "regular axis needs n > 0 and hi > lo, got n={n}, [{lo}, {hi})"
            )));
        }
        let width = (hi - lo) / n as f64;
        let edges = (0..=n).map(|i| lo + i as f64 * width).collect();
        Self::variable(name, edges)
    }

    /// Create an axis from explicit bin edges
    pub fn variable(name: impl Into<String>, edges: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if edges.len() < 2 {
            return Err(Error::InvalidParameter(format!(
                "axis {name} needs at least two edges"
            )));
        }
        if edges.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(Error::InvalidParameter(format!(
                "edges of axis {name} must be strictly increasing"
            )));
        }
        Ok(Self {
            name,
            bins: AxisBins::Edges { edges },
        })
    }

    /// Create a categorical axis
    pub fn category<S: Into<String>>(name: impl Into<String>, labels: Vec<S>) -> Self {
        Self {
            name: name.into(),
            bins: AxisBins::Category {
                labels: labels.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        match &self.bins {
            AxisBins::Edges { edges } => edges.len().saturating_sub(1),
            AxisBins::Category { labels } => labels.len(),
        }
    }

    /// Check if the axis has no bins
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bin edges, for numeric axes
    pub fn edges(&self) -> Option<&[f64]> {
        match &self.bins {
            AxisBins::Edges { edges } => Some(edges),
            AxisBins::Category { .. } => None,
        }
    }

    /// Bin centers; fails on categorical axes
    pub fn centers(&self) -> Result<Vec<f64>> {
        match &self.bins {
            AxisBins::Edges { edges } => Ok(edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()),
            AxisBins::Category { .. } => Err(Error::InvalidInput(format!(
                "axis {} is categorical and has no numeric centers",
                self.name
            ))),
        }
    }

    /// Text label of every bin: the category itself, or the printed center
    pub fn labels(&self) -> Vec<String> {
        match &self.bins {
            AxisBins::Edges { edges } => edges
                .windows(2)
                .map(|w| float_label(0.5 * (w[0] + w[1])))
                .collect(),
            AxisBins::Category { labels } => labels.clone(),
        }
    }

    /// Same binning under a different name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bins: self.bins.clone(),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.len())
    }
}

/// A histogram over named axes, holding values and optional variances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Histogram name
    name: String,
    /// Axes, in storage order
    axes: Vec<Axis>,
    /// Bin contents, one array dimension per axis
    values: ArrayD<f64>,
    /// Per-bin variances (sum of squared weights), absent for unweighted storage
    variances: Option<ArrayD<f64>>,
}

impl Histogram {
    /// Create a new histogram, checking that the arrays match the axes
    pub fn new(
        name: impl Into<String>,
        axes: Vec<Axis>,
        values: ArrayD<f64>,
        variances: Option<ArrayD<f64>>,
    ) -> Result<Self> {
        let hist = Self {
            name: name.into(),
            axes,
            values,
            variances,
        };
        hist.validate()?;
        Ok(hist)
    }

    /// Assemble from parts already known to be consistent
    pub(crate) fn from_parts(
        name: String,
        axes: Vec<Axis>,
        values: ArrayD<f64>,
        variances: Option<ArrayD<f64>>,
    ) -> Self {
        Self {
            name,
            axes,
            values,
            variances,
        }
    }

    /// Check axis names are unique and the arrays match the axis lengths
    pub fn validate(&self) -> Result<()> {
        for (i, axis) in self.axes.iter().enumerate() {
            if self.axes[..i].iter().any(|a| a.name == axis.name) {
                return Err(Error::InvalidInput(format!(
                    "histogram {} has duplicate axis {}",
                    self.name, axis.name
                )));
            }
        }
        let expected = self.shape();
        if self.values.shape() != expected.as_slice() {
            return Err(Error::shape_mismatch(
                &expected,
                self.values.shape(),
                &format!("values of histogram {}", self.name),
            ));
        }
        if let Some(variances) = &self.variances {
            if variances.shape() != expected.as_slice() {
                return Err(Error::shape_mismatch(
                    &expected,
                    variances.shape(),
                    &format!("variances of histogram {}", self.name),
                ));
            }
        }
        Ok(())
    }

    /// Get the name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy with a different name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the axes
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Axis names in storage order
    pub fn axis_names(&self) -> Vec<&str> {
        self.axes.iter().map(|a| a.name.as_str()).collect()
    }

    /// Whether an axis with this name exists
    pub fn has_axis(&self, name: &str) -> bool {
        self.axes.iter().any(|a| a.name == name)
    }

    /// Position of a named axis
    pub fn axis_index(&self, name: &str) -> Result<usize> {
        self.axes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| Error::axis_not_found(name, &format!("histogram {}", self.name)))
    }

    /// Look up a named axis
    pub fn axis(&self, name: &str) -> Result<&Axis> {
        self.axis_index(name).map(|i| &self.axes[i])
    }

    /// Array shape implied by the axes
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::len).collect()
    }

    /// Bin contents
    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    /// Bin variances, if stored
    pub fn variances(&self) -> Option<&ArrayD<f64>> {
        self.variances.as_ref()
    }

    /// Total number of bins
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the histogram has no bins
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Split into name, axes, values and variances
    pub fn into_parts(self) -> (String, Vec<Axis>, ArrayD<f64>, Option<ArrayD<f64>>) {
        (self.name, self.axes, self.values, self.variances)
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axes: Vec<String> = self.axes.iter().map(|a| a.to_string()).collect();
        write!(f, "Histogram({}: {})", self.name, axes.join(" x "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_regular_axis() {
        let axis = Axis::regular("mueta", 4, -2.4, 2.4).unwrap();
        assert_eq!(axis.len(), 4);
        let centers = axis.centers().unwrap();
        approx::assert_relative_eq!(centers[0], -1.8, epsilon = 1e-12);
        approx::assert_relative_eq!(centers[3], 1.8, epsilon = 1e-12);
        assert!(Axis::regular("bad", 0, 0.0, 1.0).is_err());
        assert!(Axis::regular("bad", 2, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_variable_axis_rejects_unsorted_edges() {
        assert!(Axis::variable("qt", vec![0.0, 3.0, 2.0]).is_err());
        assert!(Axis::variable("qt", vec![0.0]).is_err());
    }

    #[test]
    fn test_labels() {
        let axis = Axis::variable("charge", vec![-2.0, 0.0, 2.0]).unwrap();
        assert_eq!(axis.labels(), vec!["-1.0", "1.0"]);
        let hel = Axis::category("helicities", vec!["L", "I"]);
        assert_eq!(hel.labels(), vec!["L", "I"]);
        assert!(hel.centers().is_err());
        assert_eq!(hel.len(), 2);
    }

    #[test]
    fn test_histogram_validation() {
        let axes = vec![
            Axis::regular("x", 2, 0.0, 2.0).unwrap(),
            Axis::category("h", vec!["a", "b", "c"]),
        ];
        let ok = Histogram::new("h", axes.clone(), ArrayD::zeros(IxDyn(&[2, 3])), None);
        assert!(ok.is_ok());

        let bad = Histogram::new("h", axes.clone(), ArrayD::zeros(IxDyn(&[3, 2])), None);
        assert!(matches!(bad, Err(Error::ShapeMismatch { .. })));

        let bad_var = Histogram::new(
            "h",
            axes,
            ArrayD::zeros(IxDyn(&[2, 3])),
            Some(ArrayD::zeros(IxDyn(&[2]))),
        );
        assert!(bad_var.is_err());

        let dup = Histogram::new(
            "h",
            vec![Axis::category("a", vec!["x"]), Axis::category("a", vec!["y"])],
            ArrayD::zeros(IxDyn(&[1, 1])),
            None,
        );
        assert!(matches!(dup, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_axis_lookup() {
        let h = Histogram::new(
            "nominal",
            vec![
                Axis::regular("x", 2, 0.0, 2.0).unwrap(),
                Axis::category("h", vec!["a"]),
            ],
            ArrayD::zeros(IxDyn(&[2, 1])),
            None,
        )
        .unwrap();
        assert_eq!(h.axis_index("h").unwrap(), 1);
        assert_eq!(h.axis_names(), vec!["x", "h"]);
        assert!(matches!(h.axis("y"), Err(Error::AxisNotFound { .. })));
        assert_eq!(h.to_string(), "Histogram(nominal: x[2] x h[1])");
    }

    #[test]
    fn test_json_round_trip() {
        let h = Histogram::new(
            "nominal",
            vec![Axis::regular("x", 2, 0.0, 2.0).unwrap()],
            ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0, 2.0]).unwrap(),
            Some(ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0, 4.0]).unwrap()),
        )
        .unwrap();
        let text = serde_json::to_string(&h).unwrap();
        let back: Histogram = serde_json::from_str(&text).unwrap();
        assert_eq!(h, back);
    }
}
