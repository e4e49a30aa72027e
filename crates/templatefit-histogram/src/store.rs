//! Histogram sources keyed by (process, variation)

use crate::ops::HistogramOps;
use crate::types::Histogram;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use templatefit_core::{Error, Result};
use tracing::{debug, trace};

/// A source of histograms keyed by process and variation name
pub trait HistogramStore {
    /// Fetch a histogram; an absent key is an error
    fn get(&self, process: &str, variation: &str) -> Result<Histogram>;

    /// Whether the key is present
    fn contains(&self, process: &str, variation: &str) -> bool;
}

/// Per-sample normalization `lumi * 1000 * xsec / sum_weights`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    /// Integrated luminosity in fb⁻¹
    pub lumi: f64,
    /// Sample cross section in pb
    pub xsec: f64,
    /// Sum of generated event weights
    pub sum_weights: f64,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            lumi: 1.0,
            xsec: 1.0,
            sum_weights: 1000.0,
        }
    }
}

impl Normalization {
    /// Create a normalization
    pub fn new(lumi: f64, xsec: f64, sum_weights: f64) -> Self {
        Self {
            lumi,
            xsec,
            sum_weights,
        }
    }

    /// The scale factor applied to every template of the sample
    pub fn factor(&self) -> Result<f64> {
        if !(self.sum_weights != 0.0 && self.sum_weights.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "sum of generated weights must be finite and non-zero, got {}",
                self.sum_weights
            )));
        }
        Ok(self.lumi * 1000.0 * self.xsec / self.sum_weights)
    }
}

/// A store view that scales every fetched histogram by a constant
pub struct Scaled<'a, S: ?Sized> {
    inner: &'a S,
    factor: f64,
}

impl<'a, S: HistogramStore + ?Sized> Scaled<'a, S> {
    /// Wrap a store with a fixed scale factor
    pub fn new(inner: &'a S, factor: f64) -> Self {
        Self { inner, factor }
    }

    /// The applied factor
    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl<S: HistogramStore + ?Sized> HistogramStore for Scaled<'_, S> {
    fn get(&self, process: &str, variation: &str) -> Result<Histogram> {
        Ok(self.inner.get(process, variation)?.scaled(self.factor))
    }

    fn contains(&self, process: &str, variation: &str) -> bool {
        self.inner.contains(process, variation)
    }
}

/// One histogram of a JSON snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEntry {
    process: String,
    variation: String,
    histogram: Histogram,
}

/// In-memory histogram store, keeping insertion order
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    histograms: IndexMap<(String, String), Histogram>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a histogram
    pub fn insert(
        &mut self,
        process: impl Into<String>,
        variation: impl Into<String>,
        histogram: Histogram,
    ) -> Option<Histogram> {
        self.histograms
            .insert((process.into(), variation.into()), histogram)
    }

    /// Number of stored histograms
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    /// Iterate over `(process, variation)` keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.histograms.keys().map(|(p, v)| (p.as_str(), v.as_str()))
    }

    /// Load a snapshot: a JSON list of `{process, variation, histogram}`
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let entries: Vec<SnapshotEntry> = serde_json::from_reader(reader)?;
        let mut store = Self::new();
        for entry in entries {
            entry.histogram.validate()?;
            if store
                .insert(entry.process.clone(), entry.variation.clone(), entry.histogram)
                .is_some()
            {
                return Err(Error::InvalidInput(format!(
                    "snapshot lists ({}, {}) twice",
                    entry.process, entry.variation
                )));
            }
        }
        debug!(histograms = store.len(), "loaded histogram snapshot");
        Ok(store)
    }

    /// Load a snapshot file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_json_reader(BufReader::new(file))
    }

    /// Write the store as a snapshot
    pub fn to_json_writer<W: Write>(&self, writer: W) -> Result<()> {
        let entries: Vec<SnapshotEntry> = self
            .histograms
            .iter()
            .map(|((process, variation), histogram)| SnapshotEntry {
                process: process.clone(),
                variation: variation.clone(),
                histogram: histogram.clone(),
            })
            .collect();
        serde_json::to_writer(writer, &entries)?;
        Ok(())
    }

    /// Write the store to a snapshot file
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.to_json_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl HistogramStore for MemoryStore {
    fn get(&self, process: &str, variation: &str) -> Result<Histogram> {
        trace!(process, variation, "fetching histogram");
        self.histograms
            .get(&(process.to_string(), variation.to_string()))
            .cloned()
            .ok_or_else(|| Error::missing_histogram(process, variation))
    }

    fn contains(&self, process: &str, variation: &str) -> bool {
        self.histograms
            .contains_key(&(process.to_string(), variation.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Axis;
    use ndarray::{ArrayD, IxDyn};

    fn sample() -> Histogram {
        Histogram::new(
            "nominal",
            vec![Axis::regular("x", 2, 0.0, 2.0).unwrap()],
            ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0, 2.0]).unwrap(),
            Some(ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0, 2.0]).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_key_is_error() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get("signal", "nominal"),
            Err(Error::MissingHistogram { .. })
        ));
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = MemoryStore::new();
        assert!(store.insert("signal", "nominal", sample()).is_none());
        assert!(store.contains("signal", "nominal"));
        assert!(!store.contains("signal", "up"));
        assert_eq!(store.get("signal", "nominal").unwrap(), sample());
        assert_eq!(store.keys().collect::<Vec<_>>(), vec![("signal", "nominal")]);
    }

    #[test]
    fn test_scaled_view() {
        let mut store = MemoryStore::new();
        store.insert("signal", "nominal", sample());
        let norm = Normalization::new(2.0, 3.0, 6000.0);
        let factor = norm.factor().unwrap();
        assert!((factor - 1.0).abs() < 1e-12);

        let scaled = Scaled::new(&store, 4.0);
        let h = scaled.get("signal", "nominal").unwrap();
        assert_eq!(h.values()[[1]], 8.0);
        assert_eq!(h.variances().unwrap()[[1]], 32.0);
    }

    #[test]
    fn test_zero_sum_weights_rejected() {
        assert!(Normalization::new(1.0, 1.0, 0.0).factor().is_err());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut store = MemoryStore::new();
        store.insert("signal", "nominal", sample());
        store.insert("signal", "mass_var", sample().scaled(1.1));

        let mut buffer = Vec::new();
        store.to_json_writer(&mut buffer).unwrap();
        let back = MemoryStore::from_json_reader(buffer.as_slice()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(
            back.keys().collect::<Vec<_>>(),
            vec![("signal", "nominal"), ("signal", "mass_var")]
        );
        assert_eq!(back.get("signal", "nominal").unwrap(), sample());
    }

    #[test]
    fn test_snapshot_rejects_duplicates() {
        let mut store = MemoryStore::new();
        store.insert("signal", "nominal", sample());
        let mut buffer = Vec::new();
        store.to_json_writer(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let doubled = format!("[{0},{0}]", &text[1..text.len() - 1]);
        assert!(MemoryStore::from_json_reader(doubled.as_bytes()).is_err());
    }
}
