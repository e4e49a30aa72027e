//! Named-axis histograms for template building
//!
//! This crate provides the histogram interface the tensor assembler works
//! against:
//! - [`Axis`] and [`Histogram`]: values and optional variances over named axes
//! - [`HistogramOps`]: arithmetic aligned by axis name (division maps a zero
//!   denominator to 1)
//! - [`transforms`]: eta decorrelation, reco transport and mirroring of
//!   systematic variations
//! - [`HistogramStore`]: lookup by (process, variation), with an in-memory
//!   implementation loadable from JSON snapshots

pub mod ops;
pub mod store;
pub mod transforms;
pub mod types;

// Re-export main types
pub use ops::HistogramOps;
pub use store::{HistogramStore, MemoryStore, Normalization, Scaled};
pub use transforms::{decorrelate_in_eta, mirror, reco_transport, DOWN_UP_LABELS};
pub use types::{Axis, AxisBins, Histogram};
