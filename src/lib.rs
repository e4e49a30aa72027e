//! # templatefit
//!
//! Builds the tensors of a binned maximum-likelihood fit from histogram
//! templates and writes them to a chunked, sparsity-aware container.
//!
//! The workspace is split into:
//!
//! - [`base`]: unified error type and one-decimal bin labels
//! - [`histogram`]: named-axis histograms, template stores and pre-transforms
//! - [`tensor`]: grouping engine and tensor assembly
//! - [`container`]: chunked dense and sparse datasets in an HDF5 file
//!
//! This crate adds the driver that writes an [`Assembly`] in the layout a fit
//! reads: string and index tables first, then every tensor.
//!
//! ## Quick start
//!
//! ```no_run
//! use templatefit::prelude::*;
//!
//! let store = MemoryStore::from_json_file("templates.json")?;
//! let config = AssemblyConfig::from_json_file("assembly.json")?;
//! let summary = assemble_and_write(&store, &config, "fit.hdf5", WriterOptions::default())?;
//! println!("{} bytes in {} tensors", summary.total_bytes, summary.tensors.len());
//! # Ok::<(), templatefit::Error>(())
//! ```

pub mod error;
pub mod writer;

pub use error::{Error, Result};
pub use writer::{
    aligned_chunk_bytes, FitWriter, TensorEncoding, WriteSummary, WriterOptions,
    DEFAULT_CHUNK_BYTES,
};

// Re-export workspace crates
pub use templatefit_container as container;
pub use templatefit_core as base;
pub use templatefit_histogram as histogram;
pub use templatefit_tensor as tensor;

pub use templatefit_tensor::{Assembly, AssemblyConfig, TensorAssembler};

use std::path::Path;
use templatefit_histogram::HistogramStore;

/// Assemble the tensors from `store` and write them to a fresh container
pub fn assemble_and_write<S: HistogramStore + ?Sized>(
    store: &S,
    config: &AssemblyConfig,
    path: impl AsRef<Path>,
    options: WriterOptions,
) -> Result<WriteSummary> {
    options.validate()?;
    let assembly = TensorAssembler::new(store, config).assemble()?;
    FitWriter::new(options).write(assembly, path)
}

/// Common imports
pub mod prelude {
    pub use crate::{assemble_and_write, Error, FitWriter, Result, TensorEncoding, WriteSummary, WriterOptions};
    pub use templatefit_container::ContainerReader;
    pub use templatefit_histogram::{Axis, Histogram, HistogramOps, HistogramStore, MemoryStore, Normalization};
    pub use templatefit_tensor::{
        Assembly, AssemblyConfig, AxisNames, BackgroundSpec, SystematicGroupSpec, TensorAssembler,
        Transform,
    };
}
