//! Writing an assembly to a fit container
//!
//! Metadata tables go first, as small contiguous datasets, then every
//! numeric tensor through the chunked (or sparse) writer. Tensors are dropped as soon as they
//! are on disk. If anything fails after the container was created, the
//! partial output is removed.

use crate::error::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use templatefit_container::{
    write_chunked, write_fixed, write_ragged, write_sparse, write_strings, write_vector,
    Container, ContainerOptions, Group, SparseTensor, DEFAULT_COMPRESSION_LEVEL,
};
use templatefit_tensor::{Assembly, IndexGroups, IndexLayout};
use tracing::{debug, info, instrument, warn};

/// Default upper bound on the raw size of one chunk
pub const DEFAULT_CHUNK_BYTES: usize = 4 * 1024 * 1024;

const F64_SIZE: usize = std::mem::size_of::<f64>();

/// On-disk encoding of a large tensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorEncoding {
    /// Flat chunked dataset with `original_shape`
    #[default]
    Dense,
    /// `indices`/`values` sub-group with `dense_shape`
    Sparse,
}

/// Options of the container writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Chunk size bound before alignment to the tensor sizes
    pub chunk_bytes: usize,
    /// Deflate level, `None` writes raw chunks
    pub compression_level: Option<u8>,
    pub norm_encoding: TensorEncoding,
    pub logk_encoding: TensorEncoding,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            compression_level: Some(DEFAULT_COMPRESSION_LEVEL),
            norm_encoding: TensorEncoding::Dense,
            logk_encoding: TensorEncoding::Dense,
        }
    }
}

impl WriterOptions {
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    pub fn with_compression_level(mut self, level: Option<u8>) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_norm_encoding(mut self, encoding: TensorEncoding) -> Self {
        self.norm_encoding = encoding;
        self
    }

    pub fn with_logk_encoding(mut self, encoding: TensorEncoding) -> Self {
        self.logk_encoding = encoding;
        self
    }

    /// Check option ranges
    pub fn validate(&self) -> Result<()> {
        if self.chunk_bytes == 0 {
            return Err(Error::InvalidOption("chunk_bytes must be positive".to_string()));
        }
        if let Some(level) = self.compression_level {
            if level > 9 {
                return Err(Error::InvalidOption(format!(
                    "compression level {level} out of range 0-9"
                )));
            }
        }
        Ok(())
    }
}

/// Chunk size that holds at least one `norm` row and one `logk` row
pub fn aligned_chunk_bytes(default_bytes: usize, nproc: usize, nsyst: usize) -> usize {
    default_bytes
        .max(nproc * F64_SIZE)
        .max(2 * nsyst * F64_SIZE)
}

/// What was written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteSummary {
    pub path: PathBuf,
    /// Raw bytes of all numeric tensors
    pub total_bytes: u64,
    /// Chunk size bound actually used
    pub chunk_bytes: usize,
    pub nbins: usize,
    pub nproc: usize,
    pub nsignals: usize,
    pub nsyst: usize,
    /// Raw bytes per tensor, in write order
    pub tensors: Vec<(String, u64)>,
}

/// Writes assemblies to fit containers
#[derive(Debug, Clone, Default)]
pub struct FitWriter {
    options: WriterOptions,
}

impl FitWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Write `assembly` to a fresh container at `path`
    #[instrument(skip(self, assembly, path), fields(path = %path.as_ref().display()))]
    pub fn write(&self, assembly: Assembly, path: impl AsRef<Path>) -> Result<WriteSummary> {
        self.options.validate()?;
        let path = path.as_ref();
        let container = Container::create_with(
            path,
            ContainerOptions::default().with_compression_level(self.options.compression_level),
        )?;

        let written = self
            .write_contents(assembly, container.root())
            .and_then(|summary| {
                container.flush()?;
                Ok(summary)
            });
        match written {
            Ok(mut summary) => {
                drop(container);
                summary.path = path.to_path_buf();
                info!(
                    "Wrote {} bytes of tensors to {} (chunk size {})",
                    summary.total_bytes,
                    path.display(),
                    summary.chunk_bytes
                );
                Ok(summary)
            }
            Err(err) => {
                if let Err(cleanup) = container.remove() {
                    warn!("Failed to remove partial output {}: {}", path.display(), cleanup);
                }
                Err(err)
            }
        }
    }

    fn write_contents(&self, assembly: Assembly, root: &Group) -> Result<WriteSummary> {
        let Assembly {
            procs,
            signals,
            systs,
            noprofile,
            noconstraint,
            masked_channels,
            nhel,
            groups,
            norm,
            logk,
            sumw,
            sumw2,
            kstat,
            data_obs,
            constraint_weights,
        } = assembly;

        let nbins = sumw.len();
        let chunk_bytes = aligned_chunk_bytes(self.options.chunk_bytes, procs.len(), systs.len());
        if chunk_bytes > self.options.chunk_bytes {
            warn!(
                "Maximum chunk size increased from {} to {} bytes to align with tensor sizes",
                self.options.chunk_bytes, chunk_bytes
            );
        }
        let mut summary = WriteSummary {
            path: PathBuf::new(),
            total_bytes: 0,
            chunk_bytes,
            nbins,
            nproc: procs.len(),
            nsignals: signals.len(),
            nsyst: systs.len(),
            tensors: Vec::new(),
        };

        write_strings(root, "hprocs", &procs)?;
        write_strings(root, "hsignals", &signals)?;
        write_strings(root, "hsysts", &systs)?;
        write_strings(root, "hsystsnoprofile", &noprofile)?;
        write_strings(root, "hsystsnoconstraint", &noconstraint)?;

        write_ragged_groups(root, "syst", &groups.syst)?;
        write_index_groups(root, "charge", &groups.charge, 2)?;
        write_index_groups(root, "pol", &groups.pol, 3)?;
        write_index_groups(root, "hel", &groups.hel, nhel)?;

        write_strings(root, "hsumgroups", &groups.sum.names)?;
        let (sum_idxs, sum_segments) = groups.sum.flatten()?;
        write_vector(root, "hsumgroupsegmentids", &sum_segments)?;
        write_vector(root, "hsumgroupidxs", &sum_idxs)?;

        write_index_groups(root, "chargemeta", &groups.charge_meta, 2)?;
        write_index_groups(root, "ratiometa", &groups.ratio_meta, 2)?;
        write_index_groups(root, "helmeta", &groups.hel_meta, nhel)?;
        write_ragged_groups(root, "reg", &groups.reg)?;

        write_polynomial_regularization(root)?;

        write_strings(root, "hnoigroups", &groups.noi.names)?;
        let (noi_idxs, _) = groups.noi.flatten()?;
        write_vector(root, "hnoigroupidxs", &noi_idxs)?;

        write_strings(root, "hmaskedchans", &masked_channels)?;

        let mut record = |name: &str, nbytes: u64| {
            debug!("{}: {} bytes", name, nbytes);
            summary.total_bytes += nbytes;
            summary.tensors.push((name.to_string(), nbytes));
        };

        record(
            "hconstraintweights",
            write_chunked(&constraint_weights, root, "hconstraintweights", chunk_bytes)?,
        );
        drop(constraint_weights);
        record("hdata_obs", write_chunked(&data_obs, root, "hdata_obs", chunk_bytes)?);
        drop(data_obs);
        record("hkstat", write_chunked(&kstat, root, "hkstat", chunk_bytes)?);
        drop(kstat);
        record("hsumw", write_chunked(&sumw, root, "hsumw", chunk_bytes)?);
        drop(sumw);
        record("hsumw2", write_chunked(&sumw2, root, "hsumw2", chunk_bytes)?);
        drop(sumw2);

        let (name, nbytes) = match self.options.norm_encoding {
            TensorEncoding::Dense => ("hnorm", write_chunked(&norm, root, "hnorm", chunk_bytes)?),
            TensorEncoding::Sparse => {
                let sparse = SparseTensor::from_dense(&norm.into_dyn())?;
                ("hnorm_sparse", write_sparse(&sparse, root, "hnorm_sparse", chunk_bytes)?)
            }
        };
        record(name, nbytes);

        let (name, nbytes) = match self.options.logk_encoding {
            TensorEncoding::Dense => ("hlogk", write_chunked(&logk, root, "hlogk", chunk_bytes)?),
            TensorEncoding::Sparse => {
                let sparse = SparseTensor::from_dense(&logk.into_dyn())?;
                ("hlogk_sparse", write_sparse(&sparse, root, "hlogk_sparse", chunk_bytes)?)
            }
        };
        record(name, nbytes);

        Ok(summary)
    }
}

/// `h{name}groups` and a fixed-width or ragged `h{name}groupidxs`
fn write_index_groups(root: &Group, name: &str, groups: &IndexGroups, empty_width: usize) -> Result<()> {
    write_strings(root, &format!("h{name}groups"), &groups.names)?;
    let idxs = format!("h{name}groupidxs");
    match groups.layout(empty_width)? {
        IndexLayout::Fixed(table) => write_fixed(root, &idxs, &table)?,
        IndexLayout::Ragged(rows) => write_ragged(root, &idxs, &rows)?,
    }
    Ok(())
}

/// `h{name}groups` and a ragged `h{name}groupidxs`
fn write_ragged_groups(root: &Group, name: &str, groups: &IndexGroups) -> Result<()> {
    write_strings(root, &format!("h{name}groups"), &groups.names)?;
    write_ragged(root, &format!("h{name}groupidxs"), &groups.ragged()?)?;
    Ok(())
}

/// Polynomial regularization tables, present but empty
fn write_polynomial_regularization(root: &Group) -> Result<()> {
    let no_names: [&str; 0] = [];
    let no_orders: [i32; 0] = [];
    let no_pairs = Array2::<i32>::zeros((0, 2));
    let no_centers: [Vec<f64>; 0] = [];

    write_strings(root, "hpoly1dreggroups", &no_names)?;
    write_vector(root, "hpoly1dreggroupfirstorder", &no_orders)?;
    write_vector(root, "hpoly1dreggrouplastorder", &no_orders)?;
    write_strings(root, "hpoly1dreggroupnames", &no_names)?;
    write_ragged(root, "hpoly1dreggroupbincenters", &no_centers)?;

    write_strings(root, "hpoly2dreggroups", &no_names)?;
    write_fixed(root, "hpoly2dreggroupfirstorder", &no_pairs)?;
    write_fixed(root, "hpoly2dreggrouplastorder", &no_pairs)?;
    write_fixed(root, "hpoly2dreggroupfullorder", &no_pairs)?;
    write_strings(root, "hpoly2dreggroupnames", &no_names)?;
    write_ragged(root, "hpoly2dreggroupbincenters0", &no_centers)?;
    write_ragged(root, "hpoly2dreggroupbincenters1", &no_centers)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_chunk_bytes() {
        assert_eq!(aligned_chunk_bytes(DEFAULT_CHUNK_BYTES, 10, 10), DEFAULT_CHUNK_BYTES);
        assert_eq!(aligned_chunk_bytes(64, 10, 2), 80);
        assert_eq!(aligned_chunk_bytes(64, 10, 7), 112);
    }

    #[test]
    fn test_options() {
        let options = WriterOptions::default();
        assert_eq!(options.chunk_bytes, 4 * 1024 * 1024);
        assert_eq!(options.compression_level, Some(4));
        assert!(options.validate().is_ok());
        assert!(options.with_chunk_bytes(0).validate().is_err());
        assert!(options.with_compression_level(Some(12)).validate().is_err());

        let parsed: WriterOptions =
            serde_json::from_str(r#"{"logk_encoding": "sparse", "compression_level": null}"#).unwrap();
        assert_eq!(parsed.logk_encoding, TensorEncoding::Sparse);
        assert_eq!(parsed.norm_encoding, TensorEncoding::Dense);
        assert_eq!(parsed.compression_level, None);
    }
}
