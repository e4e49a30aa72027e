//! Chunked, sparsity-aware array container
//!
//! Arrays of any rank are stored in an HDF5 file as 1-D datasets with bounded
//! chunk sizes and an `original_shape` attribute. All-zero chunks are never
//! written and read back as zeros. Sparse tensors are stored as
//! `indices`/`values` pairs under a group carrying `dense_shape`. String
//! lists, index lists and index tables are small contiguous datasets.
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array2;
//! use templatefit_container::{write_chunked, Container, ContainerReader};
//!
//! let container = Container::create("fit.hdf5")?;
//! let norm = Array2::<f64>::ones((10, 3));
//! let nbytes = write_chunked(&norm, container.root(), "hnorm", 4 * 1024 * 1024)?;
//! assert_eq!(nbytes, 240);
//! container.close()?;
//!
//! let reader = ContainerReader::open("fit.hdf5")?;
//! let back = reader.read_dense::<f64>("hnorm")?;
//! assert_eq!(back.shape(), &[10, 3]);
//! # Ok::<(), templatefit_container::Error>(())
//! ```

pub mod chunked;
pub mod element;
pub mod error;
pub mod file;
pub mod reader;
pub mod sparse;
pub mod tables;

pub use chunked::{chunk_len, write_chunked, ORIGINAL_SHAPE_ATTR};
pub use element::Element;
pub use error::{Error, Result};
pub use file::{
    is_hdf5_file, Container, ContainerOptions, Group, DEFAULT_COMPRESSION_LEVEL, HDF5_SIGNATURE,
};
pub use reader::{ContainerReader, DatasetInfo};
pub use sparse::{write_sparse, SparseTensor, DENSE_SHAPE_ATTR};
pub use tables::{write_fixed, write_ragged, write_strings, write_vector};
