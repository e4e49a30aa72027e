//! HDF5 output file and groups
//!
//! A [`Container`] owns one HDF5 file opened for writing. Datasets are created
//! through [`Group`], which carries the deflate level applied to chunked
//! datasets.

use crate::error::{Error, Result};
use hdf5::types::VarLenUnicode;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default deflate level for chunked datasets
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 4;

/// First bytes of every HDF5 file without a user block
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// Options for a new container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerOptions {
    /// Deflate level for chunked datasets, `None` stores them raw
    pub compression_level: Option<u8>,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            compression_level: Some(DEFAULT_COMPRESSION_LEVEL),
        }
    }
}

impl ContainerOptions {
    /// Set the deflate level
    pub fn with_compression_level(mut self, level: Option<u8>) -> Self {
        self.compression_level = level;
        self
    }
}

/// A freshly created HDF5 file
#[derive(Debug)]
pub struct Container {
    path: PathBuf,
    file: hdf5::File,
    root: Group,
}

impl Container {
    /// Create a container with default options
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(path, ContainerOptions::default())
    }

    /// Create a container
    ///
    /// An existing HDF5 file at `path` is truncated; any other existing path
    /// is an error.
    pub fn create_with(path: impl AsRef<Path>, options: ContainerOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(level) = options.compression_level {
            if level > 9 {
                return Err(Error::Format(format!("deflate level {level} out of range 0-9")));
            }
        }
        if path.exists() && !is_hdf5_file(path)? {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        }
        let file = hdf5::File::create(path)?;
        let root = Group {
            inner: file.group("/")?,
            compression_level: options.compression_level,
        };
        Ok(Self {
            path: path.to_path_buf(),
            file,
            root,
        })
    }

    /// The root group
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Location on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Flush and close the file
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    /// Close the file and delete it from disk
    pub fn remove(self) -> Result<()> {
        let Self { path, file, root } = self;
        drop(root);
        drop(file);
        fs::remove_file(&path)?;
        Ok(())
    }
}

/// Whether `path` is a regular file starting with the HDF5 signature
pub fn is_hdf5_file(path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    let mut head = [0u8; 8];
    let mut file = fs::File::open(path)?;
    match file.read_exact(&mut head) {
        Ok(()) => Ok(head == HDF5_SIGNATURE),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// A group of the container being written
#[derive(Debug, Clone)]
pub struct Group {
    inner: hdf5::Group,
    compression_level: Option<u8>,
}

impl Group {
    /// Absolute name inside the file
    pub fn name(&self) -> String {
        self.inner.name()
    }

    /// Deflate level for chunked datasets
    pub fn compression_level(&self) -> Option<u8> {
        self.compression_level
    }

    /// Create a child group with the same compression setting
    pub fn create_group(&self, name: &str) -> Result<Group> {
        Ok(Group {
            inner: self.inner.create_group(name)?,
            compression_level: self.compression_level,
        })
    }

    /// Underlying HDF5 group
    pub fn hdf5(&self) -> &hdf5::Group {
        &self.inner
    }

    /// Store a shape as a 1-D `i64` attribute
    pub fn set_shape_attr(&self, key: &str, shape: &[usize]) -> Result<()> {
        write_shape_attr(&self.inner, key, shape)
    }

    /// Store a string attribute
    pub fn set_str_attr(&self, key: &str, value: &str) -> Result<()> {
        let value = to_var_len_unicode(value)?;
        self.inner
            .new_attr::<VarLenUnicode>()
            .create(key)?
            .write_scalar(&value)?;
        Ok(())
    }
}

pub(crate) fn write_shape_attr(location: &hdf5::Location, key: &str, shape: &[usize]) -> Result<()> {
    let dims = shape
        .iter()
        .map(|&d| i64::try_from(d).map_err(|_| Error::Format(format!("dimension {d} exceeds i64"))))
        .collect::<Result<Vec<i64>>>()?;
    let attr = location.new_attr::<i64>().shape((dims.len(),)).create(key)?;
    if !dims.is_empty() {
        attr.write_raw(&dims)?;
    }
    Ok(())
}

pub(crate) fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::Format(format!("string {value:?} cannot be stored: {e}")))
}
