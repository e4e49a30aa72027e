//! Reading a container back

use crate::chunked::ORIGINAL_SHAPE_ATTR;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::sparse::{SparseTensor, DENSE_SHAPE_ATTR};
use hdf5::types::{TypeDescriptor, VarLenArray, VarLenUnicode};
use hdf5::H5Type;
use ndarray::{Array1, Array2, ArrayD, IxDyn};
use std::path::Path;

/// Layout of a stored dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    pub shape: Vec<usize>,
    /// Chunk shape, `None` for contiguous datasets
    pub chunks: Option<Vec<usize>>,
    /// Deflate level, if compressed
    pub deflate: Option<u8>,
    /// Bytes allocated in the file
    pub storage_bytes: u64,
}

/// Read access to a container on disk
#[derive(Debug, Clone)]
pub struct ContainerReader {
    file: hdf5::File,
}

impl ContainerReader {
    /// Open an HDF5 container read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::NotFound(format!("no container at {}", path.display())));
        }
        Ok(Self {
            file: hdf5::File::open(path)?,
        })
    }

    /// Whether a dataset or group exists at `name`
    pub fn contains(&self, name: &str) -> bool {
        self.file.link_exists(name)
    }

    /// Layout of the dataset `name`
    pub fn dataset_info(&self, name: &str) -> Result<DatasetInfo> {
        let dataset = self.dataset(name)?;
        let deflate = dataset.filters().iter().find_map(|filter| match filter {
            hdf5::filters::Filter::Deflate(level) => Some(*level),
            _ => None,
        });
        Ok(DatasetInfo {
            shape: dataset.shape(),
            chunks: dataset.chunk(),
            deflate,
            storage_bytes: dataset.storage_size(),
        })
    }

    /// A 1-D shape attribute of a dataset or group
    pub fn shape_attr(&self, name: &str, key: &str) -> Result<Vec<usize>> {
        let attr = match self.file.group(name) {
            Ok(group) => group.attr(key),
            Err(_) => self.dataset(name)?.attr(key),
        }
        .map_err(|_| Error::NotFound(format!("attribute {key} of {name}")))?;
        if attr.size() == 0 {
            return Ok(Vec::new());
        }
        attr.read_raw::<i64>()?
            .into_iter()
            .map(|d| usize::try_from(d).map_err(|_| Error::Format(format!("{name}: negative dimension {d}"))))
            .collect()
    }

    /// A string attribute of the root group
    pub fn root_str_attr(&self, key: &str) -> Result<String> {
        let attr = self
            .file
            .attr(key)
            .map_err(|_| Error::NotFound(format!("attribute {key}")))?;
        let value: VarLenUnicode = attr.read_scalar()?;
        Ok(value.as_str().to_string())
    }

    /// Contents of a 1-D dataset; unallocated chunks read as zero
    pub fn read_flat<T: Element>(&self, name: &str) -> Result<Vec<T>> {
        let dataset = self.typed_dataset::<T>(name)?;
        if dataset.ndim() != 1 {
            return Err(Error::Format(format!("{name} is not one-dimensional")));
        }
        if dataset.size() == 0 {
            return Ok(Vec::new());
        }
        Ok(dataset.read_raw::<T>()?)
    }

    /// A dense dataset reshaped through its `original_shape` attribute
    pub fn read_dense<T: Element>(&self, name: &str) -> Result<ArrayD<T>> {
        let shape = self.shape_attr(name, ORIGINAL_SHAPE_ATTR)?;
        let flat = self.read_flat::<T>(name)?;
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), flat)?)
    }

    /// A sparse dataset group
    pub fn read_sparse(&self, name: &str) -> Result<SparseTensor> {
        let dense_shape = self.shape_attr(name, DENSE_SHAPE_ATTR)?;
        let indices = self.read_dense::<i32>(&format!("{name}/indices"))?;
        let values = self.read_flat::<f64>(&format!("{name}/values"))?;
        let indices = Array2::from_shape_vec(
            (values.len(), dense_shape.len()),
            indices.iter().copied().collect(),
        )?;
        SparseTensor::new(indices, Array1::from_vec(values), dense_shape)
    }

    /// A variable-length string dataset
    pub fn read_strings(&self, name: &str) -> Result<Vec<String>> {
        let dataset = self.typed_dataset::<VarLenUnicode>(name)?;
        if dataset.size() == 0 {
            return Ok(Vec::new());
        }
        Ok(dataset
            .read_raw::<VarLenUnicode>()?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect())
    }

    /// A dataset of variable-length numeric rows
    pub fn read_ragged<T: Element>(&self, name: &str) -> Result<Vec<Vec<T>>> {
        let dataset = self.typed_dataset::<VarLenArray<T>>(name)?;
        if dataset.size() == 0 {
            return Ok(Vec::new());
        }
        Ok(dataset
            .read_raw::<VarLenArray<T>>()?
            .iter()
            .map(|row| row.as_slice().to_vec())
            .collect())
    }

    /// A fixed-width 2-D table
    pub fn read_fixed<T: Element>(&self, name: &str) -> Result<Array2<T>> {
        let dataset = self.typed_dataset::<T>(name)?;
        let shape = dataset.shape();
        if shape.len() != 2 {
            return Err(Error::Format(format!("{name} is not two-dimensional")));
        }
        if dataset.size() == 0 {
            return Ok(Array2::zeros((shape[0], shape[1])));
        }
        Ok(dataset.read_2d::<T>()?)
    }

    fn dataset(&self, name: &str) -> Result<hdf5::Dataset> {
        self.file
            .dataset(name)
            .map_err(|_| Error::NotFound(name.to_string()))
    }

    /// Open `name` and check its stored datatype is `T`
    fn typed_dataset<T: H5Type>(&self, name: &str) -> Result<hdf5::Dataset> {
        let dataset = self.dataset(name)?;
        let stored = dataset.dtype()?.to_descriptor()?;
        let requested: TypeDescriptor = T::type_descriptor();
        if stored != requested {
            return Err(Error::Format(format!(
                "{name} holds {stored}, requested {requested}"
            )));
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::Container;
    use crate::tables::{write_fixed, write_ragged, write_strings, write_vector};

    #[test]
    fn test_open_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ContainerReader::open(dir.path().join("missing.hdf5")),
            Err(Error::NotFound(_))
        ));
        let text = dir.path().join("plain.txt");
        std::fs::write(&text, "not hdf5").unwrap();
        assert!(ContainerReader::open(&text).is_err());
    }

    #[test]
    fn test_tables_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.hdf5");
        let container = Container::create(&path).unwrap();
        let root = container.root();
        write_strings(root, "names", &["helXsec_L_y_0.2_qt_1.5", "", "ü"]).unwrap();
        write_ragged(root, "rows", &[vec![0i32, 1, 2], vec![], vec![7]]).unwrap();
        write_ragged(root, "centers", &[vec![0.5f64, 1.5]]).unwrap();
        write_vector(root, "flat", &[4i32, 2]).unwrap();
        let table = Array2::from_shape_vec((2, 2), vec![3i32, 4, 5, 6]).unwrap();
        write_fixed(root, "fixed", &table).unwrap();
        root.set_str_attr("note", "x").unwrap();
        container.close().unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        assert_eq!(
            reader.read_strings("names").unwrap(),
            vec!["helXsec_L_y_0.2_qt_1.5", "", "ü"]
        );
        assert_eq!(
            reader.read_ragged::<i32>("rows").unwrap(),
            vec![vec![0, 1, 2], vec![], vec![7]]
        );
        assert_eq!(reader.read_ragged::<f64>("centers").unwrap(), vec![vec![0.5, 1.5]]);
        assert!(reader.read_ragged::<f64>("rows").is_err());
        assert_eq!(reader.read_flat::<i32>("flat").unwrap(), vec![4, 2]);
        assert!(reader.read_flat::<f64>("flat").is_err());
        assert!(reader.read_dense::<i32>("flat").is_err());
        assert_eq!(reader.read_fixed::<i32>("fixed").unwrap(), table);
        assert!(reader.read_strings("fixed").is_err());
        assert_eq!(reader.root_str_attr("note").unwrap(), "x");
        assert!(reader.contains("names"));
        assert!(!reader.contains("missing"));
        assert_eq!(reader.dataset_info("fixed").unwrap().chunks, None);
    }
}
