//! Coordinate-list (sparse) datasets

use crate::chunked::write_chunked;
use crate::error::{Error, Result};
use crate::file::Group;
use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, Dimension, IxDyn};
use tracing::debug;

/// Group attribute holding the dense shape of a sparse dataset
pub const DENSE_SHAPE_ATTR: &str = "dense_shape";

/// Non-zero entries of a dense array in coordinate form
#[derive(Debug, Clone, PartialEq)]
pub struct SparseTensor {
    /// One row of coordinates per entry, `[nnz, ndim]`
    indices: Array2<i32>,
    /// Entry values, `[nnz]`
    values: Array1<f64>,
    /// Shape of the dense array
    dense_shape: Vec<usize>,
}

impl SparseTensor {
    /// Assemble from parts, checking their shapes agree
    pub fn new(indices: Array2<i32>, values: Array1<f64>, dense_shape: Vec<usize>) -> Result<Self> {
        if indices.nrows() != values.len() || indices.ncols() != dense_shape.len() {
            return Err(Error::Format(format!(
                "sparse indices {:?} do not match {} values of rank {}",
                indices.shape(),
                values.len(),
                dense_shape.len()
            )));
        }
        for row in indices.rows() {
            for (&coord, &dim) in row.iter().zip(&dense_shape) {
                if coord < 0 || coord as usize >= dim {
                    return Err(Error::Format(format!(
                        "sparse index {row} out of bounds for shape {dense_shape:?}"
                    )));
                }
            }
        }
        Ok(Self {
            indices,
            values,
            dense_shape,
        })
    }

    /// Collect the non-zero entries of `dense` in row-major order
    pub fn from_dense(dense: &ArrayD<f64>) -> Result<Self> {
        let ndim = dense.ndim();
        let mut coords = Vec::new();
        let mut values = Vec::new();
        for (idx, &value) in dense.indexed_iter() {
            if value != 0.0 {
                for &i in idx.slice() {
                    coords.push(
                        i32::try_from(i)
                            .map_err(|_| Error::Format(format!("index {i} exceeds i32")))?,
                    );
                }
                values.push(value);
            }
        }
        let nnz = values.len();
        Ok(Self {
            indices: Array2::from_shape_vec((nnz, ndim), coords)?,
            values: Array1::from_vec(values),
            dense_shape: dense.shape().to_vec(),
        })
    }

    /// Expand back to a dense array
    pub fn to_dense(&self) -> ArrayD<f64> {
        let mut dense = ArrayD::zeros(IxDyn(&self.dense_shape));
        for (row, &value) in self.indices.rows().into_iter().zip(self.values.iter()) {
            let idx: Vec<usize> = row.iter().map(|&i| i as usize).collect();
            dense[idx.as_slice()] = value;
        }
        dense
    }

    /// Coordinates, `[nnz, ndim]`
    pub fn indices(&self) -> ArrayView2<'_, i32> {
        self.indices.view()
    }

    /// Values, `[nnz]`
    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    /// Dense shape
    pub fn dense_shape(&self) -> &[usize] {
        &self.dense_shape
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }
}

/// Write `tensor` as a sub-group `name` with chunked `indices` and `values`
///
/// Returns the raw bytes of both parts.
pub fn write_sparse(
    tensor: &SparseTensor,
    group: &Group,
    name: &str,
    max_chunk_bytes: usize,
) -> Result<u64> {
    let sub = group.create_group(name)?;
    let mut nbytes = write_chunked(&tensor.indices, &sub, "indices", max_chunk_bytes)?;
    nbytes += write_chunked(&tensor.values, &sub, "values", max_chunk_bytes)?;
    sub.set_shape_attr(DENSE_SHAPE_ATTR, &tensor.dense_shape)?;
    debug!(
        "{}: {} non-zero entries of dense shape {:?}",
        name,
        tensor.nnz(),
        tensor.dense_shape
    );
    Ok(nbytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::Container;

    #[test]
    fn test_from_dense() {
        let dense =
            ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![0.0, 1.5, 0.0, 0.0, 0.0, -2.0]).unwrap();
        let sparse = SparseTensor::from_dense(&dense).unwrap();
        assert_eq!(sparse.nnz(), 2);
        assert_eq!(sparse.indices().row(0).to_vec(), vec![0, 1]);
        assert_eq!(sparse.indices().row(1).to_vec(), vec![1, 2]);
        assert_eq!(sparse.values().to_vec(), vec![1.5, -2.0]);
        assert_eq!(sparse.to_dense(), dense);
    }

    #[test]
    fn test_new_validates() {
        let indices = Array2::from_shape_vec((1, 2), vec![0, 5]).unwrap();
        let values = Array1::from_vec(vec![1.0]);
        assert!(SparseTensor::new(indices.clone(), values.clone(), vec![2, 3]).is_err());
        assert!(SparseTensor::new(indices.clone(), values.clone(), vec![2]).is_err());
        assert!(SparseTensor::new(indices, values, vec![2, 6]).is_ok());
    }

    #[test]
    fn test_write_sparse_layout() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::create(dir.path().join("s.hdf5")).unwrap();
        let dense = ArrayD::from_shape_vec(IxDyn(&[4]), vec![0.0, 1.0, 0.0, 2.0]).unwrap();
        let sparse = SparseTensor::from_dense(&dense).unwrap();
        let nbytes = write_sparse(&sparse, container.root(), "hnorm_sparse", 1024).unwrap();
        // two i32 coordinates and two f64 values
        assert_eq!(nbytes, 2 * 4 + 2 * 8);

        let sub = container.root().hdf5().group("hnorm_sparse").unwrap();
        let indices = sub.dataset("indices").unwrap();
        assert_eq!(indices.read_raw::<i32>().unwrap(), vec![1, 3]);
        let values = sub.dataset("values").unwrap();
        assert_eq!(values.read_raw::<f64>().unwrap(), vec![1.0, 2.0]);
        let shape = sub.attr(DENSE_SHAPE_ATTR).unwrap().read_raw::<i64>().unwrap();
        assert_eq!(shape, vec![4]);
    }
}
