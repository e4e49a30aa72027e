//! Small metadata datasets: string lists, index lists and index tables
//!
//! These are contiguous, uncompressed and carry no shape attribute.

use crate::element::Element;
use crate::error::Result;
use crate::file::{to_var_len_unicode, Group};
use hdf5::types::{VarLenArray, VarLenUnicode};
use ndarray::Array2;

/// Write a 1-D variable-length UTF-8 string dataset
pub fn write_strings<S: AsRef<str>>(group: &Group, name: &str, items: &[S]) -> Result<()> {
    let values = items
        .iter()
        .map(|s| to_var_len_unicode(s.as_ref()))
        .collect::<Result<Vec<VarLenUnicode>>>()?;
    let dataset = group
        .hdf5()
        .new_dataset::<VarLenUnicode>()
        .shape((values.len(),))
        .create(name)?;
    if !values.is_empty() {
        dataset.write_raw(&values)?;
    }
    Ok(())
}

/// Write a plain 1-D numeric dataset
pub fn write_vector<T: Element>(group: &Group, name: &str, values: &[T]) -> Result<()> {
    let dataset = group
        .hdf5()
        .new_dataset::<T>()
        .shape((values.len(),))
        .create(name)?;
    if !values.is_empty() {
        dataset.write_raw(values)?;
    }
    Ok(())
}

/// Write a 1-D dataset of variable-length numeric rows
pub fn write_ragged<T: Element>(group: &Group, name: &str, rows: &[Vec<T>]) -> Result<()> {
    let values: Vec<VarLenArray<T>> = rows.iter().map(|row| VarLenArray::from_slice(row)).collect();
    let dataset = group
        .hdf5()
        .new_dataset::<VarLenArray<T>>()
        .shape((values.len(),))
        .create(name)?;
    if !values.is_empty() {
        dataset.write_raw(&values)?;
    }
    Ok(())
}

/// Write a fixed-width 2-D table
pub fn write_fixed<T: Element>(group: &Group, name: &str, table: &Array2<T>) -> Result<()> {
    let dataset = group.hdf5().new_dataset::<T>().shape(table.dim()).create(name)?;
    if !table.is_empty() {
        dataset.write(&table.as_standard_layout())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::Container;

    #[test]
    fn test_string_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::create(dir.path().join("t.hdf5")).unwrap();
        write_strings(container.root(), "hprocs", &["a", "bb"]).unwrap();
        write_strings::<&str>(container.root(), "hsystsnoprofile", &[]).unwrap();

        let root = container.root().hdf5();
        let procs = root.dataset("hprocs").unwrap();
        assert_eq!(procs.shape(), vec![2]);
        assert_eq!(procs.chunk(), None);
        let names: Vec<String> = procs
            .read_raw::<VarLenUnicode>()
            .unwrap()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        assert_eq!(names, vec!["a", "bb"]);
        assert_eq!(root.dataset("hsystsnoprofile").unwrap().shape(), vec![0]);
    }

    #[test]
    fn test_vector_has_no_shape_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::create(dir.path().join("t.hdf5")).unwrap();
        write_vector(container.root(), "hsumgroupsegmentids", &[0i32, 0, 1]).unwrap();
        write_vector::<i32>(container.root(), "hnoigroupidxs", &[]).unwrap();

        let dataset = container.root().hdf5().dataset("hsumgroupsegmentids").unwrap();
        assert_eq!(dataset.chunk(), None);
        assert!(dataset.attr_names().unwrap().is_empty());
        assert_eq!(dataset.read_raw::<i32>().unwrap(), vec![0, 0, 1]);
        let empty = container.root().hdf5().dataset("hnoigroupidxs").unwrap();
        assert_eq!(empty.shape(), vec![0]);
    }

    #[test]
    fn test_fixed_tables() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::create(dir.path().join("t.hdf5")).unwrap();
        let table = Array2::from_shape_vec((2, 3), vec![0i32, 1, 2, 3, 4, 5]).unwrap();
        write_fixed(container.root(), "hhelgroupidxs", &table).unwrap();
        write_fixed(container.root(), "hchargegroupidxs", &Array2::<i32>::zeros((0, 2))).unwrap();

        let root = container.root().hdf5();
        let dataset = root.dataset("hhelgroupidxs").unwrap();
        assert_eq!(dataset.shape(), vec![2, 3]);
        assert_eq!(dataset.read_2d::<i32>().unwrap(), table);
        assert_eq!(root.dataset("hchargegroupidxs").unwrap().shape(), vec![0, 2]);
    }
}
