//! Dense chunked datasets
//!
//! Any n-dimensional array is flattened in row-major order into a 1-D dataset
//! whose chunks hold at most `max_chunk_bytes` of raw data. The logical shape
//! is kept in the `original_shape` attribute. Windows whose elements are all
//! zero are never written, so their chunks are never allocated and read back
//! as the zero fill value.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::file::{write_shape_attr, Group};
use ndarray::{s, ArrayBase, ArrayView1, Data, Dimension};
use tracing::{debug, instrument};

/// Attribute holding the logical shape of a flattened dataset
pub const ORIGINAL_SHAPE_ATTR: &str = "original_shape";

/// Number of elements per chunk for a dataset of `total` elements
pub fn chunk_len(total: usize, element_size: usize, max_chunk_bytes: usize) -> usize {
    total.min((max_chunk_bytes / element_size).max(1))
}

/// Write `array` as a flat chunked dataset `name` in `group`
///
/// Returns the raw (uncompressed) size of the array in bytes. Empty arrays are
/// written contiguous and uncompressed.
#[instrument(skip(array, group), fields(shape = ?array.shape()))]
pub fn write_chunked<S, D, T>(
    array: &ArrayBase<S, D>,
    group: &Group,
    name: &str,
    max_chunk_bytes: usize,
) -> Result<u64>
where
    S: Data<Elem = T>,
    D: Dimension,
    T: Element,
{
    let total = array.len();

    if total == 0 {
        let dataset = group.hdf5().new_dataset::<T>().shape((0,)).create(name)?;
        write_shape_attr(&dataset, ORIGINAL_SHAPE_ATTR, array.shape())?;
        debug!("{}: empty dataset", name);
        return Ok(0);
    }

    let standard = array.as_standard_layout();
    let data = standard
        .as_slice()
        .ok_or_else(|| Error::Format(format!("{name}: array is not contiguous")))?;

    let len = chunk_len(total, T::size(), max_chunk_bytes);
    let mut builder = group
        .hdf5()
        .new_dataset::<T>()
        .shape((total,))
        .chunk((len,));
    if let Some(level) = group.compression_level() {
        builder = builder.deflate(level);
    }
    let dataset = builder.create(name)?;
    write_shape_attr(&dataset, ORIGINAL_SHAPE_ATTR, array.shape())?;

    let mut written = 0usize;
    let mut skipped = 0usize;
    for (i, window) in data.chunks(len).enumerate() {
        if window.iter().all(|v| v.is_zero()) {
            skipped += 1;
            continue;
        }
        let start = i * len;
        dataset.write_slice(ArrayView1::from(window), s![start..start + window.len()])?;
        written += 1;
    }

    let nbytes = (total * T::size()) as u64;
    debug!(
        "{}: {} bytes in {} chunks of {} elements ({} all-zero chunks skipped)",
        name, nbytes, written, len, skipped
    );
    Ok(nbytes)
}
