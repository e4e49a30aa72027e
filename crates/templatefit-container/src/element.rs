//! Numeric element types storable in a container

use hdf5::types::TypeDescriptor;
use hdf5::H5Type;
use num_traits::Zero;
use std::fmt::Debug;

/// A plain numeric type with a native HDF5 datatype
pub trait Element: H5Type + Copy + Zero + PartialEq + Debug {
    /// Size of one element in bytes
    fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// HDF5 type description, compared against stored datasets on read
    fn descriptor() -> TypeDescriptor {
        Self::type_descriptor()
    }
}

impl Element for f64 {}
impl Element for f32 {}
impl Element for i32 {}
impl Element for i64 {}
impl Element for u8 {}
