//! Property-based tests for the chunked and sparse writers
//!
//! Arrays written through the public API must read back with their original
//! shape and values, chunks must respect the byte bound, and exactly the
//! all-zero windows must be left unallocated.

#[cfg(test)]
mod property_tests {
    use ndarray::{ArrayD, IxDyn};
    use proptest::prelude::*;
    use templatefit_container::*;

    fn raw_container() -> (tempfile::TempDir, std::path::PathBuf, Container) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.hdf5");
        let container = Container::create_with(
            &path,
            ContainerOptions::default().with_compression_level(None),
        )
        .unwrap();
        (dir, path, container)
    }

    /// Values that are zero in roughly half of the bins, in runs
    fn sparse_values(len: usize, seed: u64) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let h = (i as u64 / 3).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ seed;
                if h % 2 == 0 {
                    0.0
                } else {
                    (h % 1000) as f64 * 0.25 - 100.0
                }
            })
            .collect()
    }

    // Rank 1, 4 and empty shapes
    #[test]
    fn test_round_trip_shapes() {
        let (_dir, path, container) = raw_container();
        let shapes: Vec<Vec<usize>> = vec![vec![7], vec![2, 3, 1, 4], vec![0], vec![3, 0, 2]];
        for (k, shape) in shapes.iter().enumerate() {
            let n: usize = shape.iter().product();
            let values: Vec<f64> = (0..n).map(|i| i as f64 + 0.5).collect();
            let array = ArrayD::from_shape_vec(IxDyn(shape), values).unwrap();
            write_chunked(&array, container.root(), &format!("a{k}"), 40).unwrap();
        }
        container.close().unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        for (k, shape) in shapes.iter().enumerate() {
            let back = reader.read_dense::<f64>(&format!("a{k}")).unwrap();
            assert_eq!(back.shape(), shape.as_slice(), "shape of a{k}");
            let n: usize = shape.iter().product();
            let expected: Vec<f64> = (0..n).map(|i| i as f64 + 0.5).collect();
            assert_eq!(back.iter().copied().collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn test_all_zero_array_allocates_nothing() {
        let (_dir, path, container) = raw_container();
        let zeros = ArrayD::<f64>::zeros(IxDyn(&[4, 5]));
        let nbytes = write_chunked(&zeros, container.root(), "z", 16).unwrap();
        assert_eq!(nbytes, 160);
        container.close().unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        let info = reader.dataset_info("z").unwrap();
        assert_eq!(info.storage_bytes, 0);
        assert_eq!(info.chunks, Some(vec![2]));
        assert_eq!(reader.read_dense::<f64>("z").unwrap(), zeros);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_chunks_respect_byte_bound(
            len in 1usize..300,
            max_chunk_bytes in 1usize..256,
            seed in any::<u64>()
        ) {
            let (_dir, path, container) = raw_container();
            let values = sparse_values(len, seed);
            let array = ArrayD::from_shape_vec(IxDyn(&[len]), values.clone()).unwrap();
            write_chunked(&array, container.root(), "v", max_chunk_bytes).unwrap();
            container.close().unwrap();

            let chunk = chunk_len(len, 8, max_chunk_bytes);
            prop_assert!(chunk >= 1);
            prop_assert!(chunk * 8 <= max_chunk_bytes.max(8));

            let allocated = values
                .chunks(chunk)
                .filter(|window| window.iter().any(|v| *v != 0.0))
                .count();
            let reader = ContainerReader::open(&path).unwrap();
            let info = reader.dataset_info("v").unwrap();
            prop_assert_eq!(info.chunks, Some(vec![chunk]));
            prop_assert_eq!(info.storage_bytes as usize, allocated * chunk * 8);
            prop_assert_eq!(reader.read_flat::<f64>("v").unwrap(), values);
        }

        #[test]
        fn prop_sparse_round_trip(
            dims in proptest::collection::vec(1usize..5, 1..5),
            seed in any::<u64>()
        ) {
            let (_dir, path, container) = raw_container();
            let n: usize = dims.iter().product();
            let dense = ArrayD::from_shape_vec(IxDyn(&dims), sparse_values(n, seed)).unwrap();
            let sparse = SparseTensor::from_dense(&dense).unwrap();
            write_sparse(&sparse, container.root(), "s", 64).unwrap();
            container.close().unwrap();

            let reader = ContainerReader::open(&path).unwrap();
            let back = reader.read_sparse("s").unwrap();
            prop_assert_eq!(back.dense_shape(), dims.as_slice());
            prop_assert_eq!(back.to_dense(), dense);
        }
    }
}
