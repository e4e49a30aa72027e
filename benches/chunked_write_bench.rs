//! Benchmarks for the chunked and sparse tensor writers
//!
//! Compares dense chunked writes of a `logk`-shaped tensor at several
//! densities against the sparse encoding, with and without deflate compression.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{Array4, ArrayD};
use templatefit::container::{write_chunked, write_sparse, Container, ContainerOptions, SparseTensor};

/// `[bins + 1, nproc, 2, nsyst]` tensor with roughly `density` non-zero entries
fn logk_like(nbins: usize, nproc: usize, nsyst: usize, density: f64) -> Array4<f64> {
    let period = (1.0 / density).round().max(1.0) as usize;
    Array4::from_shape_fn((nbins + 1, nproc, 2, nsyst), |(b, p, k, s)| {
        let flat = ((b * nproc + p) * 2 + k) * nsyst + s;
        if b < nbins && flat % period == 0 {
            0.01 * (flat % 97) as f64 + 1e-3
        } else {
            0.0
        }
    })
}

fn bench_dense_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_write");
    group.sample_size(20);

    for (density, name) in [(1.0, "full"), (0.25, "quarter"), (0.01, "sparse")] {
        let tensor = logk_like(288, 48, 64, density);
        group.throughput(Throughput::Bytes((tensor.len() * 8) as u64));
        for (level, label) in [(None, "raw"), (Some(4), "deflate4")] {
            group.bench_with_input(
                BenchmarkId::new(format!("{name}_{label}"), tensor.len()),
                &tensor,
                |b, tensor| {
                    let dir = tempfile::tempdir().unwrap();
                    let mut i = 0usize;
                    b.iter(|| {
                        let container = Container::create_with(
                            dir.path().join(format!("b{i}.hdf5")),
                            ContainerOptions::default().with_compression_level(level),
                        )
                        .unwrap();
                        i += 1;
                        black_box(
                            write_chunked(tensor, container.root(), "hlogk", 1024 * 1024).unwrap(),
                        )
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_sparse_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_write");
    group.sample_size(20);

    for (density, name) in [(0.25, "quarter"), (0.01, "sparse")] {
        let dense: ArrayD<f64> = logk_like(288, 48, 64, density).into_dyn();
        let sparse = SparseTensor::from_dense(&dense).unwrap();
        group.bench_with_input(BenchmarkId::new(name, sparse.nnz()), &sparse, |b, sparse| {
            let dir = tempfile::tempdir().unwrap();
            let mut i = 0usize;
            b.iter(|| {
                let container = Container::create_with(
                    dir.path().join(format!("s{i}.hdf5")),
                    ContainerOptions::default().with_compression_level(None),
                )
                .unwrap();
                i += 1;
                black_box(write_sparse(sparse, container.root(), "hlogk_sparse", 1024 * 1024).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dense_writes, bench_sparse_writes);
criterion_main!(benches);
