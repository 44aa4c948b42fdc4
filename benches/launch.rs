// benches/launch.rs -- host-side hot paths.
//
// The GPU work itself is driver-bound and not interesting to bench from
// here; what matters on the host side is the per-dispatch overhead:
// pointer-to-buffer resolution (a linear scan over registered ranges)
// and the one-off WGSL entry-point scan at startup.
//
//   cargo bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use gantry::library::scan_entry_points;
use gantry::registry::find_containing;

/// Synthetic disjoint ranges: 1 KiB buffers spaced 4 KiB apart.
fn make_ranges(n: usize) -> Vec<(usize, usize)> {
    (0..n).map(|i| (0x10_0000 + i * 0x1000, 0x400)).collect()
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for n in [8usize, 64, 512] {
        let ranges = make_ranges(n);
        // Worst case: the address lives in the last registered range.
        let (base, _) = ranges[n - 1];
        group.bench_with_input(BenchmarkId::new("last_range", n), &n, |b, _| {
            b.iter(|| find_containing(ranges.iter().copied(), base + 0x80))
        });
        group.bench_with_input(BenchmarkId::new("miss", n), &n, |b, _| {
            b.iter(|| find_containing(ranges.iter().copied(), 0x1))
        });
    }
    group.finish();
}

fn bench_entry_scan(c: &mut Criterion) {
    // A synthetic library in the same shape as the embedded one.
    let mut source = String::new();
    for i in 0..64 {
        source.push_str(&format!(
            "@group(0) @binding(0) var<storage, read_write> d{i}: array<f32>;\n\
             @compute @workgroup_size(64, 1, 1)\n\
             fn kernel_{i}(@builtin(global_invocation_id) gid: vec3<u32>) {{ }}\n\n"
        ));
    }

    c.bench_function("scan_entry_points/64_kernels", |b| {
        b.iter(|| scan_entry_points(&source))
    });
}

criterion_group!(benches, bench_resolve, bench_entry_scan);
criterion_main!(benches);
