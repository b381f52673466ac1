//! Benchmarks the activity kernel's output-sensitivity claim (§4.4): cost
//! should scale with the number of reverse-index entries touched by the
//! input, not with the total number of segments in the store.

use std::collections::HashSet;

use connections_core::Connections;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_store(num_cells: usize, segments_per_cell: usize) -> Connections {
    let mut conns = Connections::new(num_cells);
    for cell in 0..num_cells as u32 {
        for _ in 0..segments_per_cell {
            let segment = conns.create_segment(cell).unwrap();
            for presynaptic in 0..4u32 {
                let source = (cell + presynaptic + 1) % num_cells as u32;
                conns.create_synapse(segment, source, 0.6).unwrap();
            }
        }
    }
    conns
}

fn bench_activity(c: &mut Criterion) {
    let conns = build_store(2_000, 4);
    let len = conns.segment_flat_list_length();
    let mut connected = vec![0u32; len];
    let mut potential = vec![0u32; len];

    let mut group = c.benchmark_group("compute_activity");
    for &touched in &[10usize, 100, 1_000] {
        let input: HashSet<u32> = (0..touched as u32).collect();
        group.bench_function(format!("touched_cells_{touched}"), |b| {
            b.iter(|| {
                connected.iter_mut().for_each(|v| *v = 0);
                potential.iter_mut().for_each(|v| *v = 0);
                conns
                    .compute_activity(
                        black_box(&mut connected),
                        black_box(&mut potential),
                        black_box(&input),
                        0.5,
                    )
                    .unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_activity);
criterion_main!(benches);
