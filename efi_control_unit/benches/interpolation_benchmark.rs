//! Table lookup micro-benchmark.
//!
//! Measures the per-cycle table work:
//! - Axis mapping (RPM/MAP → fractional indices)
//! - Bilinear interpolation alone
//! - The lookup chain the pulse computation runs every cycle

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use efi_common::control_unit::config::TableConfig;
use efi_control_unit::table::{Table, TableAxes};

fn ramp_table() -> Table {
    let mut t = Table::filled(0.0);
    for cell in Table::all_cells() {
        t.set(cell, 800.0 + (cell.row * 150 + cell.col * 20) as f64);
    }
    t
}

fn bench_axes(c: &mut Criterion) {
    let axes = TableAxes::from(&TableConfig::default());
    let mut rpm = 500.0;

    c.bench_function("axes_coords", |b| {
        b.iter(|| {
            rpm = if rpm > 6000.0 { 500.0 } else { rpm + 37.0 };
            black_box(axes.coords(black_box(rpm), black_box(63.5)))
        });
    });
}

fn bench_interpolate(c: &mut Criterion) {
    let table = ramp_table();
    let mut group = c.benchmark_group("interpolate_2d");
    group.significance_level(0.01);

    group.bench_function("interior", |b| {
        b.iter(|| black_box(table.interpolate_2d(black_box(3.4), black_box(5.7))));
    });
    group.bench_function("clamped_edge", |b| {
        b.iter(|| black_box(table.interpolate_2d(black_box(42.0), black_box(-1.0))));
    });

    group.finish();
}

fn bench_full_lookup(c: &mut Criterion) {
    let axes = TableAxes::from(&TableConfig::default());
    let base = ramp_table();
    let trims = Table::filled(1.0);

    c.bench_function("pulse_lookup_chain", |b| {
        b.iter(|| {
            let (x, y, guards) = axes.coords(black_box(2350.0), black_box(47.0));
            let pulse = base.interpolate_2d(x, y) / 298.15 * trims.interpolate_2d(x, y);
            black_box((pulse, guards))
        });
    });
}

criterion_group!(benches, bench_axes, bench_interpolate, bench_full_lookup);
criterion_main!(benches);
