//! 🏎️ Benchmarks for the hot loops of a migration: cutting a range into windows
//! and projecting every document that passes through.
//!
//! Run with: cargo bench -p esdump

use std::collections::BTreeSet;

use chrono::{TimeDelta, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Map, Value, json};

use esdump::app_config::Direction;
use esdump::planner::TimeRange;
use esdump::supervisors::Windows;
use esdump::transforms::Projection;

fn a_year() -> TimeRange {
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().expect("💀 valid start");
    let end = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).single().expect("💀 valid end");
    TimeRange::new(start, end).expect("💀 start before end")
}

/// 🗓️ A year in hourly windows, both ways.
fn bench_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("windows_over_a_year");
    for (label, step) in [("1h", TimeDelta::hours(1)), ("24h", TimeDelta::hours(24))] {
        for direction in [Direction::Ascending, Direction::Descending] {
            group.bench_with_input(
                BenchmarkId::new(format!("{direction:?}"), label),
                &step,
                |b, step| {
                    b.iter(|| {
                        let windows = Windows::new(a_year(), *step, direction).expect("💀 positive step");
                        black_box(windows.count())
                    })
                },
            );
        }
    }
    group.finish();
}

fn sample_source() -> Map<String, Value> {
    let doc = json!({
        "createAt": "2020-06-01T12:00:00Z",
        "title": "a title long enough to be realistic",
        "body": "lorem ipsum ".repeat(32),
        "tags": ["a", "b", "c"],
        "author": {"name": "someone", "id": 42},
        "views": 1234,
    });
    doc.as_object().cloned().expect("💀 object literal")
}

fn fields(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// ✂️ Projection per document, for each flavour.
fn bench_projection(c: &mut Criterion) {
    let source = sample_source();
    let projections = [
        ("all", Projection::All),
        ("include", Projection::from_sets(Some(fields(&["createAt", "title"])), None)),
        ("exclude", Projection::from_sets(None, Some(fields(&["body", "tags"])))),
    ];

    let mut group = c.benchmark_group("projection");
    for (label, projection) in projections {
        group.bench_function(label, |b| {
            b.iter(|| black_box(projection.apply(source.clone())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_windows, bench_projection);
criterion_main!(benches);
