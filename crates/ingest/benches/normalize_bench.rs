//! Row processing benchmarks
//!
//! Per-row cost of the producer hot path: normalization, admission filtering
//! and a full read of a synthetic export.

#![allow(clippy::unwrap_used)] // Benchmarks are allowed to use unwrap for simplicity
#![allow(clippy::uninlined_format_args)] // Benchmark formatting can be verbose

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fmt::Write as _;
use std::io::Cursor;
use std::time::Duration;

use bulkload_ingest::{
    pipeline::{AdmissionFilter, DropThresholdFilter},
    records::normalize::parse_amount,
    source::{RawRow, ReadOutcome, SourceReader},
    BalanceRecord, PipelineRecord, Record,
};

const PIPELINE_HEADER: [&str; 13] = [
    "pn", "nama_rmft", "kode_uker", "kc", "prod", "norek", "dup", "nama", "tgl", "strategy",
    "segment", "pipeline", "proyeksi",
];

fn pipeline_row(i: usize) -> RawRow {
    RawRow {
        line: i as u64 + 2,
        cells: vec![
            format!("{:08}", i),
            "Budi Santoso".to_string(),
            "U0123".to_string(),
            "KC Jakarta".to_string(),
            "KUR".to_string(),
            format!("0123{:012}", i),
            "-".to_string(),
            "PT Maju Jaya".to_string(),
            "15/06/2024".to_string(),
            "Intensifikasi".to_string(),
            "SME".to_string(),
            "Prospek".to_string(),
            "\"12,500,000\"".to_string(),
        ],
    }
}

fn balance_export(rows: usize) -> Vec<u8> {
    let mut csv = String::from("Laporan DI319\nperiode;cif;branch;norek;balance;avg_balance\n");
    for i in 0..rows {
        let balance = (i * 37) % 2000;
        let _ = writeln!(csv, "2024-06-30;C{i};U1;A{i};{balance};1000");
    }
    csv.into_bytes()
}

/// Normalize one pipeline row
fn bench_normalize(c: &mut Criterion) {
    let columns = PipelineRecord::aliases().resolve(&PIPELINE_HEADER);
    let rows: Vec<RawRow> = (0..1000).map(pipeline_row).collect();

    let mut group = c.benchmark_group("normalize");
    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function("pipeline_record", |b| {
        b.iter(|| {
            for row in &rows {
                black_box(PipelineRecord::normalize(row, &columns).unwrap());
            }
        });
    });
    group.bench_function("parse_amount", |b| {
        b.iter(|| black_box(parse_amount(black_box("\"12,500,000.75\""))));
    });
    group.finish();
}

/// Read, normalize and filter a whole balance export
fn bench_balance_scan(c: &mut Criterion) {
    let filter = DropThresholdFilter::default();
    let mut group = c.benchmark_group("balance_scan");
    group.measurement_time(Duration::from_secs(10));

    for rows in [1_000, 10_000] {
        let input = balance_export(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &input, |b, input| {
            b.iter(|| {
                let reader = SourceReader::detect(
                    Cursor::new(input.clone()),
                    10,
                    BalanceRecord::header_probes(),
                )
                .unwrap();
                let columns = BalanceRecord::aliases().resolve(&reader.header().cells);
                let mut admitted = 0_usize;
                for item in reader {
                    if let ReadOutcome::Row(row) = item.unwrap() {
                        if let Ok(record) = BalanceRecord::normalize(&row, &columns) {
                            admitted += usize::from(filter.admit(&record));
                        }
                    }
                }
                black_box(admitted)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_normalize, bench_balance_scan);
criterion_main!(benches);
