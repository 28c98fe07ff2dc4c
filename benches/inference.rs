use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use sqlite_ingest::convert::{ConvertOptions, Converter};
use sqlite_ingest::inference::{infer_profiles, InferenceOptions};
use sqlite_ingest::sink::SqliteSink;
use sqlite_ingest::types::{RawTable, Scalar};

fn text_table(rows: usize) -> RawTable {
    let header = ["id", "name", "score", "active", "note"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = (0..rows)
        .map(|i| {
            vec![
                Scalar::Text(i.to_string()),
                Scalar::Text(format!("user_{i}")),
                Scalar::Text(format!("{}.{}", i % 100, i % 7)),
                Scalar::text(if i % 2 == 0 { "true" } else { "false" }),
                if i % 10 == 0 { Scalar::text("") } else { Scalar::Text(format!("n{i}")) },
            ]
        })
        .collect();
    RawTable::new("bench.csv", "bench", header, rows)
}

fn bench_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("infer_profiles");
    for rows in [1_000usize, 10_000, 100_000] {
        let table = text_table(rows);
        group.bench_with_input(BenchmarkId::new("full_scan", rows), &table, |b, t| {
            b.iter(|| infer_profiles(black_box(t), &InferenceOptions::full_scan()))
        });
        group.bench_with_input(BenchmarkId::new("sampled_1000", rows), &table, |b, t| {
            b.iter(|| infer_profiles(black_box(t), &InferenceOptions::sampled(1_000)))
        });
    }
    group.finish();
}

fn bench_convert(c: &mut Criterion) {
    c.bench_function("convert_10k_rows_in_memory", |b| {
        b.iter_batched(
            || text_table(10_000),
            |table| {
                let sink = SqliteSink::open_in_memory().unwrap();
                let mut conv = Converter::new(sink, ConvertOptions::default()).unwrap();
                conv.convert_tables([table]).unwrap()
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_inference, bench_convert);
criterion_main!(benches);
