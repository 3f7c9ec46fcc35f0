//! Benchmarks for end-to-end conflict detection
//!
//! Schemas are generated as chains of tables where every table references
//! its predecessor, so graph size and foreign key count grow together.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use schemamerge_core::DetectorConfig;
use schemamerge_engine::{Detector, GraphComparator};
use schemamerge_graph::GraphBuilder;
use schemamerge_sql::StatementParser;

/// Generate a script with N tables of `columns` columns each
fn generate_schema(num_tables: usize, columns: usize) -> String {
    let mut statements = Vec::new();

    for i in 0..num_tables {
        let mut body = vec!["id BIGINT PRIMARY KEY".to_string()];
        for c in 0..columns {
            body.push(format!("col_{} VARCHAR(100)", c));
        }
        if i > 0 {
            body.push(format!("parent_id BIGINT NOT NULL REFERENCES table_{}(id)", i - 1));
        }

        statements.push(format!("CREATE TABLE table_{} (\n    {}\n);", i, body.join(",\n    ")));
    }

    statements.join("\n\n")
}

/// The target side: drop one table, change a type, tighten a column
fn mutate_schema(num_tables: usize, columns: usize) -> String {
    generate_schema(num_tables, columns)
        .replace("CREATE TABLE table_0 (", "CREATE TABLE table_0_archived (")
        .replace("col_0 VARCHAR(100)", "col_0 INTEGER")
        .replace("col_1 VARCHAR(100)", "col_1 VARCHAR(100) NOT NULL")
}

/// Benchmark: Parse scripts of growing size
fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    let parser = StatementParser::new();

    for num_tables in [10, 100, 500].iter() {
        let sql = generate_schema(*num_tables, 10);

        group.bench_with_input(BenchmarkId::from_parameter(num_tables), num_tables, |b, _| {
            b.iter(|| black_box(parser.parse_script(&sql)));
        });
    }

    group.finish();
}

/// Benchmark: Compare two prebuilt graphs
fn bench_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("comparison");
    let parser = StatementParser::new();
    let builder = GraphBuilder::new();
    let comparator = GraphComparator::default();

    for num_tables in [10, 100, 500].iter() {
        let a = builder.build_from_objects(&parser.parse_script(&generate_schema(*num_tables, 10)).objects, "a");
        let b = builder.build_from_objects(&parser.parse_script(&mutate_schema(*num_tables, 10)).objects, "b");

        group.bench_with_input(BenchmarkId::from_parameter(num_tables), num_tables, |bench, _| {
            bench.iter(|| black_box(comparator.compare(&a, &b).map(|delta| delta.summary())));
        });
    }

    group.finish();
}

/// Benchmark: Full pipeline (parse + build + compare + rules)
fn bench_detection_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection_e2e");

    for parallel in [false, true] {
        let mut config = DetectorConfig::default();
        config.detector.parallel_snapshots = parallel;

        let Ok(detector) = Detector::new(config) else {
            continue;
        };

        for num_tables in [10, 100].iter() {
            let a = generate_schema(*num_tables, 10);
            let b = mutate_schema(*num_tables, 10);
            let label = if parallel { "parallel" } else { "sequential" };

            group.bench_with_input(BenchmarkId::new(label, num_tables), num_tables, |bench, _| {
                bench.iter(|| black_box(detector.detect(&a, &b)));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_parsing, bench_comparison, bench_detection_end_to_end);

criterion_main!(benches);
