use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgmanager::{Params, compile};

/// SELECT col0, col1, ... FROM t WHERE col0 = :p0 AND col1 = :p1 ...
fn build_select(n: usize) -> (String, Params) {
    let columns: Vec<String> = (0..n).map(|i| format!("col{i}")).collect();
    let predicates: Vec<String> = (0..n).map(|i| format!("col{i} = :p{i}")).collect();
    let sql = format!(
        "SELECT {} FROM t WHERE {}",
        columns.join(", "),
        predicates.join(" AND ")
    );
    let params = (0..n).map(|i| (format!("p{i}"), i as i64)).collect();
    (sql, params)
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("named_params/compile");

    for n in [1, 5, 10, 50, 100] {
        let input = build_select(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, (sql, params)| {
            b.iter(|| black_box(compile(sql, params).unwrap()));
        });
    }

    group.finish();
}

fn bench_compile_with_literals(c: &mut Criterion) {
    let mut group = c.benchmark_group("named_params/compile_with_literals");

    // Literals, casts and comments the scanner has to skip.
    let sql = "SELECT id, name::text, 'a:b' AS s FROM author /* :nope */ \
               WHERE deleted = 'NO' AND name = :name AND id > :id -- :ignored\n\
               ORDER BY name";
    let mut params = Params::new();
    params.insert("name", "Victor Hugo");
    params.insert("id", "10");

    group.bench_function("mixed", |b| {
        b.iter(|| black_box(compile(sql, &params).unwrap()));
    });

    group.finish();
}

fn bench_repeated_names(c: &mut Criterion) {
    let mut group = c.benchmark_group("named_params/repeated_names");

    for n in [10, 100] {
        let sql = (0..n)
            .map(|_| "x = :v")
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!("SELECT * FROM t WHERE {sql}");
        let mut params = Params::new();
        params.insert("v", 1);
        group.bench_with_input(BenchmarkId::from_parameter(n), &sql, |b, sql| {
            b.iter(|| black_box(compile(sql, &params).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_compile_with_literals,
    bench_repeated_names
);
criterion_main!(benches);
