use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use sham_server::predicate::{evaluate, traverse, Predicate};
use sham_server::{RequestRecord, ResponseSpec, Sham};

fn endpoint_predicate(i: usize) -> Predicate {
    Predicate::and([
        Predicate::eq("method", "GET"),
        Predicate::eq("pathname", format!("/api/v1/endpoint{i}")),
    ])
}

fn sham_with_matchers(count: usize) -> Sham {
    let sham = Sham::new();
    for i in 0..count {
        sham.when(
            endpoint_predicate(i),
            ResponseSpec::default().with_body(format!("endpoint {i}")),
            None,
        )
        .unwrap();
    }
    sham
}

fn sample_record() -> RequestRecord {
    RequestRecord::new("POST", "/api/v1/orders/42")
        .with_query("expand", "items")
        .with_header("Content-Type", "application/json")
        .with_body(json!({"customer": {"id": 7, "tier": "gold"}, "items": [{"qty": 2}]}))
}

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");

    for count in [10, 100, 500].iter() {
        group.throughput(Throughput::Elements(1));

        // Matchers are scanned newest first, so endpoint{count-1} is hit first
        // and endpoint0 last.
        for (label, target) in [("match_first", count - 1), ("match_last", 0)] {
            group.bench_with_input(BenchmarkId::new(label, count), count, |b, &count| {
                b.iter_batched_ref(
                    || sham_with_matchers(count),
                    |sham| {
                        sham.route(black_box(RequestRecord::new(
                            "GET",
                            format!("/api/v1/endpoint{target}"),
                        )))
                    },
                    BatchSize::LargeInput,
                );
            });
        }

        group.bench_with_input(BenchmarkId::new("no_match", count), count, |b, &count| {
            b.iter_batched_ref(
                || sham_with_matchers(count),
                |sham| sham.route(black_box(RequestRecord::new("GET", "/missing"))),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_predicate_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate_evaluation");
    let record = sample_record().to_value();

    let compare = Predicate::and([
        Predicate::eq("method", "POST"),
        Predicate::gte("body.items.0.qty", 1),
        Predicate::eq("body.customer.tier", "gold"),
    ]);
    group.bench_function("compare_and", |b| {
        b.iter(|| evaluate(black_box(&record), black_box(&compare)))
    });

    let regex = Predicate::regex("pathname", r"^/api/v\d+/orders/\d+$", "i");
    group.bench_function("regex", |b| {
        b.iter(|| evaluate(black_box(&record), black_box(&regex)))
    });

    let nested = Predicate::or([
        Predicate::not(Predicate::eq("headers.content-type", "text/plain")),
        Predicate::undefined("body.customer.email"),
    ]);
    group.bench_function("not_or", |b| {
        b.iter(|| evaluate(black_box(&record), black_box(&nested)))
    });

    group.bench_function("traverse_deep", |b| {
        b.iter(|| traverse(black_box(&record), black_box("request.body.customer.id")))
    });

    group.finish();
}

criterion_group!(benches, bench_routing, bench_predicate_evaluation);
criterion_main!(benches);
