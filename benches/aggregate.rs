use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use workload_trace::{aggregate, summarize, Span, Trace, WindowConfig};

const WIDTH_NS: u64 = 100_000_000;

// Open-loop arrivals at a fixed mean rate with uniform jitter and
// latencies up to 20ms.
fn synthetic_trace(requests: u64, rate_per_sec: u64) -> Trace {
    let mut rng = StdRng::seed_from_u64(17);
    let gap_ns = 1_000_000_000 / rate_per_sec;
    let spans = (0..requests)
        .map(|i| {
            let start_ns = i * gap_ns + rng.gen_range(0..gap_ns);
            Span {
                start_ns,
                finish_ns: start_ns + rng.gen_range(100_000..20_000_000),
            }
        })
        .collect();
    Trace::from_spans(spans).unwrap()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for requests in [10_000u64, 100_000, 1_000_000] {
        let rate = 10_000;
        let trace = synthetic_trace(requests, rate);
        let duration_ns = requests * 1_000_000_000 / rate;
        let config = WindowConfig::new(WIDTH_NS, duration_ns).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(requests), &trace, |b, trace| {
            b.iter(|| aggregate(black_box(trace), black_box(&config)))
        });
    }

    group.finish();
}

fn bench_summarize(c: &mut Criterion) {
    let trace = synthetic_trace(100_000, 10_000);
    let config = WindowConfig::new(WIDTH_NS, 10_000_000_000).unwrap();
    let aggregation = aggregate(&trace, &config).unwrap();

    c.bench_function("summarize_100k", |b| {
        b.iter(|| {
            summarize(
                black_box(&aggregation.latencies_ms),
                black_box(&aggregation.timeseries),
            )
        })
    });
}

criterion_group!(benches, bench_aggregate, bench_summarize);
criterion_main!(benches);
