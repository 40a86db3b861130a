use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ipc_cycle_gc::{EndpointHandle, GcDomain, Message};
use std::hint::black_box;

fn pass(from: &EndpointHandle, to: &EndpointHandle) {
    from.send(Message::default().with_endpoint(to)).unwrap();
}

fn manual_domain() -> GcDomain {
    GcDomain::builder().auto_collect_threshold(None).build()
}

/// Benchmark: Reclaiming dead two-endpoint cycles
///
/// Each iteration builds N unreachable `a <-> b` cycles and measures one
/// collection that destroys all of them.
fn bench_collect_dead_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_dead_cycles");

    for cycles in [10, 100, 1000, 5000].iter() {
        group.bench_with_input(
            BenchmarkId::new("cycles", cycles),
            cycles,
            |b, &cycles| {
                b.iter(|| {
                    let domain = manual_domain();
                    for _ in 0..cycles {
                        let x = domain.create_endpoint();
                        let y = domain.create_endpoint();
                        pass(&x, &y);
                        pass(&y, &x);
                    }

                    let collection = domain.collect().unwrap();
                    black_box(collection.destroyed());
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: Marking a long chain reachable from one root
///
/// A chain exercises first-child elision: the walker stack never grows, so
/// this isolates the per-endpoint cost of marking.
fn bench_mark_long_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("mark_long_chain");

    for length in [100, 1000, 10_000].iter() {
        let domain = manual_domain();
        let head = domain.create_endpoint();
        let mut previous = head.clone();
        for _ in 0..*length {
            let next = domain.create_endpoint();
            pass(&previous, &next);
            previous = next;
        }
        drop(previous);

        group.bench_with_input(BenchmarkId::new("length", length), length, |b, _| {
            b.iter(|| {
                let collection = domain.collect().unwrap();
                black_box(collection.stats().map(|stats| stats.marked));
            });
        });

        drop(head);
    }

    group.finish();
}

/// Benchmark: Marking a wide fan-out
///
/// One root carries N endpoints, so the walker stack grows to N - 1.
fn bench_mark_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("mark_fan_out");

    for width in [10, 100, 500].iter() {
        let domain = manual_domain();
        let root = domain.create_endpoint();
        for _ in 0..*width {
            let child = domain.create_endpoint();
            pass(&root, &child);
        }

        group.bench_with_input(BenchmarkId::new("width", width), width, |b, _| {
            b.iter(|| {
                let collection = domain.collect().unwrap();
                black_box(collection.stats().map(|stats| stats.peak_stack_depth));
            });
        });

        drop(root);
    }

    group.finish();
}

/// Benchmark: Send and receive round trip carrying an endpoint
fn bench_send_recv(c: &mut Criterion) {
    let domain = manual_domain();
    let channel = domain.create_endpoint();
    let payload = domain.create_endpoint();

    c.bench_function("send_recv_endpoint", |b| {
        b.iter(|| {
            pass(&channel, &payload);
            black_box(channel.recv());
        });
    });
}

criterion_group!(
    benches,
    bench_collect_dead_cycles,
    bench_mark_long_chain,
    bench_mark_fan_out,
    bench_send_recv
);
criterion_main!(benches);
