use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use modhost::module::{DependencyResolver, ModuleDescriptor, Priority};

const PRIORITIES: [Priority; 5] = [
    Priority::Lowest,
    Priority::Low,
    Priority::Normal,
    Priority::High,
    Priority::Highest,
];

/// `layers` tiers of `width` modules; each module depends on two modules of
/// the tier below.
fn layered(layers: usize, width: usize) -> DependencyResolver {
    let mut resolver = DependencyResolver::new();
    for layer in 0..layers {
        for i in 0..width {
            let mut descriptor = ModuleDescriptor::new(format!("l{}_m{}", layer, i))
                .with_priority(PRIORITIES[(layer + i) % PRIORITIES.len()]);
            if layer > 0 {
                descriptor = descriptor
                    .depends_on(format!("l{}_m{}", layer - 1, i))
                    .depends_on(format!("l{}_m{}", layer - 1, (i + 1) % width));
            }
            resolver.add_module(descriptor).unwrap();
        }
    }
    resolver
}

fn chain(len: usize) -> DependencyResolver {
    let mut resolver = DependencyResolver::new();
    resolver.add_module(ModuleDescriptor::new("c0")).unwrap();
    for i in 1..len {
        resolver
            .add_module(ModuleDescriptor::new(format!("c{}", i)).depends_on(format!("c{}", i - 1)))
            .unwrap();
    }
    resolver
}

fn benchmark_layered_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_layered");
    for &(layers, width) in &[(5, 20), (10, 50), (20, 100)] {
        let resolver = layered(layers, width);
        group.bench_with_input(
            BenchmarkId::from_parameter(layers * width),
            &resolver,
            |b, resolver| b.iter(|| black_box(resolver.resolve())),
        );
    }
    group.finish();
}

fn benchmark_deep_chain(c: &mut Criterion) {
    let resolver = chain(10_000);
    c.bench_function("resolve_chain_10000", |b| {
        b.iter(|| black_box(resolver.resolve()))
    });
}

fn benchmark_cycle_detection(c: &mut Criterion) {
    let mut resolver = chain(5_000);
    resolver.remove_module("c0");
    resolver
        .add_module(ModuleDescriptor::new("c0").depends_on("c4999"))
        .unwrap();
    c.bench_function("detect_cycle_5000", |b| {
        b.iter(|| black_box(resolver.resolve()))
    });
}

criterion_group!(
    benches,
    benchmark_layered_resolution,
    benchmark_deep_chain,
    benchmark_cycle_detection
);
criterion_main!(benches);
