//! Benchmarks for the neuroevolution engine.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use neatwork::schema::{EdgeDescriptor, NetworkDescriptor};
use neatwork::{Activation, EngineConfig, MutationRates, NeatEngine};

/// A template network with `hidden` hidden nodes fanning between the input
/// and output blocks.
fn chain_descriptor(hidden: usize) -> NetworkDescriptor {
    let input_count = 4; // 3 sensors + bias
    let output_count = 2;
    let first_hidden = input_count + output_count;

    let mut edges = Vec::with_capacity(hidden * 2);
    for h in 0..hidden {
        let id = first_hidden + h;
        edges.push(EdgeDescriptor {
            from: h % input_count,
            to: id,
            weight: 0.5,
        });
        edges.push(EdgeDescriptor {
            from: id,
            to: input_count + (h % output_count),
            weight: 0.25,
        });
    }

    NetworkDescriptor {
        input_count,
        output_count,
        hidden_activation: Activation::Tanh,
        output_activation: Activation::Tanh,
        edges,
    }
}

fn bench_forward_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_pass");

    for hidden in [0, 16, 64, 256] {
        let descriptor = chain_descriptor(hidden);
        let mut engine = NeatEngine::from_descriptor(&descriptor, 50, 5, Some(7));
        let inputs = [0.5f32, -0.25, 1.0];

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_hidden", hidden)),
            &hidden,
            |b, _| {
                b.iter(|| engine.guess(0, black_box(&inputs)).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_generation");
    group.sample_size(20);

    for size in [100, 250, 500] {
        let config = EngineConfig {
            inputs: 3,
            outputs: 2,
            population_size: size,
            desired_species_count: 8,
            mutation_rates: MutationRates::STANDARD,
            random_seed: Some(99),
            ..EngineConfig::default()
        };
        let mut engine = NeatEngine::new(&config).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                for i in 0..size {
                    engine.set_fitness(i, 1.0 + (i % 13) as f32).unwrap();
                }
                engine.next_generation();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_forward_pass, bench_generation);
criterion_main!(benches);
