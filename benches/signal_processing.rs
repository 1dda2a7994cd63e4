use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sepscribe::audio::Waveform;
use sepscribe::pipeline::plan_windows;
use sepscribe::separation::{SpectralGate, SpectralGateConfig};
use std::f32::consts::PI;
use std::hint::black_box;

/// Speech-band tone over white-ish noise, 16 kHz mono.
fn noisy_tone(seconds: usize) -> Waveform {
    let rate = 16000;
    let mut state: u32 = 0x9e37_79b9;
    let samples = (0..seconds * rate)
        .map(|i| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5;
            0.3 * (2.0 * PI * 220.0 * i as f32 / rate as f32).sin() + 0.05 * noise
        })
        .collect();
    Waveform::new(samples, rate as u32)
}

fn bench_spectral_gate(c: &mut Criterion) {
    let gate = SpectralGate::new(SpectralGateConfig::default());
    let mut group = c.benchmark_group("spectral_gate");
    group.sample_size(10);

    for seconds in [5usize, 30, 60] {
        let waveform = noisy_tone(seconds);
        group.throughput(Throughput::Elements(waveform.samples().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(seconds), &waveform, |b, w| {
            b.iter(|| gate.reduce(black_box(w)))
        });
    }
    group.finish();
}

fn bench_plan_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_windows");
    for hours in [1.0f64, 8.0] {
        let duration = hours * 3600.0;
        group.bench_with_input(BenchmarkId::from_parameter(hours), &duration, |b, &d| {
            b.iter(|| plan_windows(black_box(d), 30.0, 5.0))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_spectral_gate, bench_plan_windows);
criterion_main!(benches);
