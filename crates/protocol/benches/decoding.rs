//! Benchmarks for reply decoding
//!
//! Measures decoding cost for the reply shapes the clients request:
//! - 512 and 4096 channel spectra
//! - Packet zero
//! - Combined spectrum + packet zero replies

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use protocol::{PacketZero, Reply, RequestType, Spectrum, SpectrumSize};

fn benchmark_spectrum_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectrum_decode");

    for size in [SpectrumSize::Channels512, SpectrumSize::Channels4096] {
        let counts: Vec<u32> = (0..size.channels() as u32).map(|i| i * 7).collect();
        let bytes = Spectrum::from_counts(counts).encode();

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(size.channels()),
            &bytes,
            |b, bytes| b.iter(|| Spectrum::decode(black_box(bytes))),
        );
    }

    group.finish();
}

fn benchmark_packet_zero(c: &mut Criterion) {
    let packet = PacketZero {
        cps: 1234.5,
        total_count: 99_000.0,
        total_pulse_time: 0.25,
        us_per_interval: 1_000_000,
        total_intervals: 60,
        capemca_id: 7,
        ..Default::default()
    };
    let bytes = packet.encode();

    c.bench_function("packet_zero_decode", |b| {
        b.iter(|| PacketZero::decode(black_box(&bytes)))
    });
}

fn benchmark_full_reply(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_reply");

    let request = RequestType::spectrum(SpectrumSize::Channels4096, true);
    let bytes = vec![0xABu8; request.reply_len()];

    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("spectrum_4096_with_packet_zero", |b| {
        b.iter(|| Reply::decode(request, black_box(&bytes)))
    });

    let mut sum = Spectrum::zeroed(4096);
    let other = Spectrum::from_counts(vec![3; 4096]);
    group.bench_function("accumulate_4096", |b| {
        b.iter(|| sum.accumulate(black_box(&other)))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_spectrum_decode,
    benchmark_packet_zero,
    benchmark_full_reply
);
criterion_main!(benches);
