use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mdb_changer::changer::{encode_setup, parse_setup, DeviceConfig, TubeStatus};
use mdb_changer::decode_events;

fn benchmark_decode_events(c: &mut Criterion) {
    c.bench_function("decode_single_deposit", |b| {
        b.iter(|| black_box(decode_events(black_box("5305"))))
    });

    c.bench_function("decode_multi_event", |b| {
        b.iter(|| black_box(decode_events(black_box("530541020B92040221"))))
    });

    c.bench_function("decode_ack", |b| {
        b.iter(|| black_box(decode_events(black_box("ACK"))))
    });
}

fn benchmark_parse_payloads(c: &mut Criterion) {
    let config = DeviceConfig {
        feature_level: 3,
        currency_code: 0x1978,
        scaling_factor: 5,
        decimal_places: 2,
        coin_routing: 0x000E,
    };
    let setup = encode_setup(&config, &[0, 1, 2, 5, 10, 20, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    let tubes = format!("0008{}", "0A".repeat(16));

    c.bench_function("parse_setup", |b| {
        b.iter(|| {
            let _ = black_box(parse_setup(black_box(&setup)));
        })
    });

    c.bench_function("parse_tube_status", |b| {
        b.iter(|| {
            let _ = black_box(TubeStatus::parse(black_box(&tubes)));
        })
    });
}

criterion_group!(benches, benchmark_decode_events, benchmark_parse_payloads);
criterion_main!(benches);
