use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mythiq_agent::config::ServicesConfig;
use mythiq_agent::routing::{extract_duration, KeywordRouter};

fn bench_route(c: &mut Criterion) {
    let router = KeywordRouter::default();

    c.bench_function("route_game_first_rule", |b| {
        b.iter(|| router.route(black_box("Create a puzzle game about space exploration")))
    });

    c.bench_function("route_video_last_rule", |b| {
        b.iter(|| router.route(black_box("make a short movie about the ocean")))
    });

    c.bench_function("route_no_match", |b| {
        b.iter(|| router.route(black_box("Hello, how are you doing today?")))
    });

    let long_message = "tell me about the history of ".repeat(50);
    c.bench_function("route_long_no_match", |b| {
        b.iter(|| router.route(black_box(&long_message)))
    });
}

fn bench_envelope(c: &mut Criterion) {
    let router = KeywordRouter::default();
    let services = ServicesConfig::default();

    c.bench_function("envelope_music_with_duration", |b| {
        b.iter(|| router.envelope(black_box("compose a 45 second lullaby"), &services))
    });

    c.bench_function("extract_duration", |b| {
        b.iter(|| extract_duration(black_box("a 5-min video of waves")))
    });
}

criterion_group!(benches, bench_route, bench_envelope);
criterion_main!(benches);
