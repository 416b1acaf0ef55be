use chef_core::{Catalog, GameState};
use chef_runtime::{Session, SessionConfig};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn bench_ticks(c: &mut Criterion) {
    let catalog = Arc::new(Catalog::builtin().unwrap());
    let mut state = GameState {
        upgrades: catalog
            .upgrades
            .iter()
            .map(|u| (u.id.clone(), 25u32))
            .collect(),
        ..GameState::default()
    };
    state.apply_derived(&catalog);
    let cfg = SessionConfig {
        rng_seed: Some(42),
        ..SessionConfig::default()
    };
    let mut session = Session::new(state, catalog, &cfg);
    let mut now = 1_700_000_000_000i64;
    c.bench_function("session_fast_tick", |b| {
        b.iter(|| {
            now += 100;
            session.fast_tick(now);
        })
    });
    c.bench_function("session_click", |b| {
        b.iter(|| {
            now += 50;
            session.click(0.0, 0.0, now)
        })
    });
}

criterion_group!(benches, bench_ticks);
criterion_main!(benches);
