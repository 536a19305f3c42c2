use criterion::{criterion_group, criterion_main, Criterion};
use floodgate::{FixedWindowLimiter, RateLimiterConfig};
use std::time::Duration;

// Uncontended hot path: a window large enough that no iteration ever waits.
fn wide_open_limiter(name: &str) -> FixedWindowLimiter {
    FixedWindowLimiter::new(
        name,
        RateLimiterConfig::builder()
            .limit_for_period(u32::MAX)
            .limit_refresh_period(Duration::from_millis(500))
            .timeout_duration(Duration::ZERO)
            .build()
            .unwrap(),
    )
}

fn acquire_uncontended(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let limiter = wide_open_limiter("bench-acquire");

    c.bench_function("acquire_uncontended", |b| {
        b.to_async(&rt).iter(|| async {
            limiter.acquire_permission(1).await.unwrap();
        })
    });
}

fn reserve_uncontended(c: &mut Criterion) {
    let limiter = wide_open_limiter("bench-reserve");

    c.bench_function("reserve_uncontended", |b| {
        b.iter(|| {
            limiter.reserve_permission(1).unwrap();
        })
    });
}

criterion_group!(benches, acquire_uncontended, reserve_uncontended);
criterion_main!(benches);
