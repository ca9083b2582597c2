use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures_functools::cache::{CacheKey, Capacity, Handle, KeyError, Memoize, SingleFlightCache};
use tokio::sync::Barrier;
use tokio::time::sleep;

type Cache = SingleFlightCache<u32, u32, String>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn slow_double(cache: &Cache, n: u32, calls: &Arc<AtomicUsize>) -> Handle<u32, String> {
    let calls = calls.clone();
    cache.get_or_compute(n, move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(50)).await;
        Ok(n * 2)
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_computation() {
    init_logger();
    let cache = Arc::new(Cache::with_capacity(8));
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(16));

    let tasks = (0..16).map(|_| {
        let cache = cache.clone();
        let calls = calls.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            slow_double(&cache, 21, &calls).await
        })
    });

    for result in join_all(tasks).await {
        assert_eq!(result.unwrap(), Ok(42));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.info().misses, 1);
    assert_eq!(cache.info().hits, 15);
}

#[tokio::test]
async fn handles_taken_before_resolution_all_observe_it() {
    let cache = Cache::with_capacity(8);
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8).map(|_| slow_double(&cache, 5, &calls)).collect();
    let outcomes = join_all(handles).await;
    assert!(outcomes.iter().all(|outcome| *outcome == Ok(10)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn late_attach_replays_the_value() {
    let cache = Cache::with_capacity(8);
    let calls = Arc::new(AtomicUsize::new(0));

    assert_eq!(slow_double(&cache, 3, &calls).await, Ok(6));
    let late = slow_double(&cache, 3, &calls);
    assert!(late.is_ready());
    assert_eq!(late.await, Ok(6));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failures_are_replayed_to_every_waiter() {
    let cache = Cache::with_capacity(8);
    let calls = Arc::new(AtomicUsize::new(0));

    let fail = |calls: Arc<AtomicUsize>| {
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(20)).await;
            Err::<u32, _>("backend unavailable".to_string())
        }
    };

    let waiters: Vec<_> = (0..4)
        .map(|_| tokio::spawn(cache.get_or_compute(7, fail(calls.clone()))))
        .collect();
    for waiter in join_all(waiters).await {
        assert_eq!(waiter.unwrap(), Err("backend unavailable".to_string()));
    }

    let after = cache.get_or_compute(7, fail(calls.clone()));
    assert_eq!(after.await, Err("backend unavailable".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Retrying is an explicit decision of the caller.
    cache.invalidate(&7);
    assert_eq!(slow_double(&cache, 7, &calls).await, Ok(14));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_one_waiter_does_not_cancel_the_computation() {
    let cache = Cache::with_capacity(8);
    let calls = Arc::new(AtomicUsize::new(0));
    let handle = slow_double(&cache, 9, &calls);

    let first = tokio::spawn(handle.clone());
    let second = tokio::spawn(handle.clone());
    sleep(Duration::from_millis(10)).await;
    first.abort();

    assert_eq!(second.await.unwrap(), Ok(18));
    assert_eq!(handle.await, Ok(18));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn eviction_while_in_flight_does_not_duplicate_work() {
    init_logger();
    let cache = Cache::with_capacity(1);
    let calls = Arc::new(AtomicUsize::new(0));

    let running = tokio::spawn(slow_double(&cache, 1, &calls));
    sleep(Duration::from_millis(10)).await;

    // Push key 1 out of the map while its computation is still running.
    assert_eq!(cache.get_or_compute(2, || async { Ok(4) }).await, Ok(4));
    assert!(cache.get(&2).is_some());

    let joined = slow_double(&cache, 1, &calls);
    assert!(!joined.is_ready());
    assert_eq!(joined.await, Ok(2));
    assert_eq!(running.await.unwrap(), Ok(2));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn memoize_derives_keys_from_arguments() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetch = Memoize::new(
        Capacity::new(16),
        |(host, port): &(&'static str, u16)| {
            CacheKey::builder().arg(*host).kwarg("port", *port).build()
        },
        move |(host, port): (&'static str, u16)| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                Ok::<_, String>(format!("{host}:{port}"))
            }
        },
    );

    let handles = [
        fetch.call(("example.org", 443)).unwrap(),
        fetch.call(("example.org", 443)).unwrap(),
        fetch.call(("example.org", 80)).unwrap(),
    ];
    let outcomes = join_all(handles).await;
    assert_eq!(
        outcomes,
        [
            Ok("example.org:443".to_string()),
            Ok("example.org:443".to_string()),
            Ok("example.org:80".to_string()),
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn key_errors_surface_at_call_time() {
    let err = CacheKey::builder().arg(f64::NAN).build().unwrap_err();
    assert!(matches!(err, KeyError::Unhashable { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalidating_in_flight_entries_does_not_duplicate_work() {
    let cache = Cache::with_capacity(8);
    let calls = Arc::new(AtomicUsize::new(0));

    let running = tokio::spawn(slow_double(&cache, 4, &calls));
    sleep(Duration::from_millis(10)).await;
    assert!(cache.invalidate(&4));
    let after_invalidate = slow_double(&cache, 4, &calls);
    cache.clear();
    let after_clear = slow_double(&cache, 4, &calls);

    assert_eq!(after_invalidate.await, Ok(8));
    assert_eq!(after_clear.await, Ok(8));
    assert_eq!(running.await.unwrap(), Ok(8));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
