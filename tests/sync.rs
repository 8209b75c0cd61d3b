mod common;
use common::{assert_force_fails, assert_forced};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use deferred::{FailurePolicy, Force, Status, SyncDeferred};

#[test]
fn concurrent_forces_share_one_run() {
    const THREADS: usize = 16;
    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);
    let cell: Arc<SyncDeferred<u64, String>> = Arc::new(SyncDeferred::from_thunk(move || {
        r.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok((1..=20).product())
    }));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cell = Arc::clone(&cell);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                *cell.force().unwrap()
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), 2_432_902_008_176_640_000);
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_failures_replayed() {
    const THREADS: usize = 8;
    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);
    let cell: Arc<SyncDeferred<i32, &str>> = Arc::new(SyncDeferred::from_thunk(move || {
        r.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        Err("unreachable host")
    }));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.force().unwrap_err().into_computation())
        })
        .collect();
    let payloads: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(payloads.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_force_fails!(cell, "unreachable host");
}

#[test]
fn retry_across_threads() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&attempts);
    let cell = Arc::new(SyncDeferred::with_policy(FailurePolicy::Retry, move || {
        if a.fetch_add(1, Ordering::SeqCst) == 0 {
            Err("cold cache")
        } else {
            Ok("warm")
        }
    }));

    assert_force_fails!(cell, "cold cache");
    let other = Arc::clone(&cell);
    let v = thread::spawn(move || *other.force().unwrap()).join().unwrap();
    assert_eq!(v, "warm");
    assert_forced!(cell, "warm");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn waiter_retries_after_failure() {
    let (started_tx, started_rx) = mpsc::channel();
    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);
    let cell: Arc<SyncDeferred<usize, &str>> = Arc::new(SyncDeferred::retrying(move || {
        match r.fetch_add(1, Ordering::SeqCst) {
            0 => {
                started_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(100));
                Err("first")
            }
            n => Ok(n),
        }
    }));

    let first = {
        let cell = Arc::clone(&cell);
        thread::spawn(move || cell.force().map(|v| *v).map_err(|e| e.into_computation()))
    };
    // The first attempt is still sleeping, so this force waits on it.
    started_rx.recv().unwrap();
    assert_forced!(cell, 1);

    assert_eq!(first.join().unwrap(), Err(Some(Arc::new("first"))));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(cell.status(), Status::Done);
}

#[test]
fn pair_of_shared_cells() {
    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);
    let a: SyncDeferred<i32> = SyncDeferred::from_value(1);
    let b = SyncDeferred::from_fn(move || {
        r.fetch_add(1, Ordering::SeqCst);
        2
    });

    assert_forced!(a, 1);
    assert_eq!(b.status(), Status::Pending);
    assert_eq!((&a, &b).force_all(), Ok((&1, &2)));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
