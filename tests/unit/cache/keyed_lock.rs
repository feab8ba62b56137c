use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;

#[test]
fn same_key_serializes_blocking_callers() {
    let locks = KeyedLocks::new();
    let active = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let threads = (0..6)
        .map(|_| {
            let locks = locks.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            std::thread::spawn(move || {
                let _g = locks.lock_blocking("k");
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect::<Vec<_>>();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(locks.in_flight(), 0);
}

#[test]
fn different_keys_do_not_block_each_other() {
    let locks = KeyedLocks::new();
    let a = locks.lock_blocking("a");
    let b = locks.lock_blocking("b");
    assert_eq!(locks.in_flight(), 2);
    assert_eq!(a.key(), "a");
    drop(a);
    assert_eq!(locks.in_flight(), 1);
    drop(b);
    assert_eq!(locks.in_flight(), 0);
}

#[tokio::test]
async fn async_lock_prunes_after_last_holder() {
    let locks = KeyedLocks::new();
    let g = locks.lock("k").await;

    let waiter = {
        let locks = locks.clone();
        tokio::spawn(async move {
            let _g = locks.lock("k").await;
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    // Waiter still references the entry.
    assert_eq!(locks.in_flight(), 1);
    drop(g);
    waiter.await.unwrap();
    assert_eq!(locks.in_flight(), 0);
}
