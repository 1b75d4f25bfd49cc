use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use symplex::worker_pool::WorkerPool;
use tokio::sync::Notify;

#[tokio::test]
async fn go_admits_jobs_up_to_capacity_and_tracks_in_use() {
    let pool = WorkerPool::new(2, Duration::from_secs(60));
    let gate = Arc::new(Notify::new());

    let gate1 = Arc::clone(&gate);
    pool.go(async move {
        gate1.notified().await;
    })
    .expect("first job admitted");

    let gate2 = Arc::clone(&gate);
    pool.go(async move {
        gate2.notified().await;
    })
    .expect("second job admitted");

    assert_eq!(pool.in_use(), 2);

    let third = pool.go(async {});
    assert!(matches!(third, Err(symplex::worker_pool::PoolError::Saturated)));

    gate.notify_waiters();
    // give the spawned tasks a chance to observe the notify and release.
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(pool.in_use(), 0);
}

#[tokio::test]
async fn drain_outstanding_waits_for_every_permit() {
    let pool = WorkerPool::new(1, Duration::from_secs(60));
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = Arc::clone(&ran);

    pool.go(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        ran_clone.store(1, Ordering::SeqCst);
    })
    .expect("job admitted");

    pool.drain_outstanding().await;
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}
