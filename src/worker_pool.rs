// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The worker pool contract (C7): bounds how many dispatched handler
//! invocations run concurrently, so a flood of inbound PULL/PUSH packets
//! cannot unboundedly spawn tasks. `go()` never blocks the caller (the
//! reader loop must never stall on dispatch, §4.1 invariant) — it either
//! gets a permit immediately or reports `PoolError::Saturated`.

use std::{
    sync::Arc,
    time::Duration,
};

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool saturated (capacity reached)")]
    Saturated,
}

/// Default concurrent-task capacity (§6 external interfaces).
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default utilisation-report cadence.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WorkerPool {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    reporter: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(capacity: usize, idle_report_interval: Duration) -> Arc<Self> {
        let pool = Arc::new(Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            reporter: std::sync::Mutex::new(None),
        });

        let semaphore = Arc::clone(&pool.semaphore);
        let capacity_for_task = capacity;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(idle_report_interval);
            loop {
                interval.tick().await;
                let in_use = capacity_for_task - semaphore.available_permits();
                if in_use > 0 {
                    debug!(in_use, capacity = capacity_for_task, "worker pool utilisation");
                }
            }
        });
        *pool.reporter.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        pool
    }

    /// Admits `job` if a permit is immediately available, spawning it on
    /// the Tokio runtime; otherwise returns `Saturated` without blocking.
    pub fn go<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|_| PoolError::Saturated)?;
        tokio::spawn(async move {
            job.await;
            drop(permit);
        });
        Ok(())
    }

    /// Waits until every in-flight job has finished by acquiring (then
    /// immediately releasing) all `capacity` permits. Used by `Session::
    /// close` when `await_workers_on_close` is set (§9 Open Question).
    pub async fn drain_outstanding(&self) {
        let _permits = self.semaphore.acquire_many(self.capacity as u32).await;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(handle) = self.reporter.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}
