// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A coarse, low-resolution clock (§4.1 step 2, §9 design note): under
//! load, stamping every inbound packet with `Instant::now()` is wasted
//! precision the op-log's slow-call classification doesn't need. A single
//! background tick refreshes a cached timestamp at a configurable
//! resolution (default 1ms); readers load it with a relaxed atomic read
//! instead of a syscall.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use tokio::task::JoinHandle;

/// A shared, periodically-refreshed approximation of `Instant::now()`.
pub struct CoarseClock {
    epoch: Instant,
    millis_since_epoch: AtomicU64,
    ticker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CoarseClock {
    /// Starts the background ticker at `resolution`. Dropping the returned
    /// `Arc`'s last handle stops the ticker (the spawned task holds only a
    /// `Weak` back-reference).
    pub fn start(resolution: Duration) -> Arc<Self> {
        let clock = Arc::new(Self {
            epoch: Instant::now(),
            millis_since_epoch: AtomicU64::new(0),
            ticker: std::sync::Mutex::new(None),
        });

        let weak = Arc::downgrade(&clock);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(resolution);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(clock) = weak.upgrade() else { break };
                let elapsed = clock.epoch.elapsed().as_millis() as u64;
                clock.millis_since_epoch.store(elapsed, Ordering::Relaxed);
            }
        });
        *clock.ticker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        clock
    }

    /// The clock's best approximation of "now", accurate to within one
    /// tick's resolution.
    pub fn now(&self) -> Instant {
        let millis = self.millis_since_epoch.load(Ordering::Relaxed);
        self.epoch + Duration::from_millis(millis)
    }
}

impl Drop for CoarseClock {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}
