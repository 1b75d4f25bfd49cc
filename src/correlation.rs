// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The correlation table (C5): a concurrent map from outbound Seq to the
//! outstanding [`PullCmdHandle`] awaiting its reply. Grounded on the
//! teacher's `sending`/`reciver` `DashMap<u32, _>` pair in
//! `client/client.rs`, collapsed here into a single map since a PULL has
//! exactly one reply, not a stream.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::error::Xerror;

/// What a completed PULL hands back to the waiting caller (§3, PullCmd).
pub struct PullOutcome<R> {
    pub reply: Option<R>,
    pub err: Xerror,
    pub cost: Duration,
}

/// Type-erased half of an outstanding PULL: the correlation table stores
/// these without naming the reply type `R`. A concrete [`TypedPullCmd<R>`]
/// decodes the reply body and completes the caller's oneshot.
pub trait PullCmdHandle: Send + Sync {
    /// Decode the reply body into `R` and stash it for `finish()`.
    fn decode_reply(&mut self, bytes: &[u8]) -> anyhow::Result<()>;

    /// Apply a failure status directly, without attempting to decode a body
    /// (e.g. the reply carried a non-OK status, or the session closed
    /// while this PULL was outstanding).
    fn fail(&mut self, err: Xerror);

    /// Signal completion to the waiting caller, recording `cost`.
    fn finish(&mut self, cost: Duration);
}

struct TypedPullCmd<R> {
    tx: Option<oneshot::Sender<PullOutcome<R>>>,
    reply: Option<R>,
    err: Xerror,
}

impl<R: DeserializeOwned + Send + Sync + 'static> PullCmdHandle for TypedPullCmd<R> {
    fn decode_reply(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.reply = Some(serde_json::from_slice(bytes)?);
        Ok(())
    }

    fn fail(&mut self, err: Xerror) {
        self.err = err;
    }

    fn finish(&mut self, cost: Duration) {
        if let Some(tx) = self.tx.take() {
            let outcome = PullOutcome { reply: self.reply.take(), err: self.err.clone(), cost };
            // The receiver may already be gone if the caller dropped its
            // future (e.g. timed out); that is not this table's problem.
            let _ = tx.send(outcome);
        }
    }
}

/// Hands out monotonically increasing sequence numbers for outbound
/// PULL/PUSH packets. A plain `AtomicU64` replaces the source's
/// non-atomic counter (spec §9: "the source increments a plain integer
/// under a coarser lock than the one guarding the map it keys into ...
/// here a single atomic counter removes the race entirely").
#[derive(Default)]
pub struct SeqGenerator(AtomicU64);

impl SeqGenerator {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// The correlation table proper: outstanding PULLs keyed by Seq.
#[derive(Default)]
pub struct CorrelationTable {
    inflight: DashMap<u64, Box<dyn PullCmdHandle>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self { inflight: DashMap::new() }
    }

    /// Registers a new outstanding PULL and returns the receiver half the
    /// caller awaits on. Panics if `seq` is already registered — sequence
    /// numbers are generated by [`SeqGenerator`] and must never repeat
    /// while still in flight (§4.4 invariant: uniqueness of outstanding
    /// Seq).
    pub fn register<R: DeserializeOwned + Send + Sync + 'static>(
        &self,
        seq: u64,
    ) -> oneshot::Receiver<PullOutcome<R>> {
        let (tx, rx) = oneshot::channel();
        let cmd: Box<dyn PullCmdHandle> =
            Box::new(TypedPullCmd { tx: Some(tx), reply: None, err: Xerror::ok() });
        if self.inflight.insert(seq, cmd).is_some() {
            unreachable!("sequence number {seq} reused while still outstanding");
        }
        rx
    }

    /// Atomically removes and returns the outstanding PULL for `seq`, if
    /// any (at-most-once completion: a second PULL-REPLY for the same Seq
    /// finds nothing and is dropped per §4.1/§4.4).
    pub fn remove(&self, seq: u64) -> Option<Box<dyn PullCmdHandle>> {
        self.inflight.remove(&seq).map(|(_, cmd)| cmd)
    }

    /// Cancels every outstanding PULL with `ConnClosed`, draining the
    /// table so no caller is left waiting forever past session close
    /// (§4.6 invariant).
    pub fn drain_with_conn_closed(&self) {
        for mut entry in self.inflight.iter_mut() {
            entry.value_mut().fail(Xerror::conn_closed("session closed"));
            entry.value_mut().finish(Duration::ZERO);
        }
        self.inflight.clear();
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}
