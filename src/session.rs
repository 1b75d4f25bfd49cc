// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The session core (C6): one `Session` per socket, owning the single
//! reader loop, the write-mutex-serialised writer, dispatch into the
//! worker pool, and graceful shutdown. Grounded directly on the teacher's
//! `ClientConnection` in `client/client.rs` — the reader loop, the write
//! mutex, and the correlation-table-driven reply matching all come from
//! there, generalised from iSCSI PDUs/ITTs to PULL/PUSH/PULL-REPLY
//! packets and `u64` sequence numbers.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    cfg::SessionConfig,
    clock::CoarseClock,
    context::{ApiContext, Bind, ContextPool},
    correlation::{CorrelationTable, PullOutcome, SeqGenerator},
    error::{ErrorCode, Xerror},
    oplog::{self, OpLogEntry},
    packet::{Header, OutboundPacket, PacketSetting, PacketType},
    router::{PullHandler, PushHandler},
    socket::{Socket, SocketId},
    worker_pool::{PoolError, WorkerPool},
};

/// Everything a `Session` needs that is shared across every session a
/// `Peer` owns: routers, the context pool, the worker pool, and the
/// coarse clock (§3.1 in the design notes — a `Peer` is the natural home
/// for these, a bare `Session` would otherwise have nowhere to put them).
pub struct SessionShared {
    pub pull_router: Arc<crate::router::Catalog<dyn PullHandler>>,
    pub push_router: Arc<crate::router::Catalog<dyn PushHandler>>,
    pub context_pool: Arc<ContextPool>,
    pub worker_pool: Arc<WorkerPool>,
    pub clock: Arc<CoarseClock>,
}

/// One multiplexed, bidirectional connection (C6).
pub struct Session {
    socket: Arc<dyn Socket>,
    shared: Arc<SessionShared>,
    config: SessionConfig,
    correlation: CorrelationTable,
    seq_gen: SeqGenerator,
    write_lock: AsyncMutex<()>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl Session {
    /// Spawns the reader loop and returns the session handle. The reader
    /// task holds its own `Arc<Session>` so the session stays alive for
    /// as long as the socket is being read, independent of whether the
    /// caller keeps its handle.
    pub fn spawn(
        socket: Arc<dyn Socket>,
        shared: Arc<SessionShared>,
        config: SessionConfig,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            socket,
            shared,
            config,
            correlation: CorrelationTable::new(),
            seq_gen: SeqGenerator::new(),
            write_lock: AsyncMutex::new(()),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        });

        let reader = Arc::clone(&session);
        tokio::spawn(async move { reader.run_reader().await });

        session
    }

    pub fn id(&self) -> SocketId {
        self.socket.id()
    }

    pub fn remote_addr(&self) -> String {
        self.socket.remote_addr()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The shared coarse clock (§4.1 step 2, §9): `ApiContext` uses this
    /// instead of `Instant::now()` to stamp exchange start/cost timestamps.
    pub(crate) fn clock(&self) -> &Arc<CoarseClock> {
        &self.shared.clock
    }

    /// The reader loop's outer shell (§4.1, §7): runs [`Self::read_loop`]
    /// on its own task so a panic anywhere in it — a malformed packet
    /// tripping an unexpected code path, a handler bug surfacing through
    /// dispatch — is caught at the task boundary rather than unwinding
    /// past `shutdown_internal`, which must run either way so outstanding
    /// `go_pull` callers are never left waiting forever.
    async fn run_reader(self: Arc<Self>) {
        let worker = Arc::clone(&self);
        let outcome = tokio::spawn(async move { worker.read_loop().await }).await;

        if let Err(join_err) = outcome
            && join_err.is_panic()
        {
            error!(session = self.id(), "reader task panicked, closing session");
        }

        self.shutdown_internal().await;
    }

    /// Read one packet, bind it, decode the body, dispatch. Never blocks
    /// on handler execution — only on the next `read_packet` call, which
    /// is the one await point allowed to take arbitrarily long (a peer
    /// that never sends anything more).
    async fn read_loop(self: Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.socket.set_read_deadline(self.config.read_timeout);
            let read = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.socket.read_packet() => result,
            };

            let packet = match read {
                Ok(Some(packet)) => packet,
                Ok(None) => break, // clean EOF: not an error, stop silently (§4.1 step 1)
                Err(err) => {
                    debug!(error = %err, session = self.id(), "read_packet failed, closing session");
                    break;
                },
            };

            self.dispatch_inbound(packet).await;
        }
    }

    async fn dispatch_inbound(self: &Arc<Self>, packet: crate::packet::InboundPacket) {
        let mut ctx = self.shared.context_pool.acquire();
        ctx.reinit(self, &seed_public(self.socket.as_ref()));

        let bind = ctx.bind(
            &packet.header,
            self.shared.pull_router.as_ref(),
            self.shared.push_router.as_ref(),
            &self.correlation,
            &self.config.default_body_codec,
        );

        match bind {
            Bind::Arg(mut slot) => {
                if let Err(err) = slot.decode(&packet.body) {
                    debug!(error = %err, uri = %packet.header.uri, "argument decode failed");
                    if packet.header.kind == PacketType::Pull {
                        self.write_error_reply(
                            &ctx,
                            packet.header.seq,
                            Xerror::bad_pull(err.to_string()),
                        )
                        .await;
                    }
                    self.shared.context_pool.release(ctx);
                    return;
                }
                ctx.set_arg(slot.into_any());
                self.dispatch_to_worker(ctx, packet.header);
            },
            Bind::PullReply(mut cmd) => {
                if packet.header.status_code != ErrorCode::Ok.status_code() {
                    cmd.fail(Xerror::new(
                        ErrorCode::from_status_code(packet.header.status_code),
                        packet.header.status.to_string(),
                    ));
                } else if let Err(err) = cmd.decode_reply(&packet.body) {
                    cmd.fail(Xerror::bad_pull(err.to_string()));
                }
                ctx.complete_pull_reply(cmd);
                self.log_exchange(&packet.header, &ctx);
                self.shared.context_pool.release(ctx);
            },
            Bind::RejectPull(err) => {
                if let Err(write_err) = ctx.reject_pull().await {
                    debug!(error = %write_err, "failed to write rejected-pull reply");
                }
                let _ = err;
                self.log_exchange(&packet.header, &ctx);
                self.shared.context_pool.release(ctx);
            },
            Bind::Drop => {
                self.shared.context_pool.release(ctx);
            },
        }
    }

    /// Dispatches a bound PULL/PUSH to the worker pool; handler execution
    /// never runs on the reader task (§4.1 step 4, §5 concurrency model).
    fn dispatch_to_worker(self: &Arc<Self>, mut ctx: Box<ApiContext>, header: Header) {
        let session = Arc::clone(self);
        let result = self.shared.worker_pool.go(async move {
            if let Err(err) = ctx.handle().await {
                debug!(error = %err, "handler dispatch failed");
            }
            session.log_exchange(&header, &ctx);
            session.shared.context_pool.release(ctx);
        });

        if let Err(PoolError::Saturated) = result {
            warn!(session = self.id(), "worker pool saturated, dropping exchange");
        }
    }

    fn log_exchange(&self, header: &Header, ctx: &ApiContext) {
        let cost = ctx.cost();
        oplog::record(&OpLogEntry {
            direction: header.kind,
            uri: ctx.path(),
            seq: header.seq,
            status_code: header.status_code,
            status_text: &header.status,
            cost,
            slow: oplog::is_slow(cost, self.config.slow_call_threshold),
        });
    }

    /// Writes a PULL-REPLY carrying `err` as the status, correlated back to
    /// the caller's own Seq — a reply with the wrong Seq can never match
    /// the client's correlation-table entry, leaving `go_pull` hanging
    /// instead of observing the failure (§4.2/§8).
    async fn write_error_reply(&self, ctx: &ApiContext, seq: u64, err: Xerror) {
        let mut header = Header::new(seq, PacketType::PullReply, ctx.path());
        header.set_status(&err);
        if let Err(write_err) = self.write_reply(header, Bytes::new()).await {
            debug!(error = %write_err, "failed to write error reply");
        }
    }

    /// Writes one frame under the session's write mutex, serialising
    /// against every other concurrent writer of this socket (handler
    /// replies, `Push`, `GoPull` requests) — grounded on the teacher's
    /// `writer: Mutex<OwnedWriteHalf>` in `client/client.rs`.
    pub async fn write_reply(&self, header: Header, body: Bytes) -> anyhow::Result<()> {
        self.write_packet(OutboundPacket::new(header, body)).await
    }

    async fn write_packet(&self, packet: OutboundPacket) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.socket.set_write_deadline(self.config.write_timeout);
        self.socket.write_packet(&packet).await
    }

    /// Issues a PULL and awaits its correlated reply (§4.4). `settings`
    /// run, in order, against the outbound header before it is written.
    pub async fn go_pull<A, R>(
        &self,
        uri: &str,
        arg: &A,
        settings: Vec<PacketSetting>,
    ) -> Result<R, Xerror>
    where
        A: Serialize,
        R: DeserializeOwned + Send + Sync + 'static,
    {
        if self.is_closed() {
            return Err(Xerror::conn_closed("session closed"));
        }

        let seq = self.seq_gen.next();
        let body = serde_json::to_vec(arg)
            .map(Bytes::from)
            .map_err(|e| Xerror::bad_pull(format!("argument encode failed: {e}")))?;

        let mut header = Header::new(seq, PacketType::Pull, uri.to_string());
        header.body_codec = self.config.default_body_codec.clone();
        for setting in settings {
            setting(&mut header);
        }

        // Only register once the write has actually landed (§4.4): registering
        // first would let a concurrent `close()` drain and complete an entry
        // for a Seq that was never written to the wire.
        if let Err(err) = self.write_packet(OutboundPacket::new(header, body)).await {
            return Err(Xerror::write_failed(err.to_string()));
        }

        let rx = self.correlation.register::<R>(seq);

        let outcome: PullOutcome<R> = match self.config.read_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_canceled)) => return Err(Xerror::conn_closed("session closed")),
                Err(_elapsed) => {
                    self.correlation.remove(seq);
                    return Err(Xerror::bad_pull("pull timed out"));
                },
            },
            None => match rx.await {
                Ok(outcome) => outcome,
                Err(_canceled) => return Err(Xerror::conn_closed("session closed")),
            },
        };

        if !outcome.err.is_ok() {
            return Err(outcome.err);
        }
        outcome.reply.ok_or_else(|| Xerror::bad_pull("reply body missing"))
    }

    /// Issues a PUSH; there is no reply to await (§4.5).
    pub async fn push<A: Serialize>(
        &self,
        uri: &str,
        arg: &A,
        settings: Vec<PacketSetting>,
    ) -> Result<(), Xerror> {
        if self.is_closed() {
            return Err(Xerror::conn_closed("session closed"));
        }

        let seq = self.seq_gen.next();
        let body = serde_json::to_vec(arg)
            .map(Bytes::from)
            .map_err(|e| Xerror::bad_pull(format!("argument encode failed: {e}")))?;

        let mut header = Header::new(seq, PacketType::Push, uri.to_string());
        header.body_codec = self.config.default_body_codec.clone();
        for setting in settings {
            setting(&mut header);
        }

        self.write_packet(OutboundPacket::new(header, body))
            .await
            .map_err(|e| Xerror::write_failed(e.to_string()))
    }

    /// Re-keys the underlying socket's identity (§4.7). The caller (a
    /// `Peer`) must insert the session under `new_id` before removing the
    /// old entry, so a concurrent lookup never misses it.
    pub fn change_id(&self, new_id: SocketId) {
        self.socket.change_id(new_id);
    }

    /// Graceful shutdown (§4.6): signals the reader to stop, drains the
    /// correlation table with `ConnClosed`, and closes the socket. Safe to
    /// call more than once or concurrently with the reader noticing EOF —
    /// both converge on the same `shutdown_internal`.
    pub async fn close(&self) -> anyhow::Result<()> {
        self.cancel.cancel();
        self.shutdown_internal().await;
        Ok(())
    }

    async fn shutdown_internal(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return; // already closed; at-most-once per §4.6 invariant
        }

        self.correlation.drain_with_conn_closed();

        if self.config.await_workers_on_close {
            self.shared.worker_pool.drain_outstanding().await;
        }

        if let Err(err) = self.socket.close().await {
            debug!(error = %err, session = self.id(), "socket close failed");
        }
    }
}

fn seed_public(socket: &dyn Socket) -> std::collections::HashMap<String, String> {
    // Concrete sockets expose an arbitrary-sized bag; the core only seeds
    // what is cheap to enumerate up front. A socket with no public keys
    // yields an empty map, which is the common case.
    let mut map = std::collections::HashMap::with_capacity(socket.public_len());
    if let Some(remote) = socket.public("remote_addr") {
        map.insert("remote_addr".to_string(), remote);
    }
    map
}
