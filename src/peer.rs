// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `Peer`: the minimal concrete owner of everything a `Session` needs but
//! shouldn't hold itself — the routers, the shared context/worker pools,
//! the coarse clock, and a hub of live sessions keyed by socket identity.
//! Grounded on the teacher's `Pool` in `client/pool_sessions.rs`, which
//! plays the same role for `Session`/`Connection`: a `DashMap` keyed by a
//! numeric id holding weak-enough references that closing one connection
//! doesn't have to walk every other one.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    cfg::SessionConfig,
    clock::CoarseClock,
    context::ContextPool,
    router::{Catalog, PullHandler, PushHandler},
    session::{Session, SessionShared},
    socket::{Socket, SocketId},
    worker_pool::WorkerPool,
};

/// A symmetric peer: the same type accepts inbound sockets and dials
/// outbound ones, since PULL/PUSH/PULL-REPLY are symmetric in both
/// directions (§1 Purpose & Scope).
pub struct Peer {
    shared: Arc<SessionShared>,
    config: SessionConfig,
    sessions: DashMap<SocketId, std::sync::Weak<Session>>,
}

impl Peer {
    pub fn new(config: SessionConfig) -> Self {
        let shared = Arc::new(SessionShared {
            pull_router: Arc::new(Catalog::new()),
            push_router: Arc::new(Catalog::new()),
            context_pool: Arc::new(ContextPool::new()),
            worker_pool: WorkerPool::new(config.worker_pool_capacity, config.worker_pool_idle_timeout),
            clock: CoarseClock::start(config.coarse_clock_resolution()),
        });

        Self { shared, config, sessions: DashMap::new() }
    }

    /// Registers a PULL handler under `path`.
    pub fn handle_pull(&self, path: impl Into<Box<str>>, handler: Arc<dyn PullHandler>) {
        self.shared.pull_router.register(path, handler);
    }

    /// Registers a PUSH handler under `path`.
    pub fn handle_push(&self, path: impl Into<Box<str>>, handler: Arc<dyn PushHandler>) {
        self.shared.push_router.register(path, handler);
    }

    /// Adopts an accepted or dialled socket, starting its reader loop and
    /// registering it in the session hub under the socket's current id.
    pub fn adopt(&self, socket: Arc<dyn Socket>) -> Arc<Session> {
        let id = socket.id();
        let session = Session::spawn(socket, Arc::clone(&self.shared), self.config.clone());
        self.sessions.insert(id, Arc::downgrade(&session));
        session
    }

    /// Identical to `adopt`; named separately so call sites can say which
    /// side of the connection they're on, matching the symmetric-peer
    /// terminology in §1/§6.
    pub fn accept(&self, socket: Arc<dyn Socket>) -> Arc<Session> {
        self.adopt(socket)
    }

    pub fn dial(&self, socket: Arc<dyn Socket>) -> Arc<Session> {
        self.adopt(socket)
    }

    pub fn session(&self, id: SocketId) -> Option<Arc<Session>> {
        self.sessions.get(&id).and_then(|weak| weak.upgrade())
    }

    /// Re-keys a session after its socket's identity changed (§4.7): the
    /// new id is inserted before the old one is removed, so a concurrent
    /// lookup by either id always finds a live session.
    pub fn rekey(&self, session: &Arc<Session>, old_id: SocketId, new_id: SocketId) {
        self.sessions.insert(new_id, Arc::downgrade(session));
        self.sessions.remove(&old_id);
    }

    /// Drops dead weak entries left behind by sessions that closed
    /// without going through `rekey`/explicit removal.
    pub fn sweep(&self) {
        self.sessions.retain(|_, weak| weak.strong_count() > 0);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
