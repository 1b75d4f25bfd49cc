// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The pooled per-packet execution context (C4). One `ApiContext` is
//! taken from the pool per inbound packet, reinitialised, used for
//! exactly one exchange, cleaned, and returned — eliminating per-packet
//! allocation in steady state the same way the teacher's connection
//! avoids per-PDU buffer churn.

use std::{
    any::Any,
    collections::HashMap,
    marker::PhantomData,
    sync::{Arc, Mutex, Weak},
    time::{Duration, Instant},
};

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{
    correlation::PullCmdHandle,
    error::Xerror,
    packet::{CodecName, Header, PacketType},
    router::{PullHandler, PushHandler},
    session::Session,
};

/// Type-erased decode target for a handler argument. A concrete
/// `JsonArgSlot<A>` is manufactured by the matched [`PullHandler`]/
/// [`PushHandler`] at bind time, binding the concrete `A` without the
/// core ever naming it.
pub trait ArgSlot: Send {
    fn decode(&mut self, bytes: &[u8]) -> anyhow::Result<()>;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// The one concrete codec this crate ships (JSON, via `serde_json`). Other
/// wire encodings are a Socket/Codec-stack concern and out of scope.
pub struct JsonArgSlot<A> {
    value: Option<A>,
}

impl<A> JsonArgSlot<A> {
    pub fn empty() -> Self {
        Self { value: None }
    }
}

impl<A: DeserializeOwned + Send + 'static> ArgSlot for JsonArgSlot<A> {
    fn decode(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.value = Some(serde_json::from_slice(bytes)?);
        Ok(())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        Box::new(
            self.value
                .unwrap_or_else(|| unreachable!("decode must run before into_any")),
        )
    }
}

/// What the reader should do once the body bytes for this packet have
/// arrived, decided synchronously during header binding (§4.2).
pub enum Bind {
    /// PUSH or PULL matched a route: decode the argument, then dispatch.
    Arg(Box<dyn ArgSlot>),
    /// PULL-REPLY matched an outstanding [`PullCmdHandle`]: decode the
    /// reply body directly into it.
    PullReply(Box<dyn PullCmdHandle>),
    /// PULL with no matching route / a malformed URI: no handler runs,
    /// but a PULL-REPLY with the given status must still be written.
    RejectPull(Xerror),
    /// PUSH with no matching route, or an unrecognised packet type, or a
    /// PULL-REPLY for an unknown/already-completed Seq: drop the body,
    /// no reply.
    Drop,
}

/// Lazily parses `key=value` pairs out of a URI's query string.
fn parse_query(uri: &str) -> (Box<str>, HashMap<Box<str>, Box<str>>) {
    match uri.split_once('?') {
        None => (uri.into(), HashMap::new()),
        Some((path, qs)) => {
            let mut map = HashMap::new();
            for pair in qs.split('&').filter(|s| !s.is_empty()) {
                match pair.split_once('=') {
                    Some((k, v)) => {
                        map.insert(k.into(), v.into());
                    },
                    None => {
                        map.insert(pair.into(), "".into());
                    },
                }
            }
            (path.into(), map)
        },
    }
}

enum HandlerRef {
    Pull(Arc<dyn PullHandler>),
    Push(Arc<dyn PushHandler>),
}

/// One in-flight packet exchange (C4 of the data model). Pooled: `clean()`
/// must clear every reference before the context is reused, or handler
/// arguments from a previous request would leak into the next one.
pub struct ApiContext {
    session: Option<Weak<Session>>,
    path: Box<str>,
    query: HashMap<Box<str>, Box<str>>,
    public: HashMap<Box<str>, Box<str>>,
    handler: Option<HandlerRef>,
    arg: Option<Box<dyn Any + Send>>,
    out_header: Option<Header>,
    start: Option<Instant>,
    cost: Duration,
    /// Intrusive free-list link used by [`ContextPool`].
    next: Option<Box<ApiContext>>,
}

impl ApiContext {
    fn new() -> Self {
        Self {
            session: None,
            path: "".into(),
            query: HashMap::new(),
            public: HashMap::new(),
            handler: None,
            arg: None,
            out_header: None,
            start: None,
            cost: Duration::ZERO,
            next: None,
        }
    }

    /// Reinitialise a freshly-taken context for a new exchange on `session`.
    pub fn reinit(&mut self, session: &Arc<Session>, seed_public: &HashMap<String, String>) {
        self.session = Some(Arc::downgrade(session));
        self.public = seed_public
            .iter()
            .map(|(k, v)| (k.as_str().into(), v.as_str().into()))
            .collect();
    }

    /// The header-binding step (§4.2): records the start timestamp and
    /// decides the body target by packet type.
    pub fn bind(
        &mut self,
        header: &Header,
        pull_router: &dyn crate::router::Router<dyn PullHandler>,
        push_router: &dyn crate::router::Router<dyn PushHandler>,
        correlation: &crate::correlation::CorrelationTable,
        default_body_codec: &str,
    ) -> Bind {
        self.start = Some(
            self.session
                .as_ref()
                .and_then(Weak::upgrade)
                .map(|s| s.clock().now())
                .unwrap_or_else(Instant::now),
        );

        match header.kind {
            PacketType::Push => {
                let (path, query) = parse_query(&header.uri);
                self.path = path;
                self.query = query;
                match push_router.get(&self.path) {
                    None => Bind::Drop,
                    Some(handler) => {
                        let slot = handler.new_arg_slot();
                        self.handler = Some(HandlerRef::Push(handler));
                        Bind::Arg(slot)
                    },
                }
            },
            PacketType::Pull => {
                let (path, query) = parse_query(&header.uri);
                self.path = path.clone();
                self.query = query;

                let mut out = Header::new(header.seq, PacketType::PullReply, path);
                out.header_codec = header.header_codec.clone();
                out.gzip = header.gzip;
                out.body_codec = if header.body_codec.is_empty() {
                    default_body_codec.into()
                } else {
                    header.body_codec.clone()
                };

                match pull_router.get(&self.path) {
                    None => {
                        let err = Xerror::not_found(format!("no route for {}", self.path));
                        out.set_status(&err);
                        self.out_header = Some(out);
                        Bind::RejectPull(err)
                    },
                    Some(handler) => {
                        let slot = handler.new_arg_slot();
                        self.handler = Some(HandlerRef::Pull(handler));
                        self.out_header = Some(out);
                        Bind::Arg(slot)
                    },
                }
            },
            PacketType::PullReply => match correlation.remove(header.seq) {
                None => Bind::Drop,
                Some(cmd) => Bind::PullReply(cmd),
            },
        }
    }

    /// Stores the decoded argument ahead of `handle()`.
    pub fn set_arg(&mut self, arg: Box<dyn Any + Send>) {
        self.arg = Some(arg);
    }

    /// Runs the matched handler (PULL or PUSH) and, for PULL, writes the
    /// reply back through the session's serialised writer.
    pub async fn handle(&mut self) -> anyhow::Result<()> {
        let Some(session) = self.session.as_ref().and_then(Weak::upgrade) else {
            return Ok(());
        };
        let Some(handler) = self.handler.take() else {
            return Ok(());
        };
        let Some(arg) = self.arg.take() else {
            return Ok(());
        };

        let handle = ApiHandle {
            session: &session,
            path: &self.path,
            query: &self.query,
            public: &self.public,
        };

        match handler {
            HandlerRef::Push(h) => {
                h.call(handle, arg).await;
            },
            HandlerRef::Pull(h) => {
                let (body, codec, err) = h.call(handle, arg).await;
                let mut out = self
                    .out_header
                    .take()
                    .unwrap_or_else(|| Header::new(0, PacketType::PullReply, self.path.clone()));
                out.set_status(&err);
                if out.body_codec.is_empty() {
                    out.body_codec = codec;
                }
                let now = session.clock().now();
                self.cost = self
                    .start
                    .map(|s| now.saturating_duration_since(s))
                    .unwrap_or_default();
                session.write_reply(out, body).await?;
            },
        }
        Ok(())
    }

    /// Writes a PULL-REPLY carrying a rejection status with no handler
    /// invocation (malformed URI / unknown route, §4.2).
    pub async fn reject_pull(&mut self) -> anyhow::Result<()> {
        let Some(session) = self.session.as_ref().and_then(Weak::upgrade) else {
            return Ok(());
        };
        let out = self
            .out_header
            .take()
            .unwrap_or_else(|| Header::new(0, PacketType::PullReply, self.path.clone()));
        let now = session.clock().now();
        self.cost = self
            .start
            .map(|s| now.saturating_duration_since(s))
            .unwrap_or_default();
        session.write_reply(out, Bytes::new()).await
    }

    /// Completes the correlated [`PullCmdHandle`] (§4.4's `pullReplyHandle`).
    pub fn complete_pull_reply(&mut self, mut cmd: Box<dyn PullCmdHandle>) {
        let now = self
            .session
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|s| s.clock().now())
            .unwrap_or_else(Instant::now);
        let cost = self
            .start
            .map(|s| now.saturating_duration_since(s))
            .unwrap_or_default();
        self.cost = cost;
        cmd.finish(cost);
    }

    pub fn start(&self) -> Option<Instant> {
        self.start
    }

    pub fn cost(&self) -> Duration {
        self.cost
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Clears every reference so pool reuse cannot leak a prior request's
    /// handler, argument, or session (§4.2 `clean()`, §5 memory recycling).
    pub fn clean(&mut self) {
        self.session = None;
        self.path = "".into();
        self.query.clear();
        self.public.clear();
        self.handler = None;
        self.arg = None;
        self.out_header = None;
        self.start = None;
        self.cost = Duration::ZERO;
    }
}

/// A receiver-adapter handed to handlers: read-only access to the routed
/// path, query, and per-request public map, plus the session itself so a
/// handler may issue its own PUSH/PULL calls.
pub struct ApiHandle<'a> {
    session: &'a Arc<Session>,
    path: &'a str,
    query: &'a HashMap<Box<str>, Box<str>>,
    public: &'a HashMap<Box<str>, Box<str>>,
}

impl<'a> ApiHandle<'a> {
    pub fn session(&self) -> &Arc<Session> {
        self.session
    }

    pub fn path(&self) -> &str {
        self.path
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(|v| v.as_ref())
    }

    pub fn public(&self, key: &str) -> Option<&str> {
        self.public.get(key).map(|v| v.as_ref())
    }
}

/// A bounded free-list of [`ApiContext`]s, shared across sessions owned by
/// the same `Peer`. An intrusive `next` pointer (§9) backs the free-list;
/// a mutex-guarded head is sufficient since acquire/release are cheap,
/// non-blocking operations.
pub struct ContextPool {
    free: Mutex<Option<Box<ApiContext>>>,
    _marker: PhantomData<()>,
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextPool {
    pub fn new() -> Self {
        Self { free: Mutex::new(None), _marker: PhantomData }
    }

    /// Takes a context from the pool, or allocates a fresh one.
    pub fn acquire(&self) -> Box<ApiContext> {
        let popped = {
            let mut head = self.free.lock().unwrap_or_else(|e| e.into_inner());
            head.take()
        };
        match popped {
            Some(mut ctx) => {
                ctx.next = None;
                ctx
            },
            None => Box::new(ApiContext::new()),
        }
    }

    /// Cleans and returns a context to the pool.
    pub fn release(&self, mut ctx: Box<ApiContext>) {
        ctx.clean();
        let mut head = self.free.lock().unwrap_or_else(|e| e.into_inner());
        ctx.next = head.take();
        *head = Some(ctx);
    }
}

/// Body encoding used when a handler/caller doesn't override it (§4.4,
/// §4.5 inherit-from-request behaviour). Re-exported for callers building
/// [`crate::packet::PacketSetting`]s.
pub const DEFAULT_BODY_CODEC: &str = "json";

pub fn encode_json<T: serde::Serialize>(value: &T) -> anyhow::Result<(Bytes, CodecName)> {
    Ok((Bytes::from(serde_json::to_vec(value)?), CodecName::from("json")))
}
