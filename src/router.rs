// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Router contract (C3): a URI path maps to a [`Handler`] descriptor
//! carrying the argument type (erased, see [`crate::context::ArgSlot`])
//! and the invoker. The source binds argument types via reflection at
//! registration time; here the same effect is had with a handler table
//! whose entries carry a type-erased decode function and a typed
//! invoker closure, per the redesign note in spec §9.

use std::{future::Future, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    context::{ApiHandle, ArgSlot, JsonArgSlot},
    error::Xerror,
    packet::CodecName,
};

/// A PULL handler: decodes an argument, runs, and produces a reply body
/// plus status (`Xerror::ok()` on success).
#[async_trait]
pub trait PullHandler: Send + Sync {
    fn new_arg_slot(&self) -> Box<dyn ArgSlot>;

    async fn call(
        &self,
        handle: ApiHandle<'_>,
        arg: Box<dyn std::any::Any + Send>,
    ) -> (Bytes, CodecName, Xerror);
}

/// A PUSH handler: decodes an argument and runs; no reply is produced.
#[async_trait]
pub trait PushHandler: Send + Sync {
    fn new_arg_slot(&self) -> Box<dyn ArgSlot>;

    async fn call(&self, handle: ApiHandle<'_>, arg: Box<dyn std::any::Any + Send>);
}

/// URI path → handler descriptor lookup, per §6 ("Router contract: `get(path)
/// -> (Handler, present)`"). Generic over the handler kind so the same
/// shape serves both the pull-request and push routers a `Session` holds.
pub trait Router<H: ?Sized>: Send + Sync {
    fn get(&self, path: &str) -> Option<Arc<H>>;
}

/// The concrete router this crate ships: a flat, concurrent path table.
/// Route construction (prefix trees, middleware chains, …) is out of
/// scope — this is deliberately the simplest thing that satisfies the
/// `get(path) -> (Handler, present)` contract.
#[derive(Default)]
pub struct Catalog<H: ?Sized> {
    routes: DashMap<Box<str>, Arc<H>>,
}

impl<H: ?Sized> Catalog<H> {
    pub fn new() -> Self {
        Self { routes: DashMap::new() }
    }

    pub fn register(&self, path: impl Into<Box<str>>, handler: Arc<H>) {
        self.routes.insert(path.into(), handler);
    }
}

impl<H: ?Sized + Send + Sync> Router<H> for Catalog<H> {
    fn get(&self, path: &str) -> Option<Arc<H>> {
        self.routes.get(path).map(|e| Arc::clone(e.value()))
    }
}

/// A [`PullHandler`] built from a plain async closure, binding the
/// argument and reply types at registration time — the idiomatic
/// replacement for the source's reflection-driven dispatch.
struct FnPullHandler<A, R, F> {
    f: F,
    _marker: PhantomData<fn(A) -> R>,
}

#[async_trait]
impl<A, R, F, Fut> PullHandler for FnPullHandler<A, R, F>
where
    A: DeserializeOwned + Send + Sync + 'static,
    R: Serialize + Send + 'static,
    F: Fn(ApiHandle<'_>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Xerror>> + Send,
{
    fn new_arg_slot(&self) -> Box<dyn ArgSlot> {
        Box::new(JsonArgSlot::<A>::empty())
    }

    async fn call(
        &self,
        handle: ApiHandle<'_>,
        arg: Box<dyn std::any::Any + Send>,
    ) -> (Bytes, CodecName, Xerror) {
        let arg = *arg
            .downcast::<A>()
            .unwrap_or_else(|_| unreachable!("arg slot type matches registration"));
        match (self.f)(handle, arg).await {
            Ok(reply) => match serde_json::to_vec(&reply) {
                Ok(bytes) => (Bytes::from(bytes), CodecName::from("json"), Xerror::ok()),
                Err(e) => (
                    Bytes::new(),
                    CodecName::from("json"),
                    Xerror::bad_pull(format!("reply encode failed: {e}")),
                ),
            },
            Err(err) => (Bytes::new(), CodecName::from("json"), err),
        }
    }
}

/// Register a PULL route backed by an async closure `(handle, arg) ->
/// Result<reply, Xerror>`.
pub fn pull_handler<A, R, F, Fut>(f: F) -> Arc<dyn PullHandler>
where
    A: DeserializeOwned + Send + Sync + 'static,
    R: Serialize + Send + 'static,
    F: Fn(ApiHandle<'_>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Xerror>> + Send,
{
    Arc::new(FnPullHandler { f, _marker: PhantomData })
}

struct FnPushHandler<A, F> {
    f: F,
    _marker: PhantomData<fn(A)>,
}

#[async_trait]
impl<A, F, Fut> PushHandler for FnPushHandler<A, F>
where
    A: DeserializeOwned + Send + Sync + 'static,
    F: Fn(ApiHandle<'_>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    fn new_arg_slot(&self) -> Box<dyn ArgSlot> {
        Box::new(JsonArgSlot::<A>::empty())
    }

    async fn call(&self, handle: ApiHandle<'_>, arg: Box<dyn std::any::Any + Send>) {
        let arg = *arg
            .downcast::<A>()
            .unwrap_or_else(|_| unreachable!("arg slot type matches registration"));
        (self.f)(handle, arg).await;
    }
}

/// Register a PUSH route backed by an async closure `(handle, arg) -> ()`.
pub fn push_handler<A, F, Fut>(f: F) -> Arc<dyn PushHandler>
where
    A: DeserializeOwned + Send + Sync + 'static,
    F: Fn(ApiHandle<'_>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    Arc::new(FnPushHandler { f, _marker: PhantomData })
}
