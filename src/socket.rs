// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Socket contract (C2). The session core never touches bytes
//! directly; it drives a `Socket` implementation that owns frame assembly,
//! compression, and the byte-level I/O. Only the narrow interface the
//! core needs is specified here — concrete transports (TCP, QUIC, …) are
//! out of scope for this crate; [`memory::DuplexSocket`] is the in-memory
//! double used to exercise the core in tests.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::packet::{InboundPacket, OutboundPacket};

/// Stable identity of one end of a socket. Concrete sockets are free to
/// choose their own representation (address, connection id, …); the core
/// only needs equality/hashing to use it as a session-hub key.
pub type SocketId = u64;

/// One framed connection. Implementations decide how a `Header` + body is
/// turned into (and recovered from) bytes on the wire; the session core
/// only calls the methods below.
///
/// The source's "binder invoked mid-parse" coupling (header parsed, then
/// immediately asked where the body goes) is expressed here as two plain
/// sequential steps instead of a callback threaded through the socket:
/// `read_packet` hands back the header and raw body bytes together, and
/// the caller (the session reader) performs the header-bind/body-decode
/// step itself before the next packet is read. The invariant that binding
/// happens before dispatch, and before the reader advances to the next
/// packet, is preserved; only the mechanism changed; trait-object
/// callbacks crossing an `.await` boundary would have needed the binder to
/// be `Sync` for no real benefit here.
#[async_trait]
pub trait Socket: Send + Sync {
    /// Reads exactly one packet, or `None` on a clean EOF.
    async fn read_packet(&self) -> Result<Option<InboundPacket>>;

    /// Serialises and writes one full frame.
    async fn write_packet(&self, packet: &OutboundPacket) -> Result<()>;

    fn set_read_deadline(&self, timeout: Option<Duration>);
    fn set_write_deadline(&self, timeout: Option<Duration>);

    fn id(&self) -> SocketId;
    /// Swap the socket's identity. The caller (the owning `Session`,
    /// really `Peer`) is responsible for re-registering under the new id
    /// before dropping the old one, per §4.7.
    fn change_id(&self, new_id: SocketId);

    async fn close(&self) -> Result<()>;

    fn remote_addr(&self) -> String;

    /// Socket-level key/value bag, seeded into every `ApiContext`'s public
    /// map on construction (§3, ApiContext fields).
    fn public(&self, key: &str) -> Option<String>;
    fn public_len(&self) -> usize;
}

pub mod memory;
