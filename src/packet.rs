// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Packet & Header contract (C1). The core consumes this shape; the
//! byte-level framing and compression are supplied by a concrete
//! [`crate::socket::Socket`] implementation and are out of scope here.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, Xerror};

/// Discriminates the three packet kinds the session core understands.
/// Numeric values are only required to be mutually distinct; a concrete
/// socket implementation is free to choose its own wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketType {
    Pull = 1,
    PullReply = 2,
    Push = 3,
}

/// Codec identifier for a packet's header or body segment. Opaque to the
/// core: it is passed through to whatever [`crate::socket::Socket`]
/// implementation does the actual (de)serialisation.
pub type CodecName = Box<str>;

/// Gzip compression level, `0` meaning disabled.
pub type GzipLevel = u8;

/// The header half of a packet: everything needed to route and correlate
/// it without touching the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub seq: u64,
    pub kind: PacketType,
    pub uri: Box<str>,
    pub status_code: i32,
    pub status: Box<str>,
    pub header_codec: CodecName,
    pub body_codec: CodecName,
    pub gzip: GzipLevel,
}

impl Header {
    pub fn new(seq: u64, kind: PacketType, uri: impl Into<Box<str>>) -> Self {
        Self {
            seq,
            kind,
            uri: uri.into(),
            status_code: ErrorCode::Ok.status_code(),
            status: ErrorCode::Ok.status_text().into(),
            header_codec: CodecName::from(""),
            body_codec: CodecName::from(""),
            gzip: 0,
        }
    }

    pub fn set_status(&mut self, err: &Xerror) {
        self.status_code = err.code.status_code();
        self.status = err.message.as_ref().into();
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq={} kind={:?} uri={}", self.seq, self.kind, self.uri)
    }
}

/// An inbound packet as delivered by the socket: the header plus the raw
/// encoded body. The body is decoded lazily by whichever target the
/// [`crate::context::ApiContext`] binder selected during header parsing.
#[derive(Debug, Clone)]
pub struct InboundPacket {
    pub header: Header,
    pub body: Bytes,
}

/// An outbound packet ready to hand to the socket's write primitive.
#[derive(Debug, Clone)]
pub struct OutboundPacket {
    pub header: Header,
    pub body: Bytes,
}

impl OutboundPacket {
    pub fn new(header: Header, body: Bytes) -> Self {
        Self { header, body }
    }
}

/// A caller-supplied mutation applied, in order, to the header of a
/// packet about to be sent by `GoPull`/`Push`. Lets callers override the
/// default codec/compression or attach extra headers without the core
/// needing to know about every possible knob.
pub type PacketSetting = Box<dyn FnOnce(&mut Header) + Send>;
