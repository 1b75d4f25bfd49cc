// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A symmetric, bidirectional RPC session core: PULL (request/reply),
//! PUSH (fire-and-forget), and PULL-REPLY correlation multiplexed over a
//! single framed [`socket::Socket`]. See each module's docs for the
//! corresponding design component (C1-C8).

pub mod cfg;
pub mod clock;
pub mod context;
pub mod correlation;
pub mod error;
pub mod oplog;
pub mod packet;
pub mod peer;
pub mod router;
pub mod session;
pub mod socket;
pub mod worker_pool;

pub use error::{ErrorCode, Xerror};
pub use packet::{Header, InboundPacket, OutboundPacket, PacketType};
pub use peer::Peer;
pub use session::Session;
