// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The operation log (C8): one structured tracing event per completed
//! exchange, classified by a status-code colour band and flagged slow
//! when its cost crosses a configured threshold. Mirrors the teacher's
//! `tracing`-event-per-PDU habit in `client/client.rs`/`cfg/logger.rs`,
//! generalised from PDU opcodes to PULL/PUSH/PULL-REPLY exchanges.

use std::time::Duration;

use tracing::{Level, event};

use crate::packet::PacketType;

/// Colour band derived from a reply's status code, matching the
/// traffic-light convention common to HTTP access logs: 2xx green, 3xx
/// grey, 4xx magenta, 5xx/other red.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBand {
    Green,
    Grey,
    Magenta,
    Red,
}

impl StatusBand {
    pub fn for_code(code: i32) -> Self {
        match code {
            200..=299 => Self::Green,
            300..=399 => Self::Grey,
            400..=499 => Self::Magenta,
            _ => Self::Red,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Grey => "grey",
            Self::Magenta => "magenta",
            Self::Red => "red",
        }
    }
}

/// One completed exchange, ready to be emitted as a structured event.
pub struct OpLogEntry<'a> {
    pub direction: PacketType,
    pub uri: &'a str,
    pub seq: u64,
    pub status_code: i32,
    pub status_text: &'a str,
    pub cost: Duration,
    pub slow: bool,
}

/// Emits one `OpLogEntry` as a `tracing` event at a level matching its
/// status band (errors at `WARN`, everything else at `DEBUG`), with the
/// band name as a field rather than literal ANSI colour codes — left to
/// whatever `tracing-subscriber` formatter layer is installed (§4.10).
pub fn record(entry: &OpLogEntry<'_>) {
    let band = StatusBand::for_code(entry.status_code);
    let cost_ms = entry.cost.as_secs_f64() * 1000.0;

    match band {
        StatusBand::Red | StatusBand::Magenta => {
            event!(
                Level::WARN,
                direction = ?entry.direction,
                uri = entry.uri,
                seq = entry.seq,
                status_code = entry.status_code,
                status = entry.status_text,
                status_band = band.as_str(),
                cost_ms,
                slow = entry.slow,
                "exchange completed"
            );
        },
        _ => {
            event!(
                Level::DEBUG,
                direction = ?entry.direction,
                uri = entry.uri,
                seq = entry.seq,
                status_code = entry.status_code,
                status = entry.status_text,
                status_band = band.as_str(),
                cost_ms,
                slow = entry.slow,
                "exchange completed"
            );
        },
    }
}

/// Classifies an exchange as slow against a configured threshold. A
/// `None` threshold disables slow-call classification entirely.
pub fn is_slow(cost: Duration, threshold: Option<Duration>) -> bool {
    threshold.is_some_and(|t| cost >= t)
}
