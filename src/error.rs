// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{borrow::Cow, fmt};

use thiserror::Error;

/// Well-known status codes carried on the wire and surfaced to callers.
///
/// `Ok` is the only code that does not represent a failure; it exists so a
/// [`Xerror`] can double as the "status" half of a successful reply without
/// a separate `Option` wrapper at the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    BadPull,
    NotFound,
    ConnClosed,
    WriteFailed,
}

impl ErrorCode {
    /// Canonical wire status text for this code.
    pub const fn status_text(self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK",
            ErrorCode::BadPull => "Bad Pull",
            ErrorCode::NotFound => "Not Found",
            ErrorCode::ConnClosed => "Connection Closed",
            ErrorCode::WriteFailed => "Write Failed",
        }
    }

    /// Numeric status code, loosely modelled on HTTP bands so
    /// [`crate::oplog::StatusBand`] can classify it the same way.
    pub const fn status_code(self) -> i32 {
        match self {
            ErrorCode::Ok => 200,
            ErrorCode::BadPull => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::ConnClosed => 503,
            ErrorCode::WriteFailed => 502,
        }
    }

    /// Reverses `status_code`, for reconstructing an `ErrorCode` from a
    /// status carried on the wire by a peer (itself always one of this
    /// crate's own codes). Unrecognised codes fall back to `BadPull`
    /// rather than panicking — a future peer may send a code this
    /// version doesn't know about yet.
    pub const fn from_status_code(code: i32) -> Self {
        match code {
            200 => ErrorCode::Ok,
            404 => ErrorCode::NotFound,
            503 => ErrorCode::ConnClosed,
            502 => ErrorCode::WriteFailed,
            _ => ErrorCode::BadPull,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_text())
    }
}

/// A value carrying a numeric status code and a human text, as specified
/// for the on-wire status of a PULL-REPLY and for `GoPull`/`Push` failures.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct Xerror {
    pub code: ErrorCode,
    pub message: Cow<'static, str>,
}

impl Xerror {
    pub fn new(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self { code, message: message.into() }
    }

    /// Build an error carrying the code's own canonical status text.
    pub fn from_code(code: ErrorCode) -> Self {
        Self { code, message: Cow::Borrowed(code.status_text()) }
    }

    pub fn ok() -> Self {
        Self::from_code(ErrorCode::Ok)
    }

    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Ok
    }

    pub fn bad_pull(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::BadPull, message)
    }

    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conn_closed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ConnClosed, message)
    }

    pub fn write_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::WriteFailed, message)
    }
}
