// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Runtime configuration for a `Peer`/`Session` (§4.9 of the design). Every
/// knob here has a default, so an empty YAML document still produces a
/// usable config — only override what you need to change.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on how long a single `read_packet` call may take before
    /// the reader treats the socket as dead. `None` disables the deadline.
    #[serde(rename = "ReadTimeout", with = "serde_opt_secs")]
    pub read_timeout: Option<Duration>,

    /// Upper bound on how long a single `write_packet` call may take.
    #[serde(rename = "WriteTimeout", with = "serde_opt_secs")]
    pub write_timeout: Option<Duration>,

    /// Resolution of the shared coarse clock used to stamp exchange
    /// start times (§4.1 step 2 / §9).
    #[serde(rename = "CoarseClockResolutionMillis")]
    pub coarse_clock_resolution_millis: u64,

    /// Worker pool capacity (C7), shared by every session a `Peer` owns.
    #[serde(rename = "WorkerPoolCapacity")]
    pub worker_pool_capacity: usize,

    /// Worker pool utilisation-report cadence (C7).
    #[serde(rename = "WorkerPoolIdleTimeout", with = "serde_secs")]
    pub worker_pool_idle_timeout: Duration,

    /// Body codec used for outbound packets when neither the caller nor
    /// an inbound request specifies one.
    #[serde(rename = "DefaultBodyCodec")]
    pub default_body_codec: Box<str>,

    /// Default gzip compression level (0 = disabled).
    #[serde(rename = "DefaultCompression")]
    pub default_compression: u8,

    /// Exchanges costing at least this long are flagged `slow` in the
    /// operation log. `None` disables slow-call classification.
    #[serde(rename = "SlowCallThreshold", with = "serde_opt_secs")]
    pub slow_call_threshold: Option<Duration>,

    /// Whether `Session::close` waits for in-flight worker-pool jobs to
    /// finish before returning. Resolves the Open Question in spec §9 —
    /// defaulting to `false` keeps close latency bounded; callers that
    /// need a guaranteed-drained shutdown opt in explicitly.
    #[serde(rename = "AwaitWorkersOnClose")]
    pub await_workers_on_close: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            write_timeout: None,
            coarse_clock_resolution_millis: 1,
            worker_pool_capacity: crate::worker_pool::DEFAULT_CAPACITY,
            worker_pool_idle_timeout: crate::worker_pool::DEFAULT_IDLE_TIMEOUT,
            default_body_codec: Box::from("json"),
            default_compression: 0,
            slow_call_threshold: None,
            await_workers_on_close: false,
        }
    }
}

impl SessionConfig {
    pub fn coarse_clock_resolution(&self) -> Duration {
        Duration::from_millis(self.coarse_clock_resolution_millis.max(1))
    }

    /// Loads configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: SessionConfig = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants that can't be expressed in the type alone.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(self.worker_pool_capacity > 0, "WorkerPoolCapacity must be > 0");
        ensure!(!self.default_body_codec.is_empty(), "DefaultBodyCodec must not be empty");
        ensure!(
            self.coarse_clock_resolution_millis > 0,
            "CoarseClockResolutionMillis must be > 0"
        );
        Ok(())
    }
}

pub(crate) mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Same as `serde_secs`, but for an optional duration: `0` on the wire
/// means "disabled" (`None`), matching how `ReadTimeout`/`WriteTimeout`/
/// `SlowCallThreshold` read in a config file.
pub(crate) mod serde_opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.map(|d| d.as_secs()).unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(if secs == 0 { None } else { Some(Duration::from_secs(secs)) })
    }
}
