// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! An in-memory [`Socket`] double backed by `tokio::io::duplex`, used to
//! exercise the session core's testable properties (§8) without a real
//! transport. Frames with a trivial length-prefixed-JSON-header wire
//! format; the timeout handling mirrors the teacher's `io_with_timeout`
//! helper in `client/common.rs`.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf},
    sync::Mutex as AsyncMutex,
};

use crate::{
    packet::{Header, InboundPacket, OutboundPacket},
    socket::{Socket, SocketId},
};

/// One end of an in-memory duplex pipe, implementing the `Socket`
/// contract the session core drives. Construct a connected pair with
/// [`DuplexSocket::pair`].
pub struct DuplexSocket {
    reader: AsyncMutex<ReadHalf<DuplexStream>>,
    writer: AsyncMutex<WriteHalf<DuplexStream>>,
    id: AtomicU64,
    read_timeout: std::sync::Mutex<Option<Duration>>,
    write_timeout: std::sync::Mutex<Option<Duration>>,
    remote_addr: String,
    public: HashMap<String, String>,
}

impl DuplexSocket {
    /// Creates a connected pair of sockets, `(a, b)`, with ids `1` and `2`.
    /// Writes to `a` are read from `b` and vice versa.
    pub fn pair() -> (Arc<DuplexSocket>, Arc<DuplexSocket>) {
        Self::pair_with_buffer(64 * 1024)
    }

    pub fn pair_with_buffer(buffer: usize) -> (Arc<DuplexSocket>, Arc<DuplexSocket>) {
        let (a, b) = tokio::io::duplex(buffer);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);

        let sock_a = Arc::new(Self::new(1, "memory://a".to_string(), a_read, a_write));
        let sock_b = Arc::new(Self::new(2, "memory://b".to_string(), b_read, b_write));
        (sock_a, sock_b)
    }

    fn new(
        id: SocketId,
        remote_addr: String,
        reader: ReadHalf<DuplexStream>,
        writer: WriteHalf<DuplexStream>,
    ) -> Self {
        Self {
            reader: AsyncMutex::new(reader),
            writer: AsyncMutex::new(writer),
            id: AtomicU64::new(id),
            read_timeout: std::sync::Mutex::new(None),
            write_timeout: std::sync::Mutex::new(None),
            remote_addr,
            public: HashMap::new(),
        }
    }

    async fn with_read_timeout<F, T>(&self, fut: F) -> std::io::Result<T>
    where
        F: std::future::Future<Output = std::io::Result<T>>,
    {
        let timeout = *self.read_timeout.lock().unwrap_or_else(|e| e.into_inner());
        match timeout {
            Some(d) => tokio::time::timeout(d, fut)
                .await
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"))?,
            None => fut.await,
        }
    }

    async fn with_write_timeout<F, T>(&self, fut: F) -> std::io::Result<T>
    where
        F: std::future::Future<Output = std::io::Result<T>>,
    {
        let timeout = *self.write_timeout.lock().unwrap_or_else(|e| e.into_inner());
        match timeout {
            Some(d) => tokio::time::timeout(d, fut)
                .await
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "write timed out"))?,
            None => fut.await,
        }
    }
}

#[async_trait]
impl Socket for DuplexSocket {
    async fn read_packet(&self) -> Result<Option<InboundPacket>> {
        let mut reader = self.reader.lock().await;

        let header_len = match self.with_read_timeout(reader.read_u32()).await {
            Ok(len) => len,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut header_buf = vec![0u8; header_len as usize];
        self.with_read_timeout(reader.read_exact(&mut header_buf)).await?;
        let header: Header = serde_json::from_slice(&header_buf)?;

        let body_len = self.with_read_timeout(reader.read_u32()).await?;
        let mut body_buf = vec![0u8; body_len as usize];
        self.with_read_timeout(reader.read_exact(&mut body_buf)).await?;

        Ok(Some(InboundPacket { header, body: Bytes::from(body_buf) }))
    }

    async fn write_packet(&self, packet: &OutboundPacket) -> Result<()> {
        let header_bytes = serde_json::to_vec(&packet.header)?;
        if header_bytes.len() > u32::MAX as usize || packet.body.len() > u32::MAX as usize {
            return Err(anyhow!("frame too large"));
        }

        let mut writer = self.writer.lock().await;
        self.with_write_timeout(writer.write_u32(header_bytes.len() as u32)).await?;
        self.with_write_timeout(writer.write_all(&header_bytes)).await?;
        self.with_write_timeout(writer.write_u32(packet.body.len() as u32)).await?;
        self.with_write_timeout(writer.write_all(&packet.body)).await?;
        self.with_write_timeout(writer.flush()).await?;
        Ok(())
    }

    fn set_read_deadline(&self, timeout: Option<Duration>) {
        *self.read_timeout.lock().unwrap_or_else(|e| e.into_inner()) = timeout;
    }

    fn set_write_deadline(&self, timeout: Option<Duration>) {
        *self.write_timeout.lock().unwrap_or_else(|e| e.into_inner()) = timeout;
    }

    fn id(&self) -> SocketId {
        self.id.load(Ordering::Acquire)
    }

    fn change_id(&self, new_id: SocketId) {
        self.id.store(new_id, Ordering::Release);
    }

    async fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }

    fn remote_addr(&self) -> String {
        self.remote_addr.clone()
    }

    fn public(&self, key: &str) -> Option<String> {
        self.public.get(key).cloned()
    }

    fn public_len(&self) -> usize {
        self.public.len()
    }
}
