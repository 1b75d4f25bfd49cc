// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use symplex::{Peer, Session, cfg::SessionConfig, socket::memory::DuplexSocket};

/// A connected pair of peers, each having adopted its end of an in-memory
/// duplex socket. `client` is the side tests drive `go_pull`/`push` from;
/// `server` is the side whose routes are registered before the pair is
/// built.
pub struct Harness {
    pub client_peer: Peer,
    pub server_peer: Peer,
    pub client: Arc<Session>,
    pub server: Arc<Session>,
}

/// Builds a connected client/server pair with default configuration.
/// Routes must already be registered on `server_peer`/`client_peer` before
/// calling this, since `Peer::adopt` starts the reader loop immediately.
pub fn pair(client_peer: Peer, server_peer: Peer) -> Harness {
    let (client_sock, server_sock) = DuplexSocket::pair();
    let client = client_peer.dial(client_sock);
    let server = server_peer.accept(server_sock);
    Harness { client_peer, server_peer, client, server }
}

pub fn test_config() -> SessionConfig {
    SessionConfig::default()
}
