// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::Result;
use symplex::{Peer, router::pull_handler};

use crate::integration_tests::common::{pair, test_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pull_round_trips_through_a_registered_handler() -> Result<()> {
    let server_peer = Peer::new(test_config());
    server_peer.handle_pull(
        "svc.echo",
        pull_handler(|_handle, arg: String| async move { Ok(arg) }),
    );

    let harness = pair(Peer::new(test_config()), server_peer);

    let reply: String = harness
        .client
        .go_pull("svc.echo", &"hello".to_string(), vec![])
        .await
        .expect("echo pull succeeds");

    assert_eq!(reply, "hello");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_pulls_correlate_to_their_own_reply() -> Result<()> {
    let server_peer = Peer::new(test_config());
    server_peer.handle_pull(
        "svc.echo",
        pull_handler(|_handle, arg: i64| async move { Ok(arg) }),
    );

    let harness = Arc::new(pair(Peer::new(test_config()), server_peer));

    let mut tasks = Vec::new();
    for i in 0..20i64 {
        let harness = Arc::clone(&harness);
        tasks.push(tokio::spawn(async move {
            let reply: i64 = harness.client.go_pull("svc.echo", &i, vec![]).await.expect("pull ok");
            assert_eq!(reply, i);
        }));
    }

    for task in tasks {
        task.await.expect("task panicked");
    }
    Ok(())
}
