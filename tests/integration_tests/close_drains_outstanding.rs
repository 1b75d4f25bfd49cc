// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use symplex::{ErrorCode, Peer, router::pull_handler};
use tokio::time::Duration;

use crate::integration_tests::common::{pair, test_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closing_a_session_completes_its_outstanding_pulls_with_conn_closed() -> Result<()> {
    let server_peer = Peer::new(test_config());
    server_peer.handle_pull(
        "svc.never_replies",
        pull_handler(|_handle, _arg: ()| async move {
            // Outlives every close() in this test; the client must not
            // wait for it.
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(())
        }),
    );

    let harness = pair(Peer::new(test_config()), server_peer);
    let client = harness.client.clone();

    let pending = tokio::spawn(async move {
        client.go_pull::<_, ()>("svc.never_replies", &(), vec![]).await
    });

    // Give the PULL a moment to be written and registered before closing.
    tokio::time::sleep(Duration::from_millis(20)).await;
    harness.client.close().await.expect("close succeeds");

    let outcome = pending.await.expect("task did not panic");
    let err = outcome.expect_err("pull must fail once the session is closed");
    assert_eq!(err.code, ErrorCode::ConnClosed);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_is_idempotent() -> Result<()> {
    let harness = pair(Peer::new(test_config()), Peer::new(test_config()));
    harness.client.close().await.expect("first close succeeds");
    harness.client.close().await.expect("second close is a no-op, not an error");
    assert!(harness.client.is_closed());
    Ok(())
}
