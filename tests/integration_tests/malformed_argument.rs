// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use serde::Deserialize;
use symplex::{ErrorCode, Peer, router::pull_handler};

use crate::integration_tests::common::{pair, test_config};

#[derive(Debug, Deserialize)]
struct SumArgs {
    a: i64,
    b: i64,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pull_with_a_body_that_fails_to_decode_gets_bad_pull_not_a_hang() -> Result<()> {
    let server_peer = Peer::new(test_config());
    server_peer.handle_pull(
        "svc.sum",
        pull_handler(|_handle, args: SumArgs| async move { Ok(args.a + args.b) }),
    );

    let harness = pair(Peer::new(test_config()), server_peer);

    // `svc.sum` is registered, but the handler expects `SumArgs`. Sending a
    // bare i64 matches the route and still fails to decode server-side,
    // which must surface as `BadPull` correlated to the caller's own Seq
    // rather than leaving `go_pull` hanging (the Seq=0 regression this
    // guards against).
    let err = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        harness.client.go_pull::<i64, i64>("svc.sum", &7, vec![]),
    )
    .await
    .expect("go_pull must resolve instead of hanging")
    .expect_err("a bare i64 does not deserialize into SumArgs");

    assert_eq!(err.code, ErrorCode::BadPull);
    Ok(())
}
