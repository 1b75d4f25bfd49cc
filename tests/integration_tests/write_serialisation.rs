// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::Result;
use symplex::{Peer, router::pull_handler};

use crate::integration_tests::common::{pair, test_config};

/// Interleaved `go_pull`/`push` traffic from many tasks must never corrupt
/// a frame: each reply is matched back to its own caller by Seq, and the
/// write mutex in `Session` keeps concurrent writers from interleaving
/// their header/body bytes on the wire.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_pulls_and_pushes_never_corrupt_the_stream() -> Result<()> {
    let server_peer = Peer::new(test_config());
    server_peer.handle_pull(
        "svc.upper",
        pull_handler(|_handle, arg: String| async move { Ok(arg.to_uppercase()) }),
    );
    server_peer.handle_push("svc.sink", symplex::router::push_handler(|_handle, _arg: String| async move {}));

    let harness = Arc::new(pair(Peer::new(test_config()), server_peer));

    let mut tasks = Vec::new();
    for i in 0..30usize {
        let harness = Arc::clone(&harness);
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                let word = format!("word{i}");
                let reply: String =
                    harness.client.go_pull("svc.upper", &word, vec![]).await.expect("pull ok");
                assert_eq!(reply, word.to_uppercase());
            } else {
                harness
                    .client
                    .push("svc.sink", &format!("push{i}"), vec![])
                    .await
                    .expect("push ok");
            }
        }));
    }

    for task in tasks {
        task.await.expect("task panicked");
    }
    Ok(())
}
