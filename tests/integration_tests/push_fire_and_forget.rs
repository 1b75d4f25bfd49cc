// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::Result;
use symplex::{Peer, router::push_handler};
use tokio::{sync::Notify, time::{Duration, timeout}};

use crate::integration_tests::common::{pair, test_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn push_runs_the_handler_with_no_reply_written_back() -> Result<()> {
    let notify = Arc::new(Notify::new());
    let notify_for_handler = Arc::clone(&notify);

    let server_peer = Peer::new(test_config());
    server_peer.handle_push(
        "svc.notify",
        push_handler(move |_handle, _arg: i64| {
            let notify = Arc::clone(&notify_for_handler);
            async move {
                notify.notify_one();
            }
        }),
    );

    let harness = pair(Peer::new(test_config()), server_peer);

    harness.client.push("svc.notify", &42i64, vec![]).await.expect("push accepted");

    timeout(Duration::from_secs(2), notify.notified())
        .await
        .expect("handler ran within the timeout");
    Ok(())
}
