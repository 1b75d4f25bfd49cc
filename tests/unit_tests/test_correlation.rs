use std::time::Duration;

use symplex::correlation::{CorrelationTable, PullOutcome};

#[tokio::test]
async fn register_then_remove_then_finish_delivers_the_decoded_reply() {
    let table = CorrelationTable::new();
    let rx = table.register::<String>(1);
    assert_eq!(table.len(), 1);

    let mut cmd = table.remove(1).expect("seq 1 is outstanding");
    assert!(table.is_empty());

    cmd.decode_reply(br#""hello""#).expect("valid json body");
    cmd.finish(Duration::from_millis(5));

    let outcome: PullOutcome<String> = rx.await.expect("sender did not drop");
    assert!(outcome.err.is_ok());
    assert_eq!(outcome.reply.as_deref(), Some("hello"));
}

#[tokio::test]
async fn remove_of_unknown_seq_returns_none() {
    let table = CorrelationTable::new();
    assert!(table.remove(99).is_none());
}

#[tokio::test]
async fn fail_without_decode_surfaces_the_error_and_no_reply() {
    let table = CorrelationTable::new();
    let rx = table.register::<String>(2);
    let mut cmd = table.remove(2).expect("seq 2 is outstanding");

    cmd.fail(symplex::Xerror::not_found("no route"));
    cmd.finish(Duration::ZERO);

    let outcome: PullOutcome<String> = rx.await.expect("sender did not drop");
    assert!(!outcome.err.is_ok());
    assert!(outcome.reply.is_none());
}

#[tokio::test]
async fn drain_with_conn_closed_completes_every_outstanding_pull() {
    let table = CorrelationTable::new();
    let rx_a = table.register::<String>(1);
    let rx_b = table.register::<String>(2);
    assert_eq!(table.len(), 2);

    table.drain_with_conn_closed();
    assert!(table.is_empty());

    let outcome_a: PullOutcome<String> = rx_a.await.expect("sender did not drop");
    let outcome_b: PullOutcome<String> = rx_b.await.expect("sender did not drop");
    assert_eq!(outcome_a.err.code, symplex::ErrorCode::ConnClosed);
    assert_eq!(outcome_b.err.code, symplex::ErrorCode::ConnClosed);
}

#[test]
#[should_panic(expected = "reused")]
fn registering_a_seq_twice_while_outstanding_panics() {
    let table = CorrelationTable::new();
    let _rx1 = table.register::<String>(1);
    let _rx2 = table.register::<String>(1);
}
