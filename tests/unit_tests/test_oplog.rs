use std::time::Duration;

use symplex::oplog::{self, StatusBand};

#[test]
fn status_band_classifies_by_code_range() {
    assert_eq!(StatusBand::for_code(200), StatusBand::Green);
    assert_eq!(StatusBand::for_code(299), StatusBand::Green);
    assert_eq!(StatusBand::for_code(301), StatusBand::Grey);
    assert_eq!(StatusBand::for_code(404), StatusBand::Magenta);
    assert_eq!(StatusBand::for_code(503), StatusBand::Red);
    assert_eq!(StatusBand::for_code(0), StatusBand::Red);
}

#[test]
fn is_slow_respects_the_configured_threshold() {
    let threshold = Duration::from_millis(50);
    assert!(!oplog::is_slow(Duration::from_millis(10), Some(threshold)));
    assert!(oplog::is_slow(Duration::from_millis(50), Some(threshold)));
    assert!(oplog::is_slow(Duration::from_secs(1), Some(threshold)));
}

#[test]
fn is_slow_is_always_false_with_no_threshold() {
    assert!(!oplog::is_slow(Duration::from_secs(1000), None));
}
