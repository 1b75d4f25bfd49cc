use symplex::{ErrorCode, Xerror};

#[test]
fn status_code_round_trips_through_from_status_code() {
    for code in [
        ErrorCode::Ok,
        ErrorCode::NotFound,
        ErrorCode::ConnClosed,
        ErrorCode::WriteFailed,
    ] {
        assert_eq!(ErrorCode::from_status_code(code.status_code()), code);
    }
}

#[test]
fn unrecognised_status_code_falls_back_to_bad_pull() {
    assert_eq!(ErrorCode::from_status_code(999), ErrorCode::BadPull);
}

#[test]
fn xerror_ok_carries_the_ok_code_and_canonical_text() {
    let err = Xerror::ok();
    assert!(err.is_ok());
    assert_eq!(err.message, "OK");
}

#[test]
fn constructors_attach_the_expected_code() {
    assert_eq!(Xerror::bad_pull("x").code, ErrorCode::BadPull);
    assert_eq!(Xerror::not_found("x").code, ErrorCode::NotFound);
    assert_eq!(Xerror::conn_closed("x").code, ErrorCode::ConnClosed);
    assert_eq!(Xerror::write_failed("x").code, ErrorCode::WriteFailed);
    assert!(!Xerror::bad_pull("x").is_ok());
}
