use symplex::{ErrorCode, Header, PacketType, Xerror};

#[test]
fn new_header_defaults_to_ok_status() {
    let header = Header::new(7, PacketType::Pull, "svc.echo");
    assert_eq!(header.seq, 7);
    assert_eq!(header.kind, PacketType::Pull);
    assert_eq!(header.uri.as_ref(), "svc.echo");
    assert_eq!(header.status_code, ErrorCode::Ok.status_code());
    assert_eq!(header.status.as_ref(), ErrorCode::Ok.status_text());
}

#[test]
fn set_status_copies_the_error_onto_the_header() {
    let mut header = Header::new(1, PacketType::PullReply, "svc.echo");
    header.set_status(&Xerror::not_found("no route for svc.echo"));
    assert_eq!(header.status_code, ErrorCode::NotFound.status_code());
    assert_eq!(header.status.as_ref(), "no route for svc.echo");
}

#[test]
fn header_is_json_round_trippable() {
    let mut header = Header::new(42, PacketType::Push, "svc.notify");
    header.gzip = 6;
    let encoded = serde_json::to_vec(&header).expect("encode");
    let decoded: Header = serde_json::from_slice(&encoded).expect("decode");
    assert_eq!(decoded.seq, 42);
    assert_eq!(decoded.kind, PacketType::Push);
    assert_eq!(decoded.uri.as_ref(), "svc.notify");
    assert_eq!(decoded.gzip, 6);
}
