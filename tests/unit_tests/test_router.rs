use std::sync::Arc;

use symplex::router::{Catalog, PullHandler, Router};

struct Dummy;

#[async_trait::async_trait]
impl PullHandler for Dummy {
    fn new_arg_slot(&self) -> Box<dyn symplex::context::ArgSlot> {
        unimplemented!("not exercised by this test")
    }

    async fn call(
        &self,
        _handle: symplex::context::ApiHandle<'_>,
        _arg: Box<dyn std::any::Any + Send>,
    ) -> (bytes::Bytes, symplex::packet::CodecName, symplex::Xerror) {
        unimplemented!("not exercised by this test")
    }
}

#[test]
fn catalog_looks_up_registered_routes_by_exact_path() {
    let catalog: Catalog<dyn PullHandler> = Catalog::new();
    assert!(catalog.get("svc.echo").is_none());

    catalog.register("svc.echo", Arc::new(Dummy) as Arc<dyn PullHandler>);
    assert!(catalog.get("svc.echo").is_some());
    assert!(catalog.get("svc.other").is_none());
}

#[test]
fn catalog_register_overwrites_an_existing_path() {
    let catalog: Catalog<dyn PullHandler> = Catalog::new();
    catalog.register("svc.echo", Arc::new(Dummy) as Arc<dyn PullHandler>);
    catalog.register("svc.echo", Arc::new(Dummy) as Arc<dyn PullHandler>);
    assert!(catalog.get("svc.echo").is_some());
}
