//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use exocall::Args;
use exocall::CallFactory;
use exocall::Client;
use exocall::MethodId;
use exocall::MethodRecord;
use exocall::ServiceDecl;
use exocall::Shape;
use exocall::Verb;
use exocall::mock::Utf8Converters;
use exocall::mock::route;
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber once per process. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn string() -> Shape {
    Shape::of::<String>()
}

pub fn client(calls: Arc<dyn CallFactory>) -> Client {
    init_tracing();
    Client::builder()
        .base_url("https://api.test/")
        .call_factory(calls)
        .add_converter_factory_named("Utf8Converters", Utf8Converters)
        .build()
        .expect("Failed to build client")
}

pub fn suspend(name: &str, awaits: Shape) -> MethodRecord {
    MethodRecord::suspend(name, Verb::Get, awaits, route(Verb::Get, "users"))
}

pub fn direct(name: &str, returns: Shape) -> MethodRecord {
    MethodRecord::direct(name, Verb::Get, returns, route(Verb::Get, "users"))
}

/// Registers a one-method service and returns the method's id.
pub fn register_one(client: &Client, record: MethodRecord) -> MethodId {
    let name = record.name.clone();
    let service = client
        .register(ServiceDecl::new("Users").method(record))
        .expect("Failed to register service");
    service.id(&name).expect("Method not registered")
}

pub fn no_args() -> Args {
    Args::new()
}
