//! Tests for awaiting suspend methods through the bridge.

mod common;

use std::sync::Arc;

use futures::FutureExt;

use exocall::Args;
use exocall::Call;
use exocall::Error;
use exocall::Invocation;
use exocall::MethodRecord;
use exocall::RawResponse;
use exocall::Shape;
use exocall::TransportCallFactory;
use exocall::TransportError;
use exocall::Verb;
use exocall::mock::FnTransport;
use exocall::mock::MockCallFactory;
use exocall::mock::route_with_arg;

use common::client;
use common::no_args;
use common::register_one;
use common::string;
use common::suspend;

fn replying(raw: RawResponse) -> Arc<MockCallFactory> {
    Arc::new(MockCallFactory::replying(raw))
}

// --- Suspend For Value ---

#[tokio::test]
async fn test_value_is_decoded() {
    let client = client(replying(RawResponse::ok("hello")));
    let id = register_one(&client, suspend("get", string()));

    let value = client.suspend_value::<String>(id, no_args()).await.expect("Call failed");
    assert_eq!(value.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_value_non_2xx_is_a_status_error() {
    let raw = RawResponse::new(500, "boom").with_message("Internal Server Error");
    let client = client(replying(raw));
    let id = register_one(&client, suspend("get", string()));

    let err = client.suspend_value::<String>(id, no_args()).await.unwrap_err();
    let Error::Status { code, message } = err else { panic!("expected status error") };
    assert_eq!(code, 500);
    assert_eq!(message, "Internal Server Error");
}

#[tokio::test]
async fn test_value_missing_body_is_an_error_unless_nullable() {
    let calls = replying(RawResponse::new(204, Vec::new()));
    let client = client(calls);
    let strict = register_one(&client, suspend("strict", string()));
    let lenient = register_one(&client, suspend("lenient", string()).nullable(true));

    let err = client.suspend_value::<String>(strict, no_args()).await.unwrap_err();
    assert!(matches!(err, Error::MissingBody { method } if method == "Users.strict"));

    let value = client.suspend_value::<String>(lenient, no_args()).await.expect("Call failed");
    assert!(value.is_none());
}

#[tokio::test]
async fn test_transport_errors_pass_through_unaltered() {
    let calls = Arc::new(MockCallFactory::failing(TransportError::ConnectionLost("reset".into())));
    let client = client(calls);
    let id = register_one(&client, suspend("get", string()));

    let err = client.suspend_value::<String>(id, no_args()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::ConnectionLost(msg)) if msg == "reset"));
}

#[tokio::test]
async fn test_unit_payload_discards_body() {
    let client = client(replying(RawResponse::ok("ignored")));
    let id = register_one(&client, suspend("touch", Shape::Unit));

    let value = client.suspend_value::<()>(id, no_args()).await.expect("Call failed");
    assert_eq!(value, Some(()));
}

// --- Suspend For Envelope ---

#[tokio::test]
async fn test_envelope_is_returned_regardless_of_status() {
    let raw = RawResponse::new(404, "nope").with_message("Not Found").with_header("X-Trace", "abc");
    let client = client(replying(raw));
    let id = register_one(&client, suspend("get", Shape::envelope(string())));

    let envelope = client.suspend_envelope(id, no_args()).await.expect("Call failed");
    assert!(!envelope.is_success());
    assert_eq!(envelope.status(), 404);
    assert_eq!(envelope.header("x-trace"), Some("abc"));
    assert!(!envelope.has_body());
    assert_eq!(envelope.error_body().map(|b| b.bytes.as_slice()), Some(&b"nope"[..]));
}

#[tokio::test]
async fn test_envelope_carries_decoded_body() {
    let client = client(replying(RawResponse::ok("hello")));
    let id = register_one(&client, suspend("get", Shape::envelope(string())));

    let envelope = client.suspend_envelope(id, no_args()).await.expect("Call failed");
    assert_eq!(envelope.into_body::<String>().expect("Wrong body type").as_deref(), Some("hello"));
}

// --- Faults Through The Future ---

#[tokio::test]
async fn test_resolution_fault_arrives_through_the_future() {
    let calls = replying(RawResponse::ok("hello"));
    let client = client(calls.clone());
    let id = register_one(&client, suspend("get", Shape::named("User")));

    let Invocation::Value(future) = client.invoke(id, no_args()).expect("Invoke failed") else {
        panic!("expected a value future")
    };
    assert!(calls.calls().is_empty());

    let err = future.await.unwrap_err();
    assert!(matches!(err, Error::Resolution { method: Some(m), .. } if m == "Users.get"));
    assert!(calls.calls().is_empty());
}

#[tokio::test]
async fn test_request_fault_arrives_through_the_future() {
    let client = client(replying(RawResponse::ok("hello")));
    let record = MethodRecord::suspend("get", Verb::Get, string(), route_with_arg(Verb::Get, "users"));
    let id = register_one(&client, record);

    let invocation = client.invoke(id, no_args()).expect("Invoke failed");
    let Invocation::Value(future) = invocation else { panic!("expected a value future") };
    assert!(matches!(future.await, Err(Error::Request { .. })));
}

#[tokio::test]
async fn test_arguments_reach_the_request() {
    let calls = replying(RawResponse::ok("hello"));
    let client = client(calls.clone());
    let record = MethodRecord::suspend("get", Verb::Get, string(), route_with_arg(Verb::Get, "users"));
    let id = register_one(&client, record);

    client.suspend_value::<String>(id, Args::new().with(42u64)).await.expect("Call failed");
    assert_eq!(calls.requests()[0].url, "https://api.test/users/42");
}

// --- Cancellation ---

#[tokio::test]
async fn test_dropping_the_future_cancels_the_call() {
    let calls = Arc::new(MockCallFactory::hanging());
    let client = client(calls.clone());
    let id = register_one(&client, suspend("get", string()));

    let Invocation::Value(mut future) = client.invoke(id, no_args()).expect("Invoke failed") else {
        panic!("expected a value future")
    };
    assert!((&mut future).now_or_never().is_none());

    let call = calls.calls().pop().expect("No call created");
    assert!(call.is_parked());
    assert!(!call.is_canceled());

    drop(future);
    assert!(call.is_canceled());
    assert!(!call.is_parked());
}

#[tokio::test]
async fn test_canceled_call_resumes_with_cancellation() {
    let calls = Arc::new(MockCallFactory::hanging());
    let client = client(calls.clone());
    let id = register_one(&client, suspend("get", Shape::envelope(string())));

    let Invocation::Envelope(mut future) = client.invoke(id, no_args()).expect("Invoke failed") else {
        panic!("expected an envelope future")
    };
    assert!((&mut future).now_or_never().is_none());

    calls.calls()[0].cancel();
    let err = future.await.unwrap_err();
    assert!(err.is_canceled());
}

#[tokio::test]
async fn test_late_completion_resumes_once() {
    let calls = Arc::new(MockCallFactory::hanging());
    let client = client(calls.clone());
    let id = register_one(&client, suspend("get", string()));

    let Invocation::Value(mut future) = client.invoke(id, no_args()).expect("Invoke failed") else {
        panic!("expected a value future")
    };
    assert!((&mut future).now_or_never().is_none());

    let call = calls.calls()[0].clone();
    assert!(call.complete(RawResponse::ok("late")));
    assert!(!call.complete(RawResponse::ok("again")));

    let value = future.await.expect("Call failed").expect("Missing body");
    assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("late"));
}

// --- Over A Transport ---

#[tokio::test]
async fn test_suspend_over_transport() {
    let transport = FnTransport::new(|request: &exocall::Request| -> exocall::transport::Result<RawResponse> {
        assert_eq!(request.url, "https://api.test/users");
        Ok(RawResponse::ok("from transport"))
    });
    let calls = Arc::new(TransportCallFactory::new(Arc::new(transport), tokio::runtime::Handle::current()));
    let client = client(calls);
    let id = register_one(&client, suspend("get", string()));

    let value = client.suspend_value::<String>(id, no_args()).await.expect("Call failed");
    assert_eq!(value.as_deref(), Some("from transport"));
}
