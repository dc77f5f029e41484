//! Tests for `TransportCall` driven by mock transports.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;

use exocall::Call;
use exocall::CallFactory;
use exocall::Error;
use exocall::RawResponse;
use exocall::Request;
use exocall::ResponseBody;
use exocall::ResponseConverter;
use exocall::TransportCallFactory;
use exocall::TransportError;
use exocall::Value;
use exocall::Verb;
use exocall::callback;
use exocall::mock::FnTransport;
use exocall::mock::SilentTransport;
use exocall::transport;

fn utf8(body: ResponseBody) -> anyhow::Result<Value> {
    Ok(Box::new(String::from_utf8(body.bytes)?))
}

fn converter() -> Arc<dyn ResponseConverter> {
    Arc::new(utf8)
}

fn echo(request: &Request) -> transport::Result<RawResponse> {
    Ok(RawResponse::ok(request.url.clone()).with_header("Content-Length", request.url.len().to_string()))
}

fn request() -> Request {
    Request::new(Verb::Get, "https://api.test/echo")
}

// --- Synchronous Execution ---

#[test]
fn test_execute_decodes_successful_body() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let calls = TransportCallFactory::new(Arc::new(FnTransport::new(echo)), rt.handle().clone());

    let call = calls.new_call(request(), converter());
    let envelope = call.execute().expect("Call failed");
    assert_eq!(envelope.body::<String>().map(String::as_str), Some("https://api.test/echo"));
    assert_eq!(envelope.header("content-length"), Some("21"));
    assert!(call.is_executed());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_execute_inside_a_multi_thread_runtime() {
    let calls = TransportCallFactory::new(Arc::new(FnTransport::new(echo)), Handle::current());

    let call = calls.new_call(request(), converter());
    let envelope = call.execute().expect("Call failed");
    assert_eq!(envelope.body::<String>().map(String::as_str), Some("https://api.test/echo"));
    assert!(call.is_executed());
}

#[tokio::test]
async fn test_execute_inside_a_current_thread_runtime_fails() {
    let calls = TransportCallFactory::new(Arc::new(FnTransport::new(echo)), Handle::current());

    let call = calls.new_call(request(), converter());
    let err = call.execute().unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Io(_))));
    assert!(!call.is_executed());

    let (tx, rx) = oneshot::channel();
    call.clone().enqueue(callback(move |_call, outcome| {
        let _ = tx.send(outcome.map(|e| e.status()));
    }));
    let status = rx.await.expect("Callback dropped");
    assert_eq!(status.expect("Call failed"), 200);
}

#[test]
fn test_execute_twice_fails() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let calls = TransportCallFactory::new(Arc::new(FnTransport::new(echo)), rt.handle().clone());

    let call = calls.new_call(request(), converter());
    call.execute().expect("Call failed");
    assert!(matches!(call.execute(), Err(Error::AlreadyExecuted)));

    let fresh = call.clone_call();
    assert!(!fresh.is_executed());
    assert!(fresh.execute().is_ok());
}

#[test]
fn test_non_2xx_keeps_raw_error_body() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let transport = FnTransport::new(|_: &Request| -> transport::Result<RawResponse> {
        Ok(RawResponse::new(503, vec![0xff, 0xfe]).with_message("Service Unavailable"))
    });
    let calls = TransportCallFactory::new(Arc::new(transport), rt.handle().clone());

    let envelope = calls.new_call(request(), converter()).execute().expect("Call failed");
    assert_eq!(envelope.status(), 503);
    assert!(!envelope.has_body());
    assert_eq!(envelope.error_body().map(|b| b.bytes.clone()), Some(vec![0xff, 0xfe]));
}

#[test]
fn test_no_content_statuses_skip_decoding() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let transport = FnTransport::new(|_: &Request| -> transport::Result<RawResponse> {
        Ok(RawResponse::new(204, vec![0xff]))
    });
    let calls = TransportCallFactory::new(Arc::new(transport), rt.handle().clone());

    let envelope = calls.new_call(request(), converter()).execute().expect("Call failed");
    assert!(envelope.is_success());
    assert!(!envelope.has_body());
}

#[test]
fn test_undecodable_body_is_a_conversion_error() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let transport = FnTransport::new(|_: &Request| -> transport::Result<RawResponse> {
        Ok(RawResponse::ok(vec![0xff, 0xfe]))
    });
    let calls = TransportCallFactory::new(Arc::new(transport), rt.handle().clone());

    let err = calls.new_call(request(), converter()).execute().unwrap_err();
    assert!(matches!(err, Error::Conversion(_)));
}

#[test]
fn test_transport_failure_is_passed_through() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let transport = FnTransport::new(|_: &Request| -> transport::Result<RawResponse> {
        Err(TransportError::PayloadTooLarge)
    });
    let calls = TransportCallFactory::new(Arc::new(transport), rt.handle().clone());

    let err = calls.new_call(request(), converter()).execute().unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::PayloadTooLarge)));
}

// --- Asynchronous Execution ---

#[test]
fn test_enqueue_reports_once() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let calls = TransportCallFactory::new(Arc::new(FnTransport::new(echo)), rt.handle().clone());

    let (tx, rx) = mpsc::channel();
    let call = calls.new_call(request(), converter());
    call.clone().enqueue(callback(move |_call, outcome| {
        tx.send(outcome.map(|e| e.status())).expect("Receiver dropped");
    }));

    let status = rx.recv_timeout(Duration::from_secs(5)).expect("No outcome");
    assert_eq!(status.expect("Call failed"), 200);
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn test_second_enqueue_fails_immediately() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let calls = TransportCallFactory::new(Arc::new(FnTransport::new(echo)), rt.handle().clone());

    let call = calls.new_call(request(), converter());
    call.execute().expect("Call failed");

    let (tx, rx) = mpsc::channel();
    call.enqueue(callback(move |_call, outcome| {
        tx.send(outcome.is_err()).expect("Receiver dropped");
    }));
    assert!(rx.recv_timeout(Duration::from_secs(5)).expect("No outcome"));
}

#[test]
fn test_cancel_interrupts_a_pending_transport() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let calls = TransportCallFactory::new(Arc::new(SilentTransport), rt.handle().clone());

    let (tx, rx) = mpsc::channel();
    let call = calls.new_call(request(), converter());
    call.clone().enqueue(callback(move |_call, outcome| {
        tx.send(outcome.err().map(|e| e.is_canceled())).expect("Receiver dropped");
    }));

    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    call.cancel();
    call.cancel();
    assert!(call.is_canceled());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).expect("No outcome"), Some(true));
}

#[test]
fn test_enqueue_after_runtime_shutdown_still_reports() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let handle = rt.handle().clone();
    drop(rt);
    let calls = TransportCallFactory::new(Arc::new(FnTransport::new(echo)), handle);

    let (tx, rx) = mpsc::channel();
    calls.new_call(request(), converter()).enqueue(callback(move |_call, outcome| {
        tx.send(outcome.err()).expect("Receiver dropped");
    }));

    let err = rx.recv_timeout(Duration::from_secs(5)).expect("No outcome");
    assert!(matches!(err, Some(Error::Transport(TransportError::ConnectionLost(_)))));
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn test_shutdown_while_pending_still_reports() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let calls = TransportCallFactory::new(Arc::new(SilentTransport), rt.handle().clone());

    let (tx, rx) = mpsc::channel();
    calls.new_call(request(), converter()).enqueue(callback(move |_call, outcome| {
        tx.send(outcome.err()).expect("Receiver dropped");
    }));
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

    drop(rt);
    let err = rx.recv_timeout(Duration::from_secs(5)).expect("No outcome");
    assert!(matches!(err, Some(Error::Transport(TransportError::ConnectionLost(_)))));
}

#[test]
fn test_clone_does_not_share_cancellation() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let calls = TransportCallFactory::new(Arc::new(FnTransport::new(echo)), rt.handle().clone());

    let call = calls.new_call(request(), converter());
    call.cancel();
    let fresh = call.clone_call();
    assert!(!fresh.is_canceled());
    assert_eq!(fresh.execute().expect("Call failed").status(), 200);
}

#[test]
fn test_execute_after_cancel_fails() {
    let rt = Runtime::new().expect("Failed to create runtime");
    let calls = TransportCallFactory::new(Arc::new(FnTransport::new(echo)), rt.handle().clone());

    let call = calls.new_call(request(), converter());
    call.cancel();
    let err = call.execute().unwrap_err();
    assert!(err.is_canceled());
}
