//! # Suspension Bridge
//!
//! Turns the callback-style `Call::enqueue` into a future.
//!
//! ## Invariants
//!
//! - The awaiting task resumes exactly once, with the call's single outcome.
//! - Dropping the future before that outcome arrives cancels the call.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::call::Call;
use crate::call::Envelope;
use crate::call::Value;
use crate::call::callback;
use crate::error::Error;
use crate::error::Result;
use crate::transport::TransportError;

/// Cancels the call unless disarmed by a delivered outcome.
struct CancelOnDrop {
    call: Option<Arc<dyn Call>>,
}

impl CancelOnDrop {
    fn disarm(mut self) {
        self.call = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(call) = self.call.take() {
            tracing::debug!(url = %call.request().url, "awaiting task dropped, canceling call");
            call.cancel();
        }
    }
}

/// Enqueues `call` and waits for its outcome, whatever the status.
pub async fn await_envelope(call: Arc<dyn Call>) -> Result<Envelope> {
    let (tx, rx) = oneshot::channel();
    let guard = CancelOnDrop { call: Some(call.clone()) };

    call.enqueue(callback(move |_call, outcome| {
        // The receiver is gone only if the awaiting task was dropped.
        let _ = tx.send(outcome);
    }));

    let outcome = rx.await.map_err(|_| {
        Error::Transport(TransportError::ConnectionLost(
            "call finished without reporting an outcome".to_string(),
        ))
    });
    guard.disarm();
    outcome?
}

/// Enqueues `call` and waits for its decoded body.
///
/// A non-2xx response becomes `Error::Status`. A missing body is `Ok(None)`
/// when `nullable`, and `Error::MissingBody` otherwise.
pub async fn await_value(call: Arc<dyn Call>, method: &str, nullable: bool) -> Result<Option<Value>> {
    let mut envelope = await_envelope(call).await?;
    if !envelope.is_success() {
        return Err(Error::Status { code: envelope.status(), message: envelope.message().to_string() });
    }

    match envelope.take_body() {
        Some(value) => Ok(Some(value)),
        None if nullable => Ok(None),
        None => Err(Error::MissingBody { method: method.to_string() }),
    }
}
