//! # Callback Dispatch
//!
//! A `Call` wrapper that moves callback delivery onto a fixed executor.
//!
//! ## Invariants
//!
//! - `execute` never hops; it runs on the caller's thread.
//! - Every completion of the delegate is delivered through the executor.
//! - Cancellation observed at delivery time wins: a success that raced a
//!   `cancel()` is reported as `TransportError::Canceled`.

use std::sync::Arc;

use crate::call::Call;
use crate::call::Callback;
use crate::call::Envelope;
use crate::call::Request;
use crate::error::Error;
use crate::error::Result;
use crate::executor::Executor;
use crate::transport::TransportError;

pub struct DispatchingCall {
    executor: Arc<dyn Executor>,
    delegate: Arc<dyn Call>,
}

impl DispatchingCall {
    pub fn new(executor: Arc<dyn Executor>, delegate: Arc<dyn Call>) -> Self {
        Self { executor, delegate }
    }

    pub fn delegate(&self) -> &Arc<dyn Call> {
        &self.delegate
    }
}

impl Call for DispatchingCall {
    fn request(&self) -> &Request {
        self.delegate.request()
    }

    fn execute(&self) -> Result<Envelope> {
        self.delegate.execute()
    }

    fn enqueue(self: Arc<Self>, callback: Box<dyn Callback>) {
        let delegate = self.delegate.clone();
        delegate.enqueue(Box::new(Relay { outer: self, callback }));
    }

    fn cancel(&self) {
        self.delegate.cancel();
    }

    fn is_canceled(&self) -> bool {
        self.delegate.is_canceled()
    }

    fn is_executed(&self) -> bool {
        self.delegate.is_executed()
    }

    fn clone_call(&self) -> Arc<dyn Call> {
        Arc::new(DispatchingCall::new(self.executor.clone(), self.delegate.clone_call()))
    }
}

/// Forwards the delegate's outcome to the user's callback via the executor.
struct Relay {
    outer: Arc<DispatchingCall>,
    callback: Box<dyn Callback>,
}

impl Callback for Relay {
    fn on_response(self: Box<Self>, _call: &dyn Call, response: Envelope) {
        let Relay { outer, callback } = *self;
        let executor = outer.executor.clone();
        executor.execute(Box::new(move || {
            if outer.delegate.is_canceled() {
                tracing::warn!(url = %outer.request().url, "canceled before delivery, dropping response");
                callback.on_failure(&*outer, Error::Transport(TransportError::Canceled));
            } else {
                callback.on_response(&*outer, response);
            }
        }));
    }

    fn on_failure(self: Box<Self>, _call: &dyn Call, error: Error) {
        let Relay { outer, callback } = *self;
        let executor = outer.executor.clone();
        executor.execute(Box::new(move || callback.on_failure(&*outer, error)));
    }
}
