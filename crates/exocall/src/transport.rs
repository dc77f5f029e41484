//! # Transport Abstraction
//!
//! A minimal, async interface for moving requests to a remote peer, and the
//! `Call` implementation that drives it.
//!
//! ## Philosophy
//!
//! - **Payload-Oriented**: The Transport knows nothing about converters,
//!   shapes or envelopes. It moves a `Request` and returns a `RawResponse`.
//! - **Request-Response**: The fundamental interaction model is "send a
//!   request, await a response". Retries, pooling and TLS live behind the
//!   trait, not in front of it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::runtime::Handle;
use tokio::runtime::RuntimeFlavor;
use tokio::sync::watch;

use crate::call::Call;
use crate::call::Callback;
use crate::call::Envelope;
use crate::call::RawResponse;
use crate::call::Request;
use crate::call::parse_response;
use crate::converter::ResponseConverter;
use crate::error;

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The operation timed out before a response was received.
    Timeout,
    /// The remote peer rejected the payload size.
    PayloadTooLarge,
    /// The call was canceled before its outcome was delivered.
    Canceled,
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Timeout => write!(f, "Request timed out"),
            Self::PayloadTooLarge => write!(f, "Payload too large for transport"),
            Self::Canceled => write!(f, "Canceled"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A mechanism to send a request and receive a reply.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends a request and waits for the response.
    ///
    /// # invariants
    /// - Must return `Ok(response)` for any response the peer produced,
    ///   including non-2xx statuses.
    /// - Must return `Err` if the network fails.
    /// - Should not interpret the body (e.g. no JSON parsing).
    async fn call(&self, request: &Request) -> Result<RawResponse>;
}

/// Creates a fresh call per invocation.
pub trait CallFactory: Send + Sync + 'static {
    fn new_call(&self, request: Request, converter: Arc<dyn ResponseConverter>) -> Arc<dyn Call>;
}

/// Produces `TransportCall`s that run on a tokio runtime.
#[derive(Clone)]
pub struct TransportCallFactory {
    transport: Arc<dyn Transport>,
    handle: Handle,
}

impl TransportCallFactory {
    pub fn new(transport: Arc<dyn Transport>, handle: Handle) -> Self {
        Self { transport, handle }
    }
}

impl CallFactory for TransportCallFactory {
    fn new_call(&self, request: Request, converter: Arc<dyn ResponseConverter>) -> Arc<dyn Call> {
        Arc::new(TransportCall::new(
            request,
            converter,
            self.transport.clone(),
            self.handle.clone(),
        ))
    }
}

/// A call over a `Transport`, decoding successful bodies with a converter.
///
/// `enqueue` spawns onto the runtime handle. `execute` blocks the current
/// thread on it; from inside a multi-thread runtime the wait moves off the
/// worker with `block_in_place`, and from inside a current-thread runtime it
/// fails instead of blocking the only worker.
pub struct TransportCall {
    request: Request,
    converter: Arc<dyn ResponseConverter>,
    transport: Arc<dyn Transport>,
    handle: Handle,
    executed: AtomicBool,
    canceled: watch::Sender<bool>,
}

impl TransportCall {
    pub fn new(
        request: Request,
        converter: Arc<dyn ResponseConverter>,
        transport: Arc<dyn Transport>,
        handle: Handle,
    ) -> Self {
        let (canceled, _) = watch::channel(false);
        Self {
            request,
            converter,
            transport,
            handle,
            executed: AtomicBool::new(false),
            canceled,
        }
    }

    /// Races the transport against cancellation.
    async fn run(&self) -> Result<RawResponse> {
        let mut canceled = self.canceled.subscribe();
        tokio::select! {
            biased;
            _ = canceled.wait_for(|c| *c) => Err(TransportError::Canceled),
            result = self.transport.call(&self.request) => result,
        }
    }

    async fn run_and_parse(&self) -> error::Result<Envelope> {
        let raw = self.run().await?;
        parse_response(raw, &*self.converter)
    }
}

impl Call for TransportCall {
    fn request(&self) -> &Request {
        &self.request
    }

    fn execute(&self) -> error::Result<Envelope> {
        let nested = match Handle::try_current() {
            Ok(current) => match current.runtime_flavor() {
                RuntimeFlavor::MultiThread => true,
                _ => {
                    return Err(error::Error::Transport(TransportError::Io(
                        "execute called from a current-thread runtime".into(),
                    )));
                }
            },
            Err(_) => false,
        };
        if self.executed.swap(true, Ordering::SeqCst) {
            return Err(error::Error::AlreadyExecuted);
        }
        tracing::trace!(url = %self.request.url, nested, "executing call");

        if nested {
            tokio::task::block_in_place(|| self.handle.block_on(self.run_and_parse()))
        } else {
            self.handle.block_on(self.run_and_parse())
        }
    }

    fn enqueue(self: Arc<Self>, callback: Box<dyn Callback>) {
        if self.executed.swap(true, Ordering::SeqCst) {
            callback.on_failure(&*self, error::Error::AlreadyExecuted);
            return;
        }
        tracing::trace!(url = %self.request.url, "enqueueing call");

        let handle = self.handle.clone();
        let delivery = Delivery { call: self, callback: Some(callback) };
        handle.spawn(async move {
            let outcome = delivery.call.run_and_parse().await;
            delivery.deliver(outcome);
        });
    }

    fn cancel(&self) {
        self.canceled.send_replace(true);
    }

    fn is_canceled(&self) -> bool {
        *self.canceled.borrow()
    }

    fn is_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    fn clone_call(&self) -> Arc<dyn Call> {
        Arc::new(TransportCall::new(
            self.request.clone(),
            self.converter.clone(),
            self.transport.clone(),
            self.handle.clone(),
        ))
    }
}

/// Holds an enqueued callback until its outcome is known.
///
/// A runtime that shuts down drops spawned tasks without polling them to
/// completion; the callback then still hears exactly one failure.
struct Delivery {
    call: Arc<TransportCall>,
    callback: Option<Box<dyn Callback>>,
}

impl Delivery {
    fn deliver(mut self, outcome: error::Result<Envelope>) {
        if let Some(callback) = self.callback.take() {
            match outcome {
                Ok(envelope) => callback.on_response(&*self.call, envelope),
                Err(e) => callback.on_failure(&*self.call, e),
            }
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            tracing::warn!(url = %self.call.request.url, "runtime shut down before the call completed");
            let lost = TransportError::ConnectionLost("runtime shut down".into());
            callback.on_failure(&*self.call, error::Error::Transport(lost));
        }
    }
}
