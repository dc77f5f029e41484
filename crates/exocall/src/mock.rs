//! Mock calls, transports and executors for testing.
//!
//! These are used by the test suites and are not part of the stable API.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::call::Args;
use crate::call::Call;
use crate::call::Callback;
use crate::call::Envelope;
use crate::call::RawResponse;
use crate::call::Request;
use crate::call::ResponseBody;
use crate::call::Value;
use crate::call::parse_response;
use crate::client::Lookup;
use crate::converter::ConverterFactory;
use crate::converter::ResponseConverter;
use crate::error::Error;
use crate::error::Result;
use crate::executor::Executor;
use crate::executor::Job;
use crate::method::RequestFactory;
use crate::method::Verb;
use crate::shape::Metadata;
use crate::shape::Shape;
use crate::transport;
use crate::transport::CallFactory;
use crate::transport::Transport;
use crate::transport::TransportError;

/// What a `MockCall` does when run.
#[derive(Clone, Debug)]
pub enum Script {
    /// Complete with this response.
    Reply(RawResponse),
    /// Fail at the transport layer.
    Fail(TransportError),
    /// Never complete on its own; only `cancel` or `complete` ends it.
    Hang,
}

/// A call whose outcome is scripted up front.
///
/// Replies and failures are delivered synchronously from `enqueue`. A hanging
/// call parks its callback until `cancel` or `complete`.
pub struct MockCall {
    request: Request,
    converter: Arc<dyn ResponseConverter>,
    script: Script,
    executed: AtomicBool,
    canceled: AtomicBool,
    parked: Mutex<Option<Box<dyn Callback>>>,
}

impl MockCall {
    pub fn new(request: Request, converter: Arc<dyn ResponseConverter>, script: Script) -> Self {
        Self {
            request,
            converter,
            script,
            executed: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
            parked: Mutex::new(None),
        }
    }

    fn take_parked(&self) -> Option<Box<dyn Callback>> {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Whether a callback is waiting on this call.
    pub fn is_parked(&self) -> bool {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Delivers `raw` to a parked callback. Returns whether one was waiting.
    pub fn complete(&self, raw: RawResponse) -> bool {
        match self.take_parked() {
            Some(callback) => {
                match parse_response(raw, &*self.converter) {
                    Ok(envelope) => callback.on_response(self, envelope),
                    Err(e) => callback.on_failure(self, e),
                }
                true
            }
            None => false,
        }
    }

    fn run(&self) -> Option<Result<Envelope>> {
        match &self.script {
            Script::Reply(raw) => Some(parse_response(raw.clone(), &*self.converter)),
            Script::Fail(e) => Some(Err(Error::Transport(e.clone()))),
            Script::Hang => None,
        }
    }
}

impl Call for MockCall {
    fn request(&self) -> &Request {
        &self.request
    }

    fn execute(&self) -> Result<Envelope> {
        if self.executed.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyExecuted);
        }
        if self.is_canceled() {
            return Err(Error::Transport(TransportError::Canceled));
        }
        self.run()
            .unwrap_or_else(|| Err(Error::Transport(TransportError::Timeout)))
    }

    fn enqueue(self: Arc<Self>, callback: Box<dyn Callback>) {
        if self.executed.swap(true, Ordering::SeqCst) {
            callback.on_failure(&*self, Error::AlreadyExecuted);
            return;
        }
        // The cancel check and the parking happen under one lock, so a
        // concurrent `cancel` either is seen here or finds the parked callback.
        let outcome = {
            let mut parked = self.parked.lock().unwrap_or_else(PoisonError::into_inner);
            if self.is_canceled() {
                Err(Error::Transport(TransportError::Canceled))
            } else {
                match self.run() {
                    Some(outcome) => outcome,
                    None => {
                        *parked = Some(callback);
                        return;
                    }
                }
            }
        };
        match outcome {
            Ok(envelope) => callback.on_response(&*self, envelope),
            Err(e) => callback.on_failure(&*self, e),
        }
    }

    fn cancel(&self) {
        let parked = {
            let mut parked = self.parked.lock().unwrap_or_else(PoisonError::into_inner);
            self.canceled.store(true, Ordering::SeqCst);
            parked.take()
        };
        if let Some(callback) = parked {
            callback.on_failure(self, Error::Transport(TransportError::Canceled));
        }
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn is_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    fn clone_call(&self) -> Arc<dyn Call> {
        Arc::new(MockCall::new(self.request.clone(), self.converter.clone(), self.script.clone()))
    }
}

type Responder = Box<dyn Fn(&Request) -> Script + Send + Sync>;

/// A call factory that scripts each call from its request and keeps every
/// call it hands out.
pub struct MockCallFactory {
    responder: Responder,
    calls: Mutex<Vec<Arc<MockCall>>>,
}

impl MockCallFactory {
    pub fn new(responder: impl Fn(&Request) -> Script + Send + Sync + 'static) -> Self {
        Self { responder: Box::new(responder), calls: Mutex::new(Vec::new()) }
    }

    pub fn replying(raw: RawResponse) -> Self {
        Self::new(move |_| Script::Reply(raw.clone()))
    }

    pub fn failing(error: TransportError) -> Self {
        Self::new(move |_| Script::Fail(error.clone()))
    }

    pub fn hanging() -> Self {
        Self::new(|_| Script::Hang)
    }

    /// Every call created so far, oldest first.
    pub fn calls(&self) -> Vec<Arc<MockCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.calls().iter().map(|call| call.request().clone()).collect()
    }
}

impl CallFactory for MockCallFactory {
    fn new_call(&self, request: Request, converter: Arc<dyn ResponseConverter>) -> Arc<dyn Call> {
        let script = (self.responder)(&request);
        let call = Arc::new(MockCall::new(request, converter, script));
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call.clone());
        call
    }
}

/// An executor that queues jobs until told to run them.
#[derive(Default)]
pub struct ManualExecutor {
    jobs: Mutex<VecDeque<Job>>,
    ran: AtomicUsize,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Total jobs run so far.
    pub fn ran(&self) -> usize {
        self.ran.load(Ordering::SeqCst)
    }

    /// Runs queued jobs in order, including any they enqueue, and returns
    /// how many ran.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        loop {
            let job = self.jobs.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
            let Some(job) = job else { break };
            job();
            count += 1;
        }
        self.ran.fetch_add(count, Ordering::SeqCst);
        count
    }
}

impl Executor for ManualExecutor {
    fn execute(&self, job: Job) {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).push_back(job);
    }
}

/// A request-response transport backed by a closure.
pub struct FnTransport<F>
where
    F: Fn(&Request) -> transport::Result<RawResponse> + Send + Sync,
{
    handler: F,
}

impl<F> FnTransport<F>
where
    F: Fn(&Request) -> transport::Result<RawResponse> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait::async_trait]
impl<F> Transport for FnTransport<F>
where
    F: Fn(&Request) -> transport::Result<RawResponse> + Send + Sync + 'static,
{
    async fn call(&self, request: &Request) -> transport::Result<RawResponse> {
        (self.handler)(request)
    }
}

/// A transport that never answers.
pub struct SilentTransport;

#[async_trait::async_trait]
impl Transport for SilentTransport {
    async fn call(&self, _request: &Request) -> transport::Result<RawResponse> {
        futures::future::pending().await
    }
}

/// A request factory for a fixed path under the base URL.
pub fn route(verb: Verb, path: &'static str) -> impl RequestFactory {
    move |base_url: &str, _args: &Args| -> anyhow::Result<Request> {
        Ok(Request::new(verb.clone(), format!("{}{}", base_url, path)))
    }
}

/// A request factory that appends the first argument, as text, to `path`.
pub fn route_with_arg(verb: Verb, path: &'static str) -> impl RequestFactory {
    move |base_url: &str, args: &Args| -> anyhow::Result<Request> {
        let arg = args
            .raw(0)
            .ok_or_else(|| anyhow::anyhow!("missing argument 0 for {}", path))?;
        let text = crate::converter::natural_text(arg);
        Ok(Request::new(verb.clone(), format!("{}{}/{}", base_url, path, text)))
    }
}

/// Decodes UTF-8 response bodies for shape `String`.
pub struct Utf8Converters;

struct Utf8Body;

impl ResponseConverter for Utf8Body {
    fn convert(&self, body: ResponseBody) -> anyhow::Result<Value> {
        Ok(Box::new(String::from_utf8(body.bytes)?))
    }
}

impl ConverterFactory for Utf8Converters {
    fn response_converter(
        &self,
        shape: &Shape,
        _metadata: &Metadata,
        _lookup: &Lookup<'_>,
    ) -> anyhow::Result<Option<Arc<dyn ResponseConverter>>> {
        if *shape == Shape::of::<String>() {
            return Ok(Some(Arc::new(Utf8Body)));
        }
        Ok(None)
    }
}
