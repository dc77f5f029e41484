//! # Call Abstraction
//!
//! One logical remote operation, and the records that flow through it.
//!
//! ## Philosophy
//!
//! - **Erased payloads**: Descriptors for many methods share one registry, so
//!   decoded bodies travel as `Value` (`Box<dyn Any + Send>`) and arguments as
//!   `dyn Arg`. Typed access is a downcast at the edge.
//! - **Exactly once**: `Callback` methods consume `Box<Self>`, so a callback
//!   can fire at most one of its two outcomes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::converter::ResponseConverter;
use crate::error::Error;
use crate::error::Result;
use crate::method::Verb;

/// A decoded payload, or whatever a call adapter produced.
pub type Value = Box<dyn Any + Send>;

/// An argument handed to a request factory or a string converter.
pub trait Arg: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> Arg for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Positional arguments of one invocation.
#[derive(Debug, Default)]
pub struct Args(Vec<Box<dyn Arg>>);

impl Args {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with<T: Arg>(mut self, value: T) -> Self {
        self.0.push(Box::new(value));
        self
    }

    pub fn push<T: Arg>(&mut self, value: T) {
        self.0.push(Box::new(value));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The argument at `index`, if it exists and is a `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.0.get(index).and_then(|arg| (**arg).as_any().downcast_ref())
    }

    /// The erased argument at `index`.
    pub fn raw(&self, index: usize) -> Option<&dyn Arg> {
        self.0.get(index).map(|arg| &**arg)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestBody {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl RequestBody {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { content_type: Some(content_type.into()), bytes: bytes.into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseBody {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ResponseBody {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { content_type: None, bytes: bytes.into() }
    }
}

/// A fully built request, ready for a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub verb: Verb,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl Request {
    pub fn new(verb: Verb, url: impl Into<String>) -> Self {
        Self { verb, url: url.into(), headers: Vec::new(), body: None }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }
}

/// An undecoded response as produced by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub message: String,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            message: String::new(),
            headers: Vec::new(),
            body: ResponseBody::new(body),
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body).with_message("OK")
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A decoded response: status and headers alongside the payload.
pub struct Envelope {
    status: u16,
    message: String,
    headers: Vec<(String, String)>,
    body: Option<Value>,
    error_body: Option<ResponseBody>,
}

impl Envelope {
    /// A successful response with an optional decoded body.
    pub fn success(
        status: u16,
        message: impl Into<String>,
        headers: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Self {
        Self { status, message: message.into(), headers, body, error_body: None }
    }

    /// A non-2xx response. The raw body is kept undecoded.
    pub fn error(raw: RawResponse) -> Self {
        Self {
            status: raw.status,
            message: raw.message,
            headers: raw.headers,
            body: None,
            error_body: Some(raw.body),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn body<T: Any>(&self) -> Option<&T> {
        self.body.as_ref().and_then(|b| b.downcast_ref())
    }

    pub fn take_body(&mut self) -> Option<Value> {
        self.body.take()
    }

    /// Consumes the envelope and downcasts its body.
    pub fn into_body<T: Any>(self) -> Result<Option<T>> {
        match self.body {
            None => Ok(None),
            Some(value) => value
                .downcast::<T>()
                .map(|b| Some(*b))
                .map_err(|_| Error::UnexpectedType { expected: std::any::type_name::<T>() }),
        }
    }

    pub fn error_body(&self) -> Option<&ResponseBody> {
        self.error_body.as_ref()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("status", &self.status)
            .field("message", &self.message)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .field("error_body", &self.error_body)
            .finish()
    }
}

/// Turns a raw response into an envelope.
///
/// Non-2xx responses keep their raw body as the error body. 204 and 205
/// carry no body. Everything else is decoded with `converter`.
pub fn parse_response(raw: RawResponse, converter: &dyn ResponseConverter) -> Result<Envelope> {
    if !raw.is_success() {
        return Ok(Envelope::error(raw));
    }

    if raw.status == 204 || raw.status == 205 {
        return Ok(Envelope::success(raw.status, raw.message, raw.headers, None));
    }

    let RawResponse { status, message, headers, body } = raw;
    let value = converter.convert(body).map_err(Error::Conversion)?;
    Ok(Envelope::success(status, message, headers, Some(value)))
}

/// One logical remote operation.
///
/// Each call runs at most once; `clone_call` yields a fresh, idle call with
/// the same configuration and none of this call's execution or cancellation
/// state.
pub trait Call: Send + Sync + 'static {
    /// The request this call sends.
    fn request(&self) -> &Request;

    /// Runs the call synchronously.
    fn execute(&self) -> Result<Envelope>;

    /// Runs the call asynchronously; `callback` is told the outcome exactly once.
    fn enqueue(self: Arc<Self>, callback: Box<dyn Callback>);

    /// Idempotent, best-effort cancellation.
    fn cancel(&self);

    fn is_canceled(&self) -> bool;

    fn is_executed(&self) -> bool;

    fn clone_call(&self) -> Arc<dyn Call>;
}

/// Receives the single outcome of an enqueued call.
pub trait Callback: Send + 'static {
    fn on_response(self: Box<Self>, call: &dyn Call, response: Envelope);

    fn on_failure(self: Box<Self>, call: &dyn Call, error: Error);
}

struct FnCallback<F>(F);

impl<F> Callback for FnCallback<F>
where
    F: FnOnce(&dyn Call, Result<Envelope>) + Send + 'static,
{
    fn on_response(self: Box<Self>, call: &dyn Call, response: Envelope) {
        (self.0)(call, Ok(response))
    }

    fn on_failure(self: Box<Self>, call: &dyn Call, error: Error) {
        (self.0)(call, Err(error))
    }
}

/// Wraps a closure as a callback.
pub fn callback<F>(f: F) -> Box<dyn Callback>
where
    F: FnOnce(&dyn Call, Result<Envelope>) + Send + 'static,
{
    Box::new(FnCallback(f))
}
