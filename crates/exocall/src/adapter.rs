//! # Call Adapters
//!
//! A call adapter knows which payload type hides inside a declared return
//! shape, and turns a raw `Call` into that shape.

use std::sync::Arc;

use crate::call::Call;
use crate::call::Value;
use crate::client::Lookup;
use crate::dispatch::DispatchingCall;
use crate::error::Error;
use crate::executor::Executor;
use crate::shape::Metadata;
use crate::shape::Shape;

/// Adapts calls into one declared return shape. Stateless beyond its
/// captured configuration.
pub trait CallAdapter: Send + Sync {
    /// The payload type the response converter must produce.
    fn response_type(&self) -> &Shape;

    /// Wraps `call` into the value handed to the caller.
    ///
    /// Suspend methods require the result to be an `Arc<dyn Call>`.
    fn adapt(&self, call: Arc<dyn Call>) -> anyhow::Result<Value>;
}

/// Offers a call adapter for the shapes it understands.
pub trait CallAdapterFactory: Send + Sync {
    fn get(
        &self,
        shape: &Shape,
        metadata: &Metadata,
        lookup: &Lookup<'_>,
    ) -> anyhow::Result<Option<Arc<dyn CallAdapter>>>;
}

/// Always last in a client's adapter chain. Matches `Call<T>`.
///
/// With a callback executor, calls are wrapped so that callbacks run on it.
/// Without one, or for methods tagged `SKIP_CALLBACK_EXECUTOR`, the call is
/// returned untouched.
pub struct DefaultCallAdapterFactory {
    executor: Option<Arc<dyn Executor>>,
}

impl DefaultCallAdapterFactory {
    pub fn new(executor: Option<Arc<dyn Executor>>) -> Self {
        Self { executor }
    }
}

impl CallAdapterFactory for DefaultCallAdapterFactory {
    fn get(
        &self,
        shape: &Shape,
        metadata: &Metadata,
        _lookup: &Lookup<'_>,
    ) -> anyhow::Result<Option<Arc<dyn CallAdapter>>> {
        if !shape.is(Shape::CALL) {
            return Ok(None);
        }

        let Some(payload) = shape.param(0) else {
            return Err(Error::configuration(
                "Call return type must be parameterized as Call<Foo>",
            )
            .into());
        };

        let executor = if metadata.contains(Metadata::SKIP_CALLBACK_EXECUTOR) {
            None
        } else {
            self.executor.clone()
        };

        Ok(Some(Arc::new(DefaultCallAdapter { response_type: payload.clone(), executor })))
    }
}

struct DefaultCallAdapter {
    response_type: Shape,
    executor: Option<Arc<dyn Executor>>,
}

impl CallAdapter for DefaultCallAdapter {
    fn response_type(&self) -> &Shape {
        &self.response_type
    }

    fn adapt(&self, call: Arc<dyn Call>) -> anyhow::Result<Value> {
        let adapted: Arc<dyn Call> = match &self.executor {
            None => call,
            Some(executor) => Arc::new(DispatchingCall::new(executor.clone(), call)),
        };
        Ok(Box::new(adapted))
    }
}
