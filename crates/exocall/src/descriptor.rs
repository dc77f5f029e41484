//! # Method Descriptors
//!
//! The immutable per-method dispatch plan, and the one-shot builder that
//! classifies a declaration into it.
//!
//! Building runs the chain scans and shape checks once; invoking only builds
//! a request, creates a call and adapts it.

use std::fmt;
use std::sync::Arc;

use crate::adapter::CallAdapter;
use crate::call::Args;
use crate::call::Call;
use crate::call::Value;
use crate::client::Client;
use crate::converter::ResponseConverter;
use crate::error::Error;
use crate::error::Result;
use crate::method::Convention;
use crate::method::MethodId;
use crate::method::RequestFactory;
use crate::method::Verb;
use crate::registry::MethodEntry;
use crate::shape::Metadata;
use crate::shape::Shape;
use crate::transport::CallFactory;

/// How a method's result reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// The caller receives whatever the adapter makes of a fresh call.
    Direct,
    /// The caller awaits the decoded body.
    SuspendForValue { nullable: bool },
    /// The caller awaits the envelope around the decoded body.
    SuspendForEnvelope,
}

impl Variant {
    pub fn is_suspend(&self) -> bool {
        !matches!(self, Self::Direct)
    }
}

pub struct MethodDescriptor {
    id: MethodId,
    method: String,
    verb: Verb,
    variant: Variant,
    response_type: Shape,
    response_converter: Arc<dyn ResponseConverter>,
    call_adapter: Arc<dyn CallAdapter>,
    request_factory: Arc<dyn RequestFactory>,
    call_factory: Arc<dyn CallFactory>,
    base_url: Arc<str>,
}

fn configuration(method: &str, reason: impl Into<String>) -> Error {
    Error::Configuration { method: Some(method.to_string()), reason: reason.into() }
}

fn shape_error(method: &str, reason: impl Into<String>) -> Error {
    Error::Shape { method: method.to_string(), reason: reason.into() }
}

impl MethodDescriptor {
    /// Classifies `entry` and resolves everything it needs from `client`.
    pub(crate) fn build(client: &Client, id: MethodId, entry: &MethodEntry) -> Result<Self> {
        let method = entry.qualified.as_str();
        let record = &entry.record;
        let mut metadata = record.metadata.clone();

        let (adapter_shape, wants_envelope) = match &record.convention {
            Convention::Direct(shape) => {
                if *shape == Shape::Unit {
                    return Err(configuration(method, "Service methods cannot return unit."));
                }
                if shape.has_variable() {
                    return Err(configuration(
                        method,
                        format!("Method return type must not include a type variable or wildcard: {}", shape),
                    ));
                }
                (shape.clone(), false)
            }
            Convention::Suspend(awaited) => {
                if awaited.has_variable() {
                    return Err(configuration(
                        method,
                        format!("Awaited type must not include a type variable or wildcard: {}", awaited),
                    ));
                }
                // Resumption is already asynchronous, so skip the executor hop.
                metadata.insert(Metadata::SKIP_CALLBACK_EXECUTOR);
                match awaited.param(0) {
                    Some(payload) if awaited.is(Shape::ENVELOPE) => (Shape::call(payload.clone()), true),
                    _ => (Shape::call(awaited.clone()), false),
                }
            }
        };

        let call_adapter = client
            .call_adapter(&adapter_shape, &metadata)
            .map_err(|e| e.for_method(method))?;

        let response_type = call_adapter.response_type().clone();
        if response_type.is(Shape::RAW_RESPONSE) {
            return Err(shape_error(
                method,
                format!(
                    "'{}' is not a valid response body type. Did you mean {}?",
                    Shape::RAW_RESPONSE,
                    Shape::RESPONSE_BODY
                ),
            ));
        }
        if response_type.is(Shape::ENVELOPE) && !response_type.is_parameterized() {
            return Err(shape_error(
                method,
                "Envelope must include its payload type parameter (e.g., Envelope<String>)",
            ));
        }
        if record.verb.forbids_response_body() && !response_type.is(Shape::NO_CONTENT) {
            return Err(shape_error(
                method,
                format!("{} method must use {} as response type.", record.verb, Shape::NO_CONTENT),
            ));
        }

        let response_converter = client
            .response_converter(&response_type, &record.metadata)
            .map_err(|e| e.for_method(method))?;

        let variant = match (&record.convention, wants_envelope) {
            (Convention::Direct(_), _) => Variant::Direct,
            (Convention::Suspend(_), true) => Variant::SuspendForEnvelope,
            (Convention::Suspend(_), false) => Variant::SuspendForValue { nullable: record.nullable },
        };

        Ok(Self {
            id,
            method: method.to_string(),
            verb: record.verb.clone(),
            variant,
            response_type,
            response_converter,
            call_adapter,
            request_factory: record.request.clone(),
            call_factory: client.call_factory().clone(),
            base_url: client.base_url_shared(),
        })
    }

    pub fn id(&self) -> MethodId {
        self.id
    }

    /// `Service.method`.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn verb(&self) -> &Verb {
        &self.verb
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn response_type(&self) -> &Shape {
        &self.response_type
    }

    pub fn call_adapter(&self) -> &Arc<dyn CallAdapter> {
        &self.call_adapter
    }

    pub fn response_converter(&self) -> &Arc<dyn ResponseConverter> {
        &self.response_converter
    }

    /// Builds a request from `args` and wraps it in a fresh call.
    pub fn new_call(&self, args: &Args) -> Result<Arc<dyn Call>> {
        let request = self
            .request_factory
            .create(&self.base_url, args)
            .map_err(|source| Error::Request { method: self.method.clone(), source })?;
        Ok(self.call_factory.new_call(request, self.response_converter.clone()))
    }

    pub fn adapt(&self, call: Arc<dyn Call>) -> Result<Value> {
        self.call_adapter
            .adapt(call)
            .map_err(|source| Error::Adapt { method: self.method.clone(), source })
    }

    /// A fresh call, adapted into the declared return shape.
    pub fn invoke(&self, args: &Args) -> Result<Value> {
        let call = self.new_call(args)?;
        self.adapt(call)
    }

    /// A fresh adapted call, for the suspend variants.
    pub(crate) fn invoke_for_call(&self, args: &Args) -> Result<Arc<dyn Call>> {
        let adapted = self.invoke(args)?;
        adapted.downcast::<Arc<dyn Call>>().map(|call| *call).map_err(|_| Error::Adapt {
            method: self.method.clone(),
            source: anyhow::anyhow!("call adapter for a suspend method must produce an Arc<dyn Call>"),
        })
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("verb", &self.verb)
            .field("variant", &self.variant)
            .field("response_type", &self.response_type)
            .finish_non_exhaustive()
    }
}
