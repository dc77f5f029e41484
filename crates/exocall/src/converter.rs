//! # Converters
//!
//! Capabilities that turn payloads into wire bodies and back, and the
//! factories that offer them for a given shape.
//!
//! The codecs themselves (JSON, protobuf, ...) live outside this crate. Only
//! the built-ins that need no codec are provided here.

use std::sync::Arc;

use crate::call::Arg;
use crate::call::RequestBody;
use crate::call::ResponseBody;
use crate::call::Value;
use crate::client::Lookup;
use crate::shape::Metadata;
use crate::shape::Shape;

/// Decodes a response body into a value.
pub trait ResponseConverter: Send + Sync {
    fn convert(&self, body: ResponseBody) -> anyhow::Result<Value>;
}

impl<F> ResponseConverter for F
where
    F: Fn(ResponseBody) -> anyhow::Result<Value> + Send + Sync,
{
    fn convert(&self, body: ResponseBody) -> anyhow::Result<Value> {
        self(body)
    }
}

/// Encodes an argument as a request body.
pub trait RequestConverter: Send + Sync {
    fn convert(&self, value: &dyn Arg) -> anyhow::Result<RequestBody>;
}

impl<F> RequestConverter for F
where
    F: Fn(&dyn Arg) -> anyhow::Result<RequestBody> + Send + Sync,
{
    fn convert(&self, value: &dyn Arg) -> anyhow::Result<RequestBody> {
        self(value)
    }
}

/// Renders an argument as text, for paths, queries and headers.
pub trait StringConverter: Send + Sync {
    fn convert(&self, value: &dyn Arg) -> anyhow::Result<String>;
}

impl<F> StringConverter for F
where
    F: Fn(&dyn Arg) -> anyhow::Result<String> + Send + Sync,
{
    fn convert(&self, value: &dyn Arg) -> anyhow::Result<String> {
        self(value)
    }
}

/// Offers converters for the shapes it understands.
///
/// Every entry point defaults to "no match". Returning `Err` is a factory
/// fault and stops resolution; returning `Ok(None)` lets the scan continue.
pub trait ConverterFactory: Send + Sync {
    fn response_converter(
        &self,
        _shape: &Shape,
        _metadata: &Metadata,
        _lookup: &Lookup<'_>,
    ) -> anyhow::Result<Option<Arc<dyn ResponseConverter>>> {
        Ok(None)
    }

    fn request_converter(
        &self,
        _shape: &Shape,
        _parameter: &Metadata,
        _method: &Metadata,
        _lookup: &Lookup<'_>,
    ) -> anyhow::Result<Option<Arc<dyn RequestConverter>>> {
        Ok(None)
    }

    fn string_converter(
        &self,
        _shape: &Shape,
        _metadata: &Metadata,
        _lookup: &Lookup<'_>,
    ) -> anyhow::Result<Option<Arc<dyn StringConverter>>> {
        Ok(None)
    }
}

/// The decoded payload of a `NoContent` response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoContent;

/// The text form used when no factory offers a string converter.
///
/// Strings and chars render as themselves, everything else through `Debug`,
/// which matches `Display` for numbers and booleans.
pub fn natural_text(value: &dyn Arg) -> String {
    let any = value.as_any();
    if let Some(s) = any.downcast_ref::<String>() {
        return s.clone();
    }
    if let Some(s) = any.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(c) = any.downcast_ref::<char>() {
        return c.to_string();
    }
    format!("{:?}", value)
}

/// Fallback string converter.
pub(crate) struct NaturalText;

impl StringConverter for NaturalText {
    fn convert(&self, value: &dyn Arg) -> anyhow::Result<String> {
        Ok(natural_text(value))
    }
}

struct BodyPassthrough;

impl ResponseConverter for BodyPassthrough {
    fn convert(&self, body: ResponseBody) -> anyhow::Result<Value> {
        Ok(Box::new(body))
    }
}

struct DiscardBody;

impl ResponseConverter for DiscardBody {
    fn convert(&self, _body: ResponseBody) -> anyhow::Result<Value> {
        Ok(Box::new(NoContent))
    }
}

struct DiscardBodyAsUnit;

impl ResponseConverter for DiscardBodyAsUnit {
    fn convert(&self, _body: ResponseBody) -> anyhow::Result<Value> {
        Ok(Box::new(()))
    }
}

struct RequestBodyPassthrough;

impl RequestConverter for RequestBodyPassthrough {
    fn convert(&self, value: &dyn Arg) -> anyhow::Result<RequestBody> {
        value
            .as_any()
            .downcast_ref::<RequestBody>()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("argument is not a RequestBody: {:?}", value))
    }
}

/// Always first in a client's converter chain.
///
/// Handles raw bodies in both directions and the no-content payloads, so
/// user factories never see them.
pub struct BuiltInConverters;

impl ConverterFactory for BuiltInConverters {
    fn response_converter(
        &self,
        shape: &Shape,
        _metadata: &Metadata,
        _lookup: &Lookup<'_>,
    ) -> anyhow::Result<Option<Arc<dyn ResponseConverter>>> {
        if shape.is(Shape::RESPONSE_BODY) {
            return Ok(Some(Arc::new(BodyPassthrough)));
        }
        if shape.is(Shape::NO_CONTENT) {
            return Ok(Some(Arc::new(DiscardBody)));
        }
        if *shape == Shape::Unit {
            return Ok(Some(Arc::new(DiscardBodyAsUnit)));
        }
        Ok(None)
    }

    fn request_converter(
        &self,
        shape: &Shape,
        _parameter: &Metadata,
        _method: &Metadata,
        _lookup: &Lookup<'_>,
    ) -> anyhow::Result<Option<Arc<dyn RequestConverter>>> {
        if shape.is(Shape::REQUEST_BODY) {
            return Ok(Some(Arc::new(RequestBodyPassthrough)));
        }
        Ok(None)
    }
}
