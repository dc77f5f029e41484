//! # Client
//!
//! The configured entry point. Owns the factory chains, the call factory and
//! the method registry, and turns "invoke method M with args A" into either
//! an adapted value or a future.
//!
//! ## Invariants
//!
//! - The converter chain starts with the built-ins and the adapter chain ends
//!   with the default adapter. Both are fixed once the client is built.
//! - Cloning a `Client` shares its registry; every clone sees the same
//!   descriptors.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::adapter::CallAdapter;
use crate::adapter::CallAdapterFactory;
use crate::bridge;
use crate::builder::ClientBuilder;
use crate::call::Args;
use crate::call::Envelope;
use crate::call::Value;
use crate::chain::FactoryChain;
use crate::converter::ConverterFactory;
use crate::converter::NaturalText;
use crate::converter::RequestConverter;
use crate::converter::ResponseConverter;
use crate::converter::StringConverter;
use crate::descriptor::MethodDescriptor;
use crate::descriptor::Variant;
use crate::error::Capability;
use crate::error::Error;
use crate::error::Result;
use crate::executor::Executor;
use crate::method::Convention;
use crate::method::MethodId;
use crate::method::Service;
use crate::method::ServiceDecl;
use crate::registry::MethodRegistry;
use crate::shape::Metadata;
use crate::shape::Shape;
use crate::transport::CallFactory;

pub(crate) struct ClientInner {
    pub(crate) base_url: Arc<str>,
    pub(crate) call_factory: Arc<dyn CallFactory>,
    pub(crate) converters: FactoryChain<dyn ConverterFactory>,
    pub(crate) adapters: FactoryChain<dyn CallAdapterFactory>,
    /// The user-supplied factories alone, for `new_builder`.
    pub(crate) user_converters: FactoryChain<dyn ConverterFactory>,
    pub(crate) user_adapters: FactoryChain<dyn CallAdapterFactory>,
    pub(crate) callback_executor: Option<Arc<dyn Executor>>,
    pub(crate) validate_eagerly: bool,
    pub(crate) registry: MethodRegistry,
}

/// A configured client. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

/// What a caller gets back from `Client::invoke`.
pub enum Invocation {
    /// The adapted value of a direct method.
    Direct(Value),
    /// The awaited body of a suspend method.
    Value(BoxFuture<'static, Result<Option<Value>>>),
    /// The awaited envelope of a suspend method.
    Envelope(BoxFuture<'static, Result<Envelope>>),
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(_) => write!(f, "Invocation::Direct(..)"),
            Self::Value(_) => write!(f, "Invocation::Value(..)"),
            Self::Envelope(_) => write!(f, "Invocation::Envelope(..)"),
        }
    }
}

/// The context a factory is probed with.
///
/// Carries the probed factory's own position so it can delegate to whatever
/// later factory would have matched had it not been there.
pub struct Lookup<'a> {
    client: &'a Client,
    adapter_position: Option<usize>,
    converter_position: Option<usize>,
}

impl<'a> Lookup<'a> {
    pub(crate) fn for_adapter(client: &'a Client, position: usize) -> Self {
        Self { client, adapter_position: Some(position), converter_position: None }
    }

    pub(crate) fn for_converter(client: &'a Client, position: usize) -> Self {
        Self { client, adapter_position: None, converter_position: Some(position) }
    }

    pub fn client(&self) -> &'a Client {
        self.client
    }

    /// Position of the probed factory in its own chain.
    pub fn position(&self) -> usize {
        self.adapter_position.or(self.converter_position).unwrap_or(0)
    }

    pub fn next_call_adapter(&self, shape: &Shape, metadata: &Metadata) -> Result<Arc<dyn CallAdapter>> {
        self.client.next_call_adapter(self.adapter_position, shape, metadata)
    }

    pub fn next_response_converter(
        &self,
        shape: &Shape,
        metadata: &Metadata,
    ) -> Result<Arc<dyn ResponseConverter>> {
        self.client.next_response_converter(self.converter_position, shape, metadata)
    }

    pub fn next_request_converter(
        &self,
        shape: &Shape,
        parameter: &Metadata,
        method: &Metadata,
    ) -> Result<Arc<dyn RequestConverter>> {
        self.client.next_request_converter(self.converter_position, shape, parameter, method)
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// A builder preloaded with this client's configuration.
    ///
    /// Only user-added factories are copied; the built-ins are added again
    /// by `build`.
    pub fn new_builder(&self) -> ClientBuilder {
        ClientBuilder::from_client(self)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub(crate) fn base_url_shared(&self) -> Arc<str> {
        self.inner.base_url.clone()
    }

    pub fn call_factory(&self) -> &Arc<dyn CallFactory> {
        &self.inner.call_factory
    }

    pub fn callback_executor(&self) -> Option<&Arc<dyn Executor>> {
        self.inner.callback_executor.as_ref()
    }

    pub fn converter_factories(&self) -> &FactoryChain<dyn ConverterFactory> {
        &self.inner.converters
    }

    pub fn call_adapter_factories(&self) -> &FactoryChain<dyn CallAdapterFactory> {
        &self.inner.adapters
    }

    pub fn validates_eagerly(&self) -> bool {
        self.inner.validate_eagerly
    }

    pub fn call_adapter(&self, shape: &Shape, metadata: &Metadata) -> Result<Arc<dyn CallAdapter>> {
        self.next_call_adapter(None, shape, metadata)
    }

    /// Scans the adapter chain from just after `skip_past`.
    pub fn next_call_adapter(
        &self,
        skip_past: Option<usize>,
        shape: &Shape,
        metadata: &Metadata,
    ) -> Result<Arc<dyn CallAdapter>> {
        self.inner.adapters.resolve(Capability::CallAdapter, shape, skip_past, |position, factory| {
            factory.get(shape, metadata, &Lookup::for_adapter(self, position))
        })
    }

    pub fn response_converter(&self, shape: &Shape, metadata: &Metadata) -> Result<Arc<dyn ResponseConverter>> {
        self.next_response_converter(None, shape, metadata)
    }

    pub fn next_response_converter(
        &self,
        skip_past: Option<usize>,
        shape: &Shape,
        metadata: &Metadata,
    ) -> Result<Arc<dyn ResponseConverter>> {
        self.inner.converters.resolve(Capability::ResponseConverter, shape, skip_past, |position, factory| {
            factory.response_converter(shape, metadata, &Lookup::for_converter(self, position))
        })
    }

    pub fn request_converter(
        &self,
        shape: &Shape,
        parameter: &Metadata,
        method: &Metadata,
    ) -> Result<Arc<dyn RequestConverter>> {
        self.next_request_converter(None, shape, parameter, method)
    }

    pub fn next_request_converter(
        &self,
        skip_past: Option<usize>,
        shape: &Shape,
        parameter: &Metadata,
        method: &Metadata,
    ) -> Result<Arc<dyn RequestConverter>> {
        self.inner.converters.resolve(Capability::RequestConverter, shape, skip_past, |position, factory| {
            factory.request_converter(shape, parameter, method, &Lookup::for_converter(self, position))
        })
    }

    /// The first string converter offered for `shape`, or natural text.
    ///
    /// Never fails for want of a match; a faulting factory still aborts.
    pub fn string_converter(&self, shape: &Shape, metadata: &Metadata) -> Result<Arc<dyn StringConverter>> {
        let found = self.inner.converters.find(None, |position, factory| {
            factory.string_converter(shape, metadata, &Lookup::for_converter(self, position))
        })?;
        Ok(found.unwrap_or_else(|| Arc::new(NaturalText)))
    }

    /// Registers every method of `decl` and returns their ids.
    ///
    /// When the client validates eagerly, each method is resolved now and
    /// the first failure undoes the whole registration.
    pub fn register(&self, decl: ServiceDecl) -> Result<Service> {
        let mut seen = HashSet::new();
        for record in &decl.methods {
            if !seen.insert(record.name.as_str()) {
                return Err(Error::Configuration {
                    method: Some(format!("{}.{}", decl.name, record.name)),
                    reason: "Duplicate method name.".to_string(),
                });
            }
        }

        let ServiceDecl { name, methods } = decl;
        let ids = methods
            .into_iter()
            .map(|record| {
                let method = record.name.clone();
                let id = self.inner.registry.register(format!("{}.{}", name, method), record);
                (method, id)
            })
            .collect();
        let service = Service::new(name, ids);

        if self.inner.validate_eagerly {
            for id in service.ids() {
                if let Err(e) = self.resolve(id) {
                    tracing::warn!(service = %service.name(), error = %e, "eager validation failed");
                    for id in service.ids() {
                        self.inner.registry.remove(id);
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!(service = %service.name(), methods = service.ids().count(), "service registered");
        Ok(service)
    }

    /// The descriptor for `id`, built on first use and cached afterwards.
    pub fn resolve(&self, id: MethodId) -> Result<Arc<MethodDescriptor>> {
        self.inner.registry.resolve(id, |id, entry| MethodDescriptor::build(self, id, entry))
    }

    /// The descriptor for `id` if one has been built.
    pub fn descriptor(&self, id: MethodId) -> Option<Arc<MethodDescriptor>> {
        self.inner.registry.get(id)
    }

    /// Invokes a registered method.
    ///
    /// Direct methods are resolved and adapted now. Suspend methods return a
    /// future at once; resolving, adapting and running the call all happen
    /// when it is polled, and every fault is delivered through it.
    pub fn invoke(&self, id: MethodId, args: Args) -> Result<Invocation> {
        let entry = self.inner.registry.entry(id)?;
        if let Convention::Direct(_) = entry.record.convention {
            let descriptor = self.resolve(id)?;
            return Ok(Invocation::Direct(descriptor.invoke(&args)?));
        }

        let client = self.clone();
        if entry.record.awaits_envelope() {
            let future = async move {
                let descriptor = client.resolve(id)?;
                let call = descriptor.invoke_for_call(&args)?;
                bridge::await_envelope(call).await
            };
            return Ok(Invocation::Envelope(future.boxed()));
        }

        let future = async move {
            let descriptor = client.resolve(id)?;
            let call = descriptor.invoke_for_call(&args)?;
            let nullable = matches!(descriptor.variant(), Variant::SuspendForValue { nullable: true });
            bridge::await_value(call, descriptor.method(), nullable).await
        };
        Ok(Invocation::Value(future.boxed()))
    }

    /// Invokes a direct method and downcasts its adapted value.
    pub fn call<R: Any>(&self, id: MethodId, args: Args) -> Result<R> {
        match self.invoke(id, args)? {
            Invocation::Direct(value) => downcast::<R>(value),
            _ => Err(self.wrong_convention(id, "is a suspend method and must be awaited")),
        }
    }

    /// Invokes a suspend method and awaits its decoded body.
    pub async fn suspend_value<T: Any>(&self, id: MethodId, args: Args) -> Result<Option<T>> {
        match self.invoke(id, args)? {
            Invocation::Value(future) => future.await?.map(downcast::<T>).transpose(),
            Invocation::Envelope(_) => Err(self.wrong_convention(id, "awaits an envelope")),
            Invocation::Direct(_) => Err(self.wrong_convention(id, "is a direct method")),
        }
    }

    /// Invokes a suspend method and awaits its envelope.
    pub async fn suspend_envelope(&self, id: MethodId, args: Args) -> Result<Envelope> {
        match self.invoke(id, args)? {
            Invocation::Envelope(future) => future.await,
            Invocation::Value(_) => Err(self.wrong_convention(id, "awaits a bare value")),
            Invocation::Direct(_) => Err(self.wrong_convention(id, "is a direct method")),
        }
    }

    fn wrong_convention(&self, id: MethodId, reason: &str) -> Error {
        let method = self.inner.registry.entry(id).ok().map(|entry| entry.qualified.clone());
        Error::Configuration { method, reason: format!("Method {}.", reason) }
    }
}

fn downcast<T: Any>(value: Value) -> Result<T> {
    value
        .downcast::<T>()
        .map(|v| *v)
        .map_err(|_| Error::UnexpectedType { expected: std::any::type_name::<T>() })
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("converters", &self.inner.converters.names().collect::<Vec<_>>())
            .field("adapters", &self.inner.adapters.names().collect::<Vec<_>>())
            .field("validate_eagerly", &self.inner.validate_eagerly)
            .field("methods", &self.inner.registry.len())
            .finish()
    }
}
