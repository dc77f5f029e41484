//! Client builder.
//!
//! The `ClientBuilder` provides a fluent API for assembling a `Client` from a
//! base URL, a call factory and any number of converter and call adapter
//! factories.
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use exocall::{Client, CallFactory};
//! # fn example(calls: Arc<dyn CallFactory>) -> exocall::Result<()> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com/v1/")
//!     .call_factory(calls)
//!     .validate_eagerly(true)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::adapter::CallAdapterFactory;
use crate::adapter::DefaultCallAdapterFactory;
use crate::chain::FactoryChain;
use crate::client::Client;
use crate::client::ClientInner;
use crate::converter::BuiltInConverters;
use crate::converter::ConverterFactory;
use crate::error::Error;
use crate::error::Result;
use crate::executor::Executor;
use crate::registry::MethodRegistry;
use crate::transport::CallFactory;

/// Fluent builder for configuring a `Client`.
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    call_factory: Option<Arc<dyn CallFactory>>,
    converters: FactoryChain<dyn ConverterFactory>,
    adapters: FactoryChain<dyn CallAdapterFactory>,
    callback_executor: Option<Arc<dyn Executor>>,
    validate_eagerly: bool,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_client(client: &Client) -> Self {
        let inner = &client.inner;
        Self {
            base_url: Some(inner.base_url.to_string()),
            call_factory: Some(inner.call_factory.clone()),
            converters: inner.user_converters.clone(),
            adapters: inner.user_adapters.clone(),
            callback_executor: inner.callback_executor.clone(),
            validate_eagerly: inner.validate_eagerly,
        }
    }

    /// Set the URL every request is resolved against.
    ///
    /// Must end in `/`; checked by `build`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the factory that turns requests into calls.
    pub fn call_factory(mut self, factory: Arc<dyn CallFactory>) -> Self {
        self.call_factory = Some(factory);
        self
    }

    /// Append a converter factory, named after its type.
    ///
    /// User factories are scanned after the built-ins, in insertion order.
    pub fn add_converter_factory<F: ConverterFactory + 'static>(self, factory: F) -> Self {
        self.add_converter_factory_named(std::any::type_name::<F>(), factory)
    }

    pub fn add_converter_factory_named<F: ConverterFactory + 'static>(
        mut self,
        name: impl Into<Cow<'static, str>>,
        factory: F,
    ) -> Self {
        self.converters.push(name, Arc::new(factory));
        self
    }

    /// Append a call adapter factory, named after its type.
    ///
    /// User factories are scanned in insertion order, before the default.
    pub fn add_call_adapter_factory<F: CallAdapterFactory + 'static>(self, factory: F) -> Self {
        self.add_call_adapter_factory_named(std::any::type_name::<F>(), factory)
    }

    pub fn add_call_adapter_factory_named<F: CallAdapterFactory + 'static>(
        mut self,
        name: impl Into<Cow<'static, str>>,
        factory: F,
    ) -> Self {
        self.adapters.push(name, Arc::new(factory));
        self
    }

    /// Set where the default adapter delivers `enqueue` callbacks.
    ///
    /// Without one, callbacks run wherever the call completes.
    pub fn callback_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.callback_executor = Some(executor);
        self
    }

    /// Resolve every method at registration instead of on first use.
    pub fn validate_eagerly(mut self, validate: bool) -> Self {
        self.validate_eagerly = validate;
        self
    }

    /// Assemble the client.
    ///
    /// # Errors
    ///
    /// Returns `Error::Setup` if:
    /// - No base URL was set, or it does not end in `/`
    /// - No call factory was set
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Setup("Base URL required.".to_string()))?;
        if !base_url.ends_with('/') {
            return Err(Error::Setup(format!("baseUrl must end in /: {}", base_url)));
        }
        let call_factory = self
            .call_factory
            .ok_or_else(|| Error::Setup("Call factory required.".to_string()))?;

        let mut converters: FactoryChain<dyn ConverterFactory> = FactoryChain::new();
        converters.push("BuiltInConverters", Arc::new(BuiltInConverters));
        converters.extend_from(&self.converters);

        let mut adapters = self.adapters.clone();
        adapters.push(
            "DefaultCallAdapterFactory",
            Arc::new(DefaultCallAdapterFactory::new(self.callback_executor.clone())),
        );

        tracing::debug!(
            %base_url,
            converters = converters.len(),
            adapters = adapters.len(),
            validate_eagerly = self.validate_eagerly,
            "client built"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                base_url: base_url.into(),
                call_factory,
                converters,
                adapters,
                user_converters: self.converters,
                user_adapters: self.adapters,
                callback_executor: self.callback_executor,
                validate_eagerly: self.validate_eagerly,
                registry: MethodRegistry::new(),
            }),
        })
    }
}
