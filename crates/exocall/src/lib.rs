//! # exocall
//!
//! Declarative remote calls: describe an API once as a set of method records,
//! then invoke its methods by id.
//!
//! ## Architecture
//!
//! A stub generator registers a `ServiceDecl` with a `Client`. On first use
//! (or at registration, when validating eagerly) each method is classified
//! into an immutable `MethodDescriptor`:
//!
//! - **Call adapter**: found by scanning the adapter chain for the declared
//!   return shape. It names the payload type and wraps each `Call`.
//! - **Response converter**: found by scanning the converter chain for that
//!   payload type.
//! - **Variant**: direct, suspend-for-value or suspend-for-envelope.
//!
//! Invoking a method builds a request, asks the call factory for a fresh
//! `Call`, and adapts it. Suspend methods instead return a future that
//! enqueues the call and resumes once with its outcome.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use exocall::{Args, CallFactory, Client, MethodRecord, ServiceDecl, Shape, Verb};
//!
//! # async fn example(calls: Arc<dyn CallFactory>) -> exocall::Result<()> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com/")
//!     .call_factory(calls)
//!     .build()?;
//!
//! let service = client.register(ServiceDecl::new("Users").method(MethodRecord::suspend(
//!     "avatar",
//!     Verb::Get,
//!     Shape::response_body(),
//!     |base: &str, _args: &Args| -> anyhow::Result<exocall::Request> {
//!         Ok(exocall::Request::new(Verb::Get, format!("{}avatar", base)))
//!     },
//! )))?;
//!
//! let id = service.id("avatar").unwrap();
//! let body = client.suspend_value::<exocall::ResponseBody>(id, Args::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod bridge;
pub mod builder;
pub mod call;
pub mod chain;
pub mod client;
pub mod converter;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod method;
pub mod registry;
pub mod shape;
pub mod transport;

#[doc(hidden)]
pub mod mock;

pub use adapter::CallAdapter;
pub use adapter::CallAdapterFactory;
pub use adapter::DefaultCallAdapterFactory;
pub use builder::ClientBuilder;
pub use call::Arg;
pub use call::Args;
pub use call::Call;
pub use call::Callback;
pub use call::Envelope;
pub use call::RawResponse;
pub use call::Request;
pub use call::RequestBody;
pub use call::ResponseBody;
pub use call::Value;
pub use call::callback;
pub use chain::FactoryChain;
pub use client::Client;
pub use client::Invocation;
pub use client::Lookup;
pub use converter::BuiltInConverters;
pub use converter::ConverterFactory;
pub use converter::NoContent;
pub use converter::RequestConverter;
pub use converter::ResponseConverter;
pub use converter::StringConverter;
pub use descriptor::MethodDescriptor;
pub use descriptor::Variant;
pub use dispatch::DispatchingCall;
pub use error::Capability;
pub use error::Error;
pub use error::ResolutionError;
pub use error::Result;
pub use executor::Executor;
pub use executor::SerialExecutor;
pub use executor::TokioExecutor;
pub use method::MethodId;
pub use method::MethodRecord;
pub use method::RequestFactory;
pub use method::Service;
pub use method::ServiceDecl;
pub use method::Verb;
pub use shape::Metadata;
pub use shape::Shape;
pub use transport::CallFactory;
pub use transport::Transport;
pub use transport::TransportCall;
pub use transport::TransportCallFactory;
pub use transport::TransportError;
