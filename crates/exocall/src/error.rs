//! # Error Definitions
//!
//! Every failure the pipeline can report, from malformed declarations to
//! transport faults passed through from a call.

use std::fmt;

use crate::method::MethodId;
use crate::shape::Shape;
use crate::transport::TransportError;

/// The capability a factory chain was asked to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CallAdapter,
    RequestConverter,
    ResponseConverter,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallAdapter => write!(f, "call adapter"),
            Self::RequestConverter => write!(f, "request body converter"),
            Self::ResponseConverter => write!(f, "response body converter"),
        }
    }
}

/// No factory in a chain produced a match.
///
/// `skipped` names the factories before the start index, `tried` the ones the
/// scan actually asked, both in chain order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    pub capability: Capability,
    pub shape: Shape,
    pub skipped: Vec<String>,
    pub tried: Vec<String>,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not locate {} for {}.", self.capability, self.shape)?;
        if !self.skipped.is_empty() {
            write!(f, "\n  Skipped:")?;
            for name in &self.skipped {
                write!(f, "\n   * {}", name)?;
            }
        }
        write!(f, "\n  Tried:")?;
        for name in &self.tried {
            write!(f, "\n   * {}", name)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionError {}

#[derive(Debug)]
pub enum Error {
    /// The declaration itself is malformed.
    Configuration { method: Option<String>, reason: String },
    /// No converter or call adapter matched.
    Resolution { method: Option<String>, error: ResolutionError },
    /// The declaration is well formed but names an unusable payload type.
    Shape { method: String, reason: String },
    /// A user-supplied factory failed while being probed.
    Factory { method: Option<String>, factory: String, source: anyhow::Error },
    /// A call adapter failed to adapt a call.
    Adapt { method: String, source: anyhow::Error },
    /// The request factory could not build a request from the arguments.
    Request { method: String, source: anyhow::Error },
    /// A converter failed to encode or decode a payload.
    Conversion(anyhow::Error),
    /// The call failed at the transport layer. Never reinterpreted.
    Transport(TransportError),
    /// A body was awaited but the server answered with a non-2xx status.
    Status { code: u16, message: String },
    /// A body was awaited, none arrived, and the method is not nullable.
    MissingBody { method: String },
    /// An erased value was not of the requested type.
    UnexpectedType { expected: &'static str },
    UnknownMethod(MethodId),
    AlreadyExecuted,
    /// The client builder was misconfigured.
    Setup(String),
}

impl Error {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration { method: None, reason: reason.into() }
    }

    /// Recovers a crate error carried through `anyhow`, or wraps the fault as
    /// coming from `factory`.
    pub(crate) fn from_factory(factory: &str, e: anyhow::Error) -> Self {
        match e.downcast::<Error>() {
            Ok(inner) => inner,
            Err(e) => Self::Factory { method: None, factory: factory.to_string(), source: e },
        }
    }

    /// Attributes a method-less error to `method`.
    pub(crate) fn for_method(self, method: &str) -> Self {
        match self {
            Self::Configuration { method: None, reason } => {
                Self::Configuration { method: Some(method.to_string()), reason }
            }
            Self::Resolution { method: None, error } => {
                Self::Resolution { method: Some(method.to_string()), error }
            }
            Self::Factory { method: None, factory, source } => {
                Self::Factory { method: Some(method.to_string()), factory, source }
            }
            other => other,
        }
    }

    /// Whether the failure is a cancellation of the underlying call.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Canceled))
    }
}

fn write_method(f: &mut fmt::Formatter<'_>, method: &Option<String>) -> fmt::Result {
    match method {
        Some(m) => write!(f, "\n    for method {}", m),
        None => Ok(()),
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { method, reason } => {
                write!(f, "Configuration error: {}", reason)?;
                write_method(f, method)
            }
            Self::Resolution { method, error } => {
                write!(f, "{}", error)?;
                write_method(f, method)
            }
            Self::Shape { method, reason } => {
                write!(f, "{}\n    for method {}", reason, method)
            }
            Self::Factory { method, factory, source } => {
                write!(f, "Factory {} failed: {}", factory, source)?;
                write_method(f, method)
            }
            Self::Adapt { method, source } => {
                write!(f, "Unable to adapt call: {}\n    for method {}", source, method)
            }
            Self::Request { method, source } => {
                write!(f, "Unable to build request: {}\n    for method {}", source, method)
            }
            Self::Conversion(e) => write!(f, "Conversion error: {}", e),
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Status { code, message } => write!(f, "HTTP {} {}", code, message),
            Self::MissingBody { method } => write!(
                f,
                "Response from {} was empty but its body type was not declared nullable",
                method
            ),
            Self::UnexpectedType { expected } => write!(f, "Value is not a {}", expected),
            Self::UnknownMethod(id) => write!(f, "Method not found: {}", id),
            Self::AlreadyExecuted => write!(f, "Already executed"),
            Self::Setup(msg) => write!(f, "Setup error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resolution { error, .. } => Some(error),
            Self::Factory { source, .. } => Some(&**source),
            Self::Adapt { source, .. } => Some(&**source),
            Self::Request { source, .. } => Some(&**source),
            Self::Conversion(e) => Some(&**e),
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
