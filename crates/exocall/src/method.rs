//! # Method Declarations
//!
//! The registration-time dispatch table. A stub generator emits one
//! `MethodRecord` per declared operation; registering a `ServiceDecl` assigns
//! each record a stable `MethodId` that the stub passes back on every call.

use std::fmt;
use std::sync::Arc;

use crate::call::Args;
use crate::call::Request;
use crate::shape::Metadata;
use crate::shape::Shape;

/// Strong type for method identifiers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct MethodId(pub u64);

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method-{}", self.0)
    }
}

/// The verb of a declared operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Other(String),
}

impl Verb {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Other(verb) => verb,
        }
    }

    /// Whether responses to this verb never carry a body.
    pub fn forbids_response_body(&self) -> bool {
        matches!(self, Self::Head)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the caller receives the result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Convention {
    /// The method returns whatever the call adapter makes of the call.
    Direct(Shape),
    /// The method awaits a value of the given shape.
    Suspend(Shape),
}

/// Builds a request from invocation arguments.
pub trait RequestFactory: Send + Sync {
    fn create(&self, base_url: &str, args: &Args) -> anyhow::Result<Request>;
}

impl<F> RequestFactory for F
where
    F: Fn(&str, &Args) -> anyhow::Result<Request> + Send + Sync,
{
    fn create(&self, base_url: &str, args: &Args) -> anyhow::Result<Request> {
        self(base_url, args)
    }
}

/// Declarative description of one operation.
#[derive(Clone)]
pub struct MethodRecord {
    pub name: String,
    pub verb: Verb,
    pub convention: Convention,
    pub metadata: Metadata,
    /// Whether an awaited body may be absent. Only read for suspend methods.
    pub nullable: bool,
    pub request: Arc<dyn RequestFactory>,
}

impl MethodRecord {
    pub fn direct(
        name: impl Into<String>,
        verb: Verb,
        returns: Shape,
        request: impl RequestFactory + 'static,
    ) -> Self {
        Self::new(name, verb, Convention::Direct(returns), request)
    }

    pub fn suspend(
        name: impl Into<String>,
        verb: Verb,
        awaits: Shape,
        request: impl RequestFactory + 'static,
    ) -> Self {
        Self::new(name, verb, Convention::Suspend(awaits), request)
    }

    fn new(
        name: impl Into<String>,
        verb: Verb,
        convention: Convention,
        request: impl RequestFactory + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            verb,
            convention,
            metadata: Metadata::new(),
            nullable: false,
            request: Arc::new(request),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn is_suspend(&self) -> bool {
        matches!(self.convention, Convention::Suspend(_))
    }

    /// Whether a suspend method awaits a parameterized envelope.
    pub fn awaits_envelope(&self) -> bool {
        match &self.convention {
            Convention::Suspend(shape) => shape.is(Shape::ENVELOPE) && shape.is_parameterized(),
            Convention::Direct(_) => false,
        }
    }
}

impl fmt::Debug for MethodRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRecord")
            .field("name", &self.name)
            .field("verb", &self.verb)
            .field("convention", &self.convention)
            .field("metadata", &self.metadata)
            .field("nullable", &self.nullable)
            .finish_non_exhaustive()
    }
}

/// A declared interface: a name and its operations.
#[derive(Clone, Debug)]
pub struct ServiceDecl {
    pub name: String,
    pub methods: Vec<MethodRecord>,
}

impl ServiceDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), methods: Vec::new() }
    }

    pub fn method(mut self, record: MethodRecord) -> Self {
        self.methods.push(record);
        self
    }
}

/// A registered service, mapping method names to their ids.
#[derive(Clone, Debug)]
pub struct Service {
    name: String,
    methods: Vec<(String, MethodId)>,
}

impl Service {
    pub(crate) fn new(name: String, methods: Vec<(String, MethodId)>) -> Self {
        Self { name, methods }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The id assigned to `method`.
    pub fn id(&self, method: &str) -> Option<MethodId> {
        self.methods.iter().find(|(n, _)| n == method).map(|(_, id)| *id)
    }

    pub fn ids(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.methods.iter().map(|(_, id)| *id)
    }
}
