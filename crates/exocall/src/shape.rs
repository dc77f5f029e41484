//! # Shapes and Metadata
//!
//! Runtime descriptors for the types a method declares, and the tags attached
//! to methods and parameters.
//!
//! A stub generator knows every declared type at build time. It records them
//! as `Shape` values so that factories can match on them during resolution
//! without any reflection at call time.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

/// A declared type, as seen by converter and call adapter factories.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// The unit type. Methods may not declare it as their return shape.
    Unit,
    /// A concrete type, possibly parameterized by further shapes.
    Type {
        raw: Cow<'static, str>,
        args: Vec<Shape>,
    },
    /// An unresolved type variable or wildcard.
    Variable(Cow<'static, str>),
}

impl Shape {
    /// The call abstraction itself, `Call<T>`.
    pub const CALL: &'static str = "Call";
    /// The decoded response wrapper, `Envelope<T>`.
    pub const ENVELOPE: &'static str = "Envelope";
    /// The undecoded transport response. Never a valid payload type.
    pub const RAW_RESPONSE: &'static str = "RawResponse";
    /// Raw response bytes, passed through without decoding.
    pub const RESPONSE_BODY: &'static str = "ResponseBody";
    /// Raw request bytes, passed through without encoding.
    pub const REQUEST_BODY: &'static str = "RequestBody";
    /// Marker payload for responses that carry no body.
    pub const NO_CONTENT: &'static str = "NoContent";

    pub fn named(raw: impl Into<Cow<'static, str>>) -> Self {
        Self::Type { raw: raw.into(), args: Vec::new() }
    }

    pub fn generic(raw: impl Into<Cow<'static, str>>, args: Vec<Shape>) -> Self {
        Self::Type { raw: raw.into(), args }
    }

    pub fn variable(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Variable(name.into())
    }

    /// The shape of a Rust type, named by its type path.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named(std::any::type_name::<T>())
    }

    /// `Call<payload>`.
    pub fn call(payload: Shape) -> Self {
        Self::generic(Self::CALL, vec![payload])
    }

    /// `Envelope<payload>`.
    pub fn envelope(payload: Shape) -> Self {
        Self::generic(Self::ENVELOPE, vec![payload])
    }

    pub fn no_content() -> Self {
        Self::named(Self::NO_CONTENT)
    }

    pub fn response_body() -> Self {
        Self::named(Self::RESPONSE_BODY)
    }

    pub fn request_body() -> Self {
        Self::named(Self::REQUEST_BODY)
    }

    /// The raw (erased) name, if this is a concrete type.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Type { raw, .. } => Some(raw),
            _ => None,
        }
    }

    pub fn args(&self) -> &[Shape] {
        match self {
            Self::Type { args, .. } => args,
            _ => &[],
        }
    }

    /// The type argument at `index`, if present.
    pub fn param(&self, index: usize) -> Option<&Shape> {
        self.args().get(index)
    }

    /// Whether the raw name equals `raw`, ignoring type arguments.
    pub fn is(&self, raw: &str) -> bool {
        self.raw() == Some(raw)
    }

    pub fn is_parameterized(&self) -> bool {
        !self.args().is_empty()
    }

    /// Whether this shape, or any shape nested in it, is unresolved.
    pub fn has_variable(&self) -> bool {
        match self {
            Self::Unit => false,
            Self::Variable(_) => true,
            Self::Type { args, .. } => args.iter().any(Shape::has_variable),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "()"),
            Self::Variable(name) => write!(f, "{}", name),
            Self::Type { raw, args } => {
                write!(f, "{}", raw)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
        }
    }
}

/// Tags attached to a method or parameter.
///
/// Factories read these to decide whether they apply, the way they would
/// read annotations in a reflective system.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    tags: BTreeSet<Cow<'static, str>>,
}

impl Metadata {
    /// Asks the default call adapter to deliver callbacks inline instead of
    /// hopping to the client's callback executor.
    pub const SKIP_CALLBACK_EXECUTOR: &'static str = "skip-callback-executor";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tag: impl Into<Cow<'static, str>>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn insert(&mut self, tag: impl Into<Cow<'static, str>>) {
        self.tags.insert(tag.into());
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| t.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_nested_generics() {
        let shape = Shape::call(Shape::envelope(Shape::named("User")));
        assert_eq!(shape.to_string(), "Call<Envelope<User>>");
        assert_eq!(Shape::Unit.to_string(), "()");
    }

    #[test]
    fn test_variable_detection_is_recursive() {
        let shape = Shape::call(Shape::generic("List", vec![Shape::variable("T")]));
        assert!(shape.has_variable());
        assert!(!Shape::call(Shape::named("User")).has_variable());
    }

    #[test]
    fn test_raw_ignores_arguments() {
        let shape = Shape::envelope(Shape::named("User"));
        assert!(shape.is(Shape::ENVELOPE));
        assert!(shape.is_parameterized());
        assert!(!Shape::named(Shape::ENVELOPE).is_parameterized());
        assert_eq!(shape.param(0), Some(&Shape::named("User")));
    }

    #[test]
    fn test_metadata_tags() {
        let meta = Metadata::new().with(Metadata::SKIP_CALLBACK_EXECUTOR);
        assert!(meta.contains(Metadata::SKIP_CALLBACK_EXECUTOR));
        assert!(!meta.contains("other"));
        assert_eq!(meta.iter().count(), 1);
    }
}
