//! # Factory Chains
//!
//! An ordered, immutable list of pluggable factories of one capability kind,
//! scanned left to right.
//!
//! ## Skip-past continuation
//!
//! Every scan takes an optional `skip_past` position and starts strictly after
//! it. A factory that wants to decorate "whatever would have matched had I not
//! existed" re-enters the chain with its own position, which it receives
//! while being probed.

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::Capability;
use crate::error::Error;
use crate::error::ResolutionError;
use crate::error::Result;
use crate::shape::Shape;

struct Entry<F: ?Sized> {
    name: Cow<'static, str>,
    factory: Arc<F>,
}

impl<F: ?Sized> Clone for Entry<F> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), factory: self.factory.clone() }
    }
}

/// Ordered factories. Fixed once the owning client is built.
pub struct FactoryChain<F: ?Sized> {
    entries: Vec<Entry<F>>,
}

impl<F: ?Sized> Clone for FactoryChain<F> {
    fn clone(&self) -> Self {
        Self { entries: self.entries.clone() }
    }
}

impl<F: ?Sized> Default for FactoryChain<F> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<F: ?Sized> FactoryChain<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<Cow<'static, str>>, factory: Arc<F>) {
        self.entries.push(Entry { name: name.into(), factory });
    }

    /// Appends every entry of `other` in order.
    pub(crate) fn extend_from(&mut self, other: &FactoryChain<F>) {
        self.entries.extend(other.entries.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Arc<F>> {
        self.entries.get(position).map(|e| &e.factory)
    }

    pub fn name(&self, position: usize) -> Option<&str> {
        self.entries.get(position).map(|e| e.name.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_ref())
    }

    /// Position of `factory` in the chain, compared by identity.
    pub fn position(&self, factory: &Arc<F>) -> Option<usize> {
        self.entries.iter().position(|e| Arc::ptr_eq(&e.factory, factory))
    }

    /// Scans from just after `skip_past` and returns the first match, if any.
    ///
    /// `probe` receives each factory with its position. `Ok(None)` means "no
    /// match, keep going"; `Err` aborts the scan as a factory fault.
    pub fn find<T>(
        &self,
        skip_past: Option<usize>,
        mut probe: impl FnMut(usize, &F) -> anyhow::Result<Option<T>>,
    ) -> Result<Option<T>> {
        let start = skip_past.map_or(0, |p| p + 1);
        for (position, entry) in self.entries.iter().enumerate().skip(start) {
            match probe(position, &entry.factory) {
                Ok(Some(found)) => {
                    tracing::trace!(factory = %entry.name, position, "factory matched");
                    return Ok(Some(found));
                }
                Ok(None) => continue,
                Err(e) => return Err(Error::from_factory(&entry.name, e)),
            }
        }
        Ok(None)
    }

    /// Like `find`, but exhaustion is a `ResolutionError` listing the skipped
    /// and tried factories.
    pub fn resolve<T>(
        &self,
        capability: Capability,
        shape: &Shape,
        skip_past: Option<usize>,
        probe: impl FnMut(usize, &F) -> anyhow::Result<Option<T>>,
    ) -> Result<T> {
        if let Some(found) = self.find(skip_past, probe)? {
            return Ok(found);
        }

        let start = skip_past.map_or(0, |p| p + 1).min(self.entries.len());
        let names: Vec<String> = self.names().map(str::to_string).collect();
        Err(Error::Resolution {
            method: None,
            error: ResolutionError {
                capability,
                shape: shape.clone(),
                skipped: names[..start].to_vec(),
                tried: names[start..].to_vec(),
            },
        })
    }
}
