//! Finds host operations by shape.
//!
//! Candidates are searched in a fixed order: the class's own operations before inherited ones
//! (superclasses first, then interfaces), and declaration order within each class. When the
//! request expresses a return-type preference, every preferred candidate is ordered before the
//! rest, keeping that fixed order inside both groups. Resolved candidate lists are memoised per
//! class and request, since the host never reloads its classes within a session.

use cached::{Cached, UnboundCache};
use itertools::Itertools;

use crate::host::{ClassRef, InvokeError, OpKind, Operation, TypeRef, Value};

use super::signature::{self, CapabilityRequest, Shape};

/// A host operation that matched a request, ready to be invoked.
#[derive(Clone, Debug)]
pub struct ResolvedCapability {
    owner: ClassRef,
    operation: Operation,
    shape: Shape,
}

impl ResolvedCapability {
    fn new(owner: &ClassRef, operation: &Operation) -> ResolvedCapability {
        ResolvedCapability {
            owner: owner.clone(),
            operation: operation.clone(),
            shape: Shape::of(owner, operation),
        }
    }

    pub fn name(&self) -> &str {
        self.operation.name()
    }

    /// The class that declares the operation.
    pub fn owner(&self) -> &ClassRef {
        &self.owner
    }

    pub fn params(&self) -> &[TypeRef] {
        &self.shape.params
    }

    pub fn returns(&self) -> Option<&TypeRef> {
        self.shape.returns.as_ref()
    }

    pub fn invoke(&self, target: Option<&Value>, args: &[Value]) -> Result<Value, InvokeError> {
        self.operation.invoke(target, args)
    }
}

/// Returns `class` followed by everything it inherits from, without duplicates.
fn lineage(class: &ClassRef) -> Vec<ClassRef> {
    let mut superclasses = vec![];
    let mut cursor = Some(class.clone());

    while let Some(current) = cursor {
        cursor = current.superclass().cloned();
        superclasses.push(current);
    }

    // Interfaces come after the whole superclass chain, breadth first.
    let mut interfaces = vec![];
    let mut queue: Vec<ClassRef> = superclasses
        .iter()
        .flat_map(|class| class.interfaces().iter().cloned())
        .collect();

    while !queue.is_empty() {
        let next = queue
            .iter()
            .flat_map(|interface| interface.interfaces().iter().cloned())
            .collect();

        interfaces.append(&mut queue);
        queue = next;
    }

    superclasses
        .into_iter()
        .chain(interfaces)
        .unique_by(|class| class.name().to_string())
        .collect()
}

/// Returns the classes whose operations are searched for `kind`, in search order.
fn search_classes(class: &ClassRef, kind: OpKind) -> Vec<ClassRef> {
    match kind {
        // Constructors are never inherited.
        OpKind::Constructor => vec![class.clone()],
        OpKind::Static | OpKind::Instance => lineage(class),
    }
}

fn declared(class: &ClassRef, kind: OpKind) -> &[Operation] {
    match kind {
        OpKind::Constructor => class.constructors(),
        OpKind::Static | OpKind::Instance => class.methods(),
    }
}

/// Searches for host operations by shape, remembering what it has found.
pub struct CapabilityResolver {
    cache: UnboundCache<(String, CapabilityRequest), Vec<ResolvedCapability>>,
}

impl Default for CapabilityResolver {
    fn default() -> Self {
        CapabilityResolver::new()
    }
}

impl CapabilityResolver {
    pub fn new() -> CapabilityResolver {
        CapabilityResolver {
            cache: UnboundCache::new(),
        }
    }

    /// Returns every operation of `class` matching `request`, in preference order.
    pub fn candidates(
        &mut self,
        class: &ClassRef,
        request: &CapabilityRequest,
    ) -> Vec<ResolvedCapability> {
        let key = (class.name().to_string(), request.clone());

        if let Some(found) = self.cache.cache_get(&key) {
            return found.clone();
        }

        let found = Self::search(class, request);

        log::debug!(
            "{} candidate(s) on {} for {:?}",
            found.len(),
            class.name(),
            request
        );

        self.cache.cache_set(key, found.clone());
        found
    }

    fn search(class: &ClassRef, request: &CapabilityRequest) -> Vec<ResolvedCapability> {
        let matching = search_classes(class, request.kind)
            .iter()
            .flat_map(|owner| {
                declared(owner, request.kind)
                    .iter()
                    .filter(move |operation| operation.kind() == request.kind)
                    .map(move |operation| ResolvedCapability::new(owner, operation))
            })
            .filter(|candidate| signature::matches(&candidate.shape, request))
            .collect_vec();

        if !request.returns.has_preference() {
            return matching;
        }

        let (mut tight, loose): (Vec<_>, Vec<_>) = matching
            .into_iter()
            .partition(|candidate| request.returns.is_tight(candidate.returns()));

        tight.extend(loose);
        tight
    }

    /// Returns the preferred operation of `class` matching `request`, if there is one.
    pub fn resolve(
        &mut self,
        class: &ClassRef,
        request: &CapabilityRequest,
    ) -> Option<ResolvedCapability> {
        self.candidates(class, request).into_iter().next()
    }

    /// Looks operations up by name. This is the only place names take part in matching, and is
    /// only for cases where shape alone can't tell candidates apart. Names are tried in the
    /// order given and compared case-insensitively; parameters must still match the request,
    /// but return types are not checked.
    pub fn resolve_named(
        &mut self,
        class: &ClassRef,
        names: &[&str],
        request: &CapabilityRequest,
    ) -> Vec<ResolvedCapability> {
        let classes = search_classes(class, request.kind);

        names
            .iter()
            .flat_map(|name| {
                classes.iter().flat_map(move |owner| {
                    owner
                        .methods_named(name)
                        .map(move |operation| ResolvedCapability::new(owner, operation))
                })
            })
            .filter(|candidate| signature::params_match(&candidate.shape, request))
            .collect()
    }

    /// Invokes candidates in order until one succeeds and produces a value that `accept` agrees
    /// with. Failing candidates are skipped.
    pub fn invoke_until(
        &mut self,
        class: &ClassRef,
        request: &CapabilityRequest,
        target: Option<&Value>,
        args: &[Value],
        accept: impl Fn(&Value) -> bool,
    ) -> Option<Value> {
        let candidates = self.candidates(class, request);
        invoke_candidates(&candidates, target, args, accept)
    }

    /// Invokes candidates in order until one succeeds.
    pub fn invoke_first(
        &mut self,
        class: &ClassRef,
        request: &CapabilityRequest,
        target: Option<&Value>,
        args: &[Value],
    ) -> Option<Value> {
        self.invoke_until(class, request, target, args, |_| true)
    }

    /// Number of memoised lookups.
    pub fn cached_lookups(&self) -> usize {
        self.cache.cache_size()
    }
}

/// Invokes `candidates` in order, returning the first accepted result.
pub fn invoke_candidates(
    candidates: &[ResolvedCapability],
    target: Option<&Value>,
    args: &[Value],
    accept: impl Fn(&Value) -> bool,
) -> Option<Value> {
    for candidate in candidates {
        match candidate.invoke(target, args) {
            Ok(value) if accept(&value) => return Some(value),

            Ok(value) => log::debug!(
                "{}::{} returned unusable {:?}",
                candidate.owner().name(),
                candidate.name(),
                value
            ),

            Err(err) => log::debug!(
                "{}::{} failed: {}",
                candidate.owner().name(),
                candidate.name(),
                err
            ),
        }
    }

    None
}
