//! Rebuilds immutable record-like host values with one component swapped out.
//!
//! The slot to replace is chosen by type first. When exactly one component can hold the new
//! value, that is the one. When exactly two can, the second is used: the skin records seen so far
//! declare the body texture before the cape texture. Anything else falls back to the first
//! component whose name mentions "cape".

use std::{collections::HashMap, sync::Arc};

use itertools::Itertools;

use crate::host::{ClassRef, Component, TypeRef, Value};

use super::{
    coerce::coerce,
    resolve::{CapabilityResolver, ResolvedCapability},
    signature::{accepts_value, CapabilityRequest, ParamConstraint},
};

/// Keyword searched for in component names when types don't pick a slot.
pub const CAPE_KEYWORD: &str = "cape";

/// The components of a record class and the constructor that rebuilds it.
pub struct CompositeDescriptor {
    class: ClassRef,
    components: Vec<Component>,
    constructor: ResolvedCapability,
}

impl CompositeDescriptor {
    /// Describes `class`, if it is a record with a constructor taking every component in order.
    pub fn describe(resolver: &mut CapabilityResolver, class: &ClassRef) -> Option<CompositeDescriptor> {
        let components = class.components()?.to_vec();

        if components.is_empty() {
            return None;
        }

        let request = CapabilityRequest::constructor(
            components
                .iter()
                .map(|component| ParamConstraint::Exact(component.ty.clone()))
                .collect(),
        );

        let constructor = resolver.resolve(class, &request)?;

        Some(CompositeDescriptor {
            class: class.clone(),
            components,
            constructor,
        })
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Component names and declared types, in order.
    pub fn layout(&self) -> Vec<(&str, &TypeRef)> {
        self.components
            .iter()
            .map(|component| (component.name.as_str(), &component.ty))
            .collect()
    }

    /// Reads every component of `composite`.
    fn read_all(&self, composite: &Value) -> Option<Vec<Value>> {
        self.components
            .iter()
            .map(|component| component.read(composite))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                log::warn!("Couldn't read {} components: {}", self.class.name(), err);
            })
            .ok()
    }
}

/// Picks the component that `replacement` should go into.
pub fn select_component(components: &[Component], replacement: &Value) -> Option<usize> {
    let accepting = components
        .iter()
        .positions(|component| accepts_value(&component.ty, replacement))
        .collect_vec();

    match accepting[..] {
        [only] => Some(only),
        [_, second] => Some(second),
        _ => components
            .iter()
            .position(|component| component.name.to_lowercase().contains(CAPE_KEYWORD)),
    }
}

/// Rebuilds record values, remembering what it learns about each record class.
#[derive(Default)]
pub struct CompositeRebuilder {
    descriptors: HashMap<String, Option<Arc<CompositeDescriptor>>>,
}

impl CompositeRebuilder {
    pub fn new() -> CompositeRebuilder {
        CompositeRebuilder::default()
    }

    /// Returns the descriptor for `class`, describing it on first use.
    pub fn descriptor(
        &mut self,
        resolver: &mut CapabilityResolver,
        class: &ClassRef,
    ) -> Option<Arc<CompositeDescriptor>> {
        self.descriptors
            .entry(class.name().to_string())
            .or_insert_with(|| CompositeDescriptor::describe(resolver, class).map(Arc::new))
            .clone()
    }

    /// Returns a copy of `composite` with the selected component replaced by `replacement`,
    /// coerced into the component's declared type. Every other component is carried over as it
    /// was. `wrappers` are extra classes the replacement may be wrapped in during coercion.
    ///
    /// Returns `None` if `composite` isn't a record, no component can be selected, coercion
    /// fails or the constructor refuses the new values. The original value is never modified.
    pub fn rebuild_with_replacement(
        &mut self,
        resolver: &mut CapabilityResolver,
        composite: &Value,
        replacement: &Value,
        wrappers: &[ClassRef],
    ) -> Option<Value> {
        let class = composite.class()?;
        let descriptor = self.descriptor(resolver, class)?;

        let mut values = descriptor.read_all(composite)?;
        let index = select_component(descriptor.components(), replacement)?;
        let slot = &descriptor.components()[index];

        let Some(coerced) = coerce(resolver, &slot.ty, replacement, wrappers) else {
            log::warn!(
                "Can't put {:?} into {}.{} ({:?})",
                replacement,
                class.name(),
                slot.name,
                slot.ty
            );

            return None;
        };

        values[index] = coerced;

        let wanted: TypeRef = class.into();

        match descriptor.constructor.invoke(None, &values) {
            Ok(rebuilt) if accepts_value(&wanted, &rebuilt) && !rebuilt.is_null() => Some(rebuilt),

            Ok(other) => {
                log::warn!("{} constructor returned {:?}", class.name(), other);
                None
            }

            Err(err) => {
                log::warn!("{} constructor failed: {}", class.name(), err);
                None
            }
        }
    }
}
