//! Converts values into the type a host operation expects, by wrapping them in whatever
//! constructor or factory the host offers.

use crate::host::{ClassRef, TypeRef, Value};

use super::{
    resolve::CapabilityResolver,
    signature::{accepts_value, CapabilityRequest, ParamConstraint},
};

/// Wraps `value` in a new instance of `class`. A two-argument constructor taking the value twice
/// is preferred, then a one-argument constructor, then a one-argument static factory.
pub fn wrap(resolver: &mut CapabilityResolver, class: &ClassRef, value: &Value) -> Option<Value> {
    let accepting = ParamConstraint::accepting(value);
    let wanted: TypeRef = class.into();
    let is_instance = |result: &Value| accepts_value(&wanted, result) && !result.is_null();

    let attempts = [
        (
            CapabilityRequest::constructor(vec![accepting.clone(), accepting.clone()]),
            vec![value.clone(), value.clone()],
        ),
        (
            CapabilityRequest::constructor(vec![accepting.clone()]),
            vec![value.clone()],
        ),
        (
            CapabilityRequest::factory(class, vec![accepting]),
            vec![value.clone()],
        ),
    ];

    attempts.iter().find_map(|(request, args)| {
        resolver.invoke_until(class, request, None, args, is_instance)
    })
}

/// Returns `value` as something `target` accepts: the value itself if it already fits, or the
/// value wrapped in `target`'s class or one of the `wrappers` that is a subclass of `target`.
/// Returns `None` rather than a value of the wrong type.
pub fn coerce(
    resolver: &mut CapabilityResolver,
    target: &TypeRef,
    value: &Value,
    wrappers: &[ClassRef],
) -> Option<Value> {
    if accepts_value(target, value) {
        return Some(value.clone());
    }

    let own_class = target.class().cloned();
    let subclasses = wrappers.iter().filter(|wrapper| match target {
        TypeRef::Class(class) => wrapper.is_subclass_of(class) && *wrapper != class,
        TypeRef::Object => true,
        _ => false,
    });

    own_class
        .iter()
        .chain(subclasses)
        .filter_map(|class| wrap(resolver, class, value))
        .find(|wrapped| accepts_value(target, wrapped))
}
