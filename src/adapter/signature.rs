//! Decides whether a host operation has the shape a caller is asking for. Everything in here is
//! pure: a mismatch is just `false`.

use crate::host::{ClassRef, OpKind, Operation, Primitive, TypeRef, Value};

/// Returns true if a value of type `source` can be passed where `target` is expected.
pub fn is_assignable(target: &TypeRef, source: &TypeRef) -> bool {
    match (target, source) {
        (TypeRef::Object, source) => !source.is_primitive(),

        (TypeRef::Primitive(to), TypeRef::Primitive(from) | TypeRef::Boxed(from)) => {
            to.widens_from(*from)
        }

        // Boxes only unbox and rebox into their own kind.
        (TypeRef::Boxed(to), TypeRef::Primitive(from) | TypeRef::Boxed(from)) => to == from,

        (TypeRef::Str, TypeRef::Str)
        | (TypeRef::Uuid, TypeRef::Uuid)
        | (TypeRef::Supplier, TypeRef::Supplier) => true,

        (TypeRef::Class(to), TypeRef::Class(from)) => from.is_subclass_of(to),

        _ => false,
    }
}

/// Returns true if `value` can be passed where `target` is expected. Null fits anything that
/// isn't a primitive.
pub fn accepts_value(target: &TypeRef, value: &Value) -> bool {
    match value.runtime_type() {
        Some(source) => is_assignable(target, &source),
        None => !target.is_primitive(),
    }
}

/// Returns true if either type can be assigned to the other.
pub fn related(a: &TypeRef, b: &TypeRef) -> bool {
    is_assignable(a, b) || is_assignable(b, a)
}

fn is_boolean_like(ty: &TypeRef) -> bool {
    matches!(
        ty,
        TypeRef::Primitive(Primitive::Boolean) | TypeRef::Boxed(Primitive::Boolean)
    )
}

/// What a single parameter of the wanted operation must look like.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamConstraint {
    /// The parameter is exactly this type.
    Exact(TypeRef),

    /// The parameter will accept a value of this type.
    AcceptsFrom(TypeRef),

    /// The parameter's type is this type or one of its subtypes.
    AssignableTo(TypeRef),

    BooleanLike,
    Any,
}

impl ParamConstraint {
    /// Builds the constraint for passing `value` as an argument.
    pub fn accepting(value: &Value) -> ParamConstraint {
        match value.runtime_type() {
            Some(ty) => ParamConstraint::AcceptsFrom(ty),

            // Nulls can go anywhere a reference can.
            None => ParamConstraint::AcceptsFrom(TypeRef::Object),
        }
    }

    pub fn accepts(&self, param: &TypeRef) -> bool {
        match self {
            ParamConstraint::Exact(ty) => param == ty,
            ParamConstraint::AcceptsFrom(TypeRef::Object) => !param.is_primitive(),
            ParamConstraint::AcceptsFrom(ty) => is_assignable(param, ty),
            ParamConstraint::AssignableTo(ty) => is_assignable(ty, param),
            ParamConstraint::BooleanLike => is_boolean_like(param),
            ParamConstraint::Any => true,
        }
    }
}

/// What the wanted operation must return.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReturnConstraint {
    Any,
    Void,
    NonVoid,

    /// The return type must be related to this type in either direction. Candidates returning
    /// this type or a subtype of it are preferred.
    Related(TypeRef),

    /// Candidates with a non-void return related to this type are preferred, but any return type
    /// is acceptable.
    Prefer(TypeRef),
}

impl ReturnConstraint {
    /// Hard check. Preferences never reject.
    pub fn accepts(&self, returns: Option<&TypeRef>) -> bool {
        match (self, returns) {
            (ReturnConstraint::Any | ReturnConstraint::Prefer(_), _) => true,
            (ReturnConstraint::Void, returns) => returns.is_none(),
            (ReturnConstraint::NonVoid, returns) => returns.is_some(),
            (ReturnConstraint::Related(wanted), Some(returns)) => related(wanted, returns),
            (ReturnConstraint::Related(_), None) => false,
        }
    }

    /// Returns true if `returns` is one of the preferred return types.
    pub fn is_tight(&self, returns: Option<&TypeRef>) -> bool {
        match (self, returns) {
            (ReturnConstraint::Related(wanted), Some(returns)) => is_assignable(wanted, returns),
            (ReturnConstraint::Prefer(wanted), Some(returns)) => related(wanted, returns),
            _ => false,
        }
    }

    /// Returns true if there is a preference to sort candidates by.
    pub fn has_preference(&self) -> bool {
        matches!(
            self,
            ReturnConstraint::Related(_) | ReturnConstraint::Prefer(_)
        )
    }
}

/// An abstract description of an operation the bridge needs from a host class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CapabilityRequest {
    pub kind: OpKind,
    pub params: Vec<ParamConstraint>,
    pub returns: ReturnConstraint,
}

impl CapabilityRequest {
    pub fn constructor(params: Vec<ParamConstraint>) -> CapabilityRequest {
        CapabilityRequest {
            kind: OpKind::Constructor,
            params,
            returns: ReturnConstraint::Any,
        }
    }

    /// A static method returning an instance related to `class`.
    pub fn factory(class: &ClassRef, params: Vec<ParamConstraint>) -> CapabilityRequest {
        CapabilityRequest {
            kind: OpKind::Static,
            params,
            returns: ReturnConstraint::Related(class.into()),
        }
    }

    pub fn method(params: Vec<ParamConstraint>, returns: ReturnConstraint) -> CapabilityRequest {
        CapabilityRequest {
            kind: OpKind::Instance,
            params,
            returns,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// An operation seen through the class that declares it, with `SelfType` filled in.
#[derive(Clone, Debug)]
pub struct Shape {
    pub kind: OpKind,
    pub params: Vec<TypeRef>,
    pub returns: Option<TypeRef>,
}

impl Shape {
    pub fn of(owner: &ClassRef, operation: &Operation) -> Shape {
        let returns = match operation.kind() {
            OpKind::Constructor => Some(TypeRef::Class(owner.clone())),
            _ => operation.returns().map(|ty| ty.in_context(owner)),
        };

        Shape {
            kind: operation.kind(),
            params: operation
                .params()
                .iter()
                .map(|ty| ty.in_context(owner))
                .collect(),
            returns,
        }
    }
}

/// Returns true if the parameters of `shape` satisfy `request`, ignoring the return type.
pub fn params_match(shape: &Shape, request: &CapabilityRequest) -> bool {
    shape.kind == request.kind
        && shape.params.len() == request.arity()
        && shape
            .params
            .iter()
            .zip(&request.params)
            .all(|(param, constraint)| constraint.accepts(param))
}

/// Returns true if `shape` structurally satisfies `request`.
pub fn matches(shape: &Shape, request: &CapabilityRequest) -> bool {
    params_match(shape, request) && request.returns.accepts(shape.returns.as_ref())
}
