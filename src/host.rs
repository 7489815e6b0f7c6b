//! The host game's classes and values, as described to us by the embedding layer.
//!
//! Nothing in here knows about a particular game version. The embedding layer builds a
//! `HostClass` for every class it wants the bridge to see, and the adapter reasons about those
//! descriptions purely by shape.

use std::{
    any::Any,
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    ops::Deref,
    sync::Arc,
};

use case_insensitive_hashmap::CaseInsensitiveHashMap;
use strum::{Display, EnumIter};
use thiserror::Error;
use uuid::Uuid;

#[cfg(test)]
pub mod fixture;

/// The host's primitive types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Primitive {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
}

impl Primitive {
    /// Position on the numeric widening ladder. Booleans and chars are not on the ladder.
    fn rank(self) -> Option<u8> {
        match self {
            Primitive::Byte => Some(0),
            Primitive::Short => Some(1),
            Primitive::Int => Some(2),
            Primitive::Long => Some(3),
            Primitive::Float => Some(4),
            Primitive::Double => Some(5),
            Primitive::Boolean | Primitive::Char => None,
        }
    }

    /// Returns true if a value of type `from` can be widened into this type.
    pub fn widens_from(self, from: Primitive) -> bool {
        if self == from {
            return true;
        }

        match (self.rank(), from.rank()) {
            (Some(to), Some(from)) => from <= to,
            _ => false,
        }
    }
}

/// A primitive value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PrimValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
}

impl PrimValue {
    pub fn kind(self) -> Primitive {
        match self {
            PrimValue::Boolean(_) => Primitive::Boolean,
            PrimValue::Byte(_) => Primitive::Byte,
            PrimValue::Short(_) => Primitive::Short,
            PrimValue::Int(_) => Primitive::Int,
            PrimValue::Long(_) => Primitive::Long,
            PrimValue::Float(_) => Primitive::Float,
            PrimValue::Double(_) => Primitive::Double,
            PrimValue::Char(_) => Primitive::Char,
        }
    }

    /// Returns the zero value of `kind`, used to fill primitive parameters we have no value for.
    pub fn default_for(kind: Primitive) -> PrimValue {
        match kind {
            Primitive::Boolean => PrimValue::Boolean(false),
            Primitive::Byte => PrimValue::Byte(0),
            Primitive::Short => PrimValue::Short(0),
            Primitive::Int => PrimValue::Int(0),
            Primitive::Long => PrimValue::Long(0),
            Primitive::Float => PrimValue::Float(0.0),
            Primitive::Double => PrimValue::Double(0.0),
            Primitive::Char => PrimValue::Char('\0'),
        }
    }
}

/// Reference to a host class. Two references are equal if they name the same class.
#[derive(Clone)]
pub struct ClassRef(Arc<HostClass>);

impl Deref for ClassRef {
    type Target = HostClass;

    fn deref(&self) -> &HostClass {
        &self.0
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &ClassRef) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A type as it appears in an operation signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// The root of the class hierarchy. Accepts every non-primitive value.
    Object,

    Primitive(Primitive),

    /// The boxed form of a primitive.
    Boxed(Primitive),

    Str,
    Uuid,

    /// A zero-argument closure that produces a string.
    Supplier,

    /// The class declaring the operation. Lets builder-style methods return their own class
    /// before that class has been built.
    SelfType,

    Class(ClassRef),
}

impl TypeRef {
    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Primitive(_))
    }

    /// Replaces `SelfType` with `owner`.
    pub fn in_context(&self, owner: &ClassRef) -> TypeRef {
        match self {
            TypeRef::SelfType => TypeRef::Class(owner.clone()),
            other => other.clone(),
        }
    }

    pub fn class(&self) -> Option<&ClassRef> {
        match self {
            TypeRef::Class(class) => Some(class),
            _ => None,
        }
    }
}

impl From<&ClassRef> for TypeRef {
    fn from(class: &ClassRef) -> TypeRef {
        TypeRef::Class(class.clone())
    }
}

/// An instance of a host class. The embedding layer keeps whatever it needs in `state`.
pub struct HostObject {
    class: ClassRef,
    state: Box<dyn Any + Send + Sync>,
}

/// Shared reference to a host object. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Arc<HostObject>);

impl ObjectRef {
    pub fn new(class: &ClassRef, state: impl Any + Send + Sync) -> ObjectRef {
        ObjectRef(Arc::new(HostObject {
            class: class.clone(),
            state: Box::new(state),
        }))
    }

    pub fn class(&self) -> &ClassRef {
        &self.0.class
    }

    pub fn state<T: Any>(&self) -> Option<&T> {
        self.0.state.downcast_ref()
    }

    pub fn same(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the object, used for cycle detection when walking object graphs.
    pub fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &ObjectRef) -> bool {
        self.same(other)
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.class().name(), self.address())
    }
}

/// A value passed to or returned from a host operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Prim(PrimValue),
    Str(String),
    Uuid(Uuid),
    Supplier(String),
    Object(ObjectRef),
}

impl Value {
    pub fn int(value: i32) -> Value {
        Value::Prim(PrimValue::Int(value))
    }

    pub fn bool(value: bool) -> Value {
        Value::Prim(PrimValue::Boolean(value))
    }

    pub fn str(value: impl Into<String>) -> Value {
        Value::Str(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the type the host would report for this value. Primitives report their boxed
    /// form, because that is how they travel through reflective calls. `Null` has no type.
    pub fn runtime_type(&self) -> Option<TypeRef> {
        match self {
            Value::Null => None,
            Value::Prim(prim) => Some(TypeRef::Boxed(prim.kind())),
            Value::Str(_) => Some(TypeRef::Str),
            Value::Uuid(_) => Some(TypeRef::Uuid),
            Value::Supplier(_) => Some(TypeRef::Supplier),
            Value::Object(object) => Some(TypeRef::Class(object.class().clone())),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Supplier(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Prim(PrimValue::Byte(v)) => Some(*v as i64),
            Value::Prim(PrimValue::Short(v)) => Some(*v as i64),
            Value::Prim(PrimValue::Int(v)) => Some(*v as i64),
            Value::Prim(PrimValue::Long(v)) => Some(*v),
            _ => None,
        }
    }

    /// Returns the class of an object value.
    pub fn class(&self) -> Option<&ClassRef> {
        self.as_object().map(ObjectRef::class)
    }
}

/// Reasons a host operation can fail when invoked.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("operation threw: {0}")]
    Threw(String),

    #[error("arguments rejected")]
    BadArguments,

    #[error("operation needs a receiver")]
    NoReceiver,
}

/// Calls into the host. The first argument is the receiver for instance methods.
pub type Invoker = Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value, InvokeError> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum OpKind {
    Constructor,
    Static,
    Instance,
}

/// A constructor or method of a host class.
#[derive(Clone)]
pub struct Operation {
    name: String,
    kind: OpKind,
    params: Vec<TypeRef>,

    /// `None` for void methods. Constructors return their class, which is filled in by the
    /// adapter when it looks at the operation through its owner.
    returns: Option<TypeRef>,

    invoker: Invoker,
}

impl Operation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn params(&self) -> &[TypeRef] {
        &self.params
    }

    pub fn returns(&self) -> Option<&TypeRef> {
        self.returns.as_ref()
    }

    pub fn invoke(&self, target: Option<&Value>, args: &[Value]) -> Result<Value, InvokeError> {
        if self.kind == OpKind::Instance && target.is_none() {
            return Err(InvokeError::NoReceiver);
        }

        (self.invoker)(target, args)
    }
}

impl Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}({:?})", self.kind, self.name, self.params)?;

        if let Some(returns) = &self.returns {
            write!(f, " -> {returns:?}")?;
        }

        Ok(())
    }
}

/// A named, typed component of a record-like class.
#[derive(Clone, Debug)]
pub struct Component {
    pub name: String,
    pub ty: TypeRef,
    accessor: Operation,
}

impl Component {
    pub fn read(&self, composite: &Value) -> Result<Value, InvokeError> {
        self.accessor.invoke(Some(composite), &[])
    }
}

/// Description of a host class.
pub struct HostClass {
    name: String,
    superclass: Option<ClassRef>,
    interfaces: Vec<ClassRef>,

    /// Constructors in declaration order.
    constructors: Vec<Operation>,

    /// Static and instance methods in declaration order.
    methods: Vec<Operation>,

    /// Indices into `methods`, keyed by method name.
    by_name: CaseInsensitiveHashMap<Vec<usize>>,

    /// Present for record-like classes.
    components: Option<Vec<Component>>,
}

impl HostClass {
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            superclass: None,
            interfaces: vec![],
            constructors: vec![],
            methods: vec![],
            components: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&ClassRef> {
        self.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[ClassRef] {
        &self.interfaces
    }

    pub fn constructors(&self) -> &[Operation] {
        &self.constructors
    }

    pub fn methods(&self) -> &[Operation] {
        &self.methods
    }

    /// Methods declared on this class with the given name, compared case-insensitively.
    pub fn methods_named<'me>(&'me self, name: &str) -> impl Iterator<Item = &'me Operation> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&index| &self.methods[index])
    }

    pub fn components(&self) -> Option<&[Component]> {
        self.components.as_deref()
    }

    pub fn is_record(&self) -> bool {
        self.components.is_some()
    }

    /// Returns true if this class is `other` or inherits from it, directly or indirectly.
    pub fn is_subclass_of(&self, other: &HostClass) -> bool {
        if self.name == other.name {
            return true;
        }

        self.superclass
            .iter()
            .chain(self.interfaces.iter())
            .any(|parent| parent.is_subclass_of(other))
    }
}

pub struct ClassBuilder {
    name: String,
    superclass: Option<ClassRef>,
    interfaces: Vec<ClassRef>,
    constructors: Vec<Operation>,
    methods: Vec<Operation>,
    components: Option<Vec<Component>>,
}

impl ClassBuilder {
    pub fn extends(mut self, superclass: &ClassRef) -> ClassBuilder {
        self.superclass = Some(superclass.clone());
        self
    }

    pub fn implements(mut self, interface: &ClassRef) -> ClassBuilder {
        self.interfaces.push(interface.clone());
        self
    }

    pub fn constructor(
        mut self,
        params: Vec<TypeRef>,
        invoker: impl Fn(&[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
    ) -> ClassBuilder {
        self.constructors.push(Operation {
            name: "<init>".to_string(),
            kind: OpKind::Constructor,
            params,
            returns: Some(TypeRef::SelfType),
            invoker: Arc::new(move |_, args| invoker(args)),
        });

        self
    }

    pub fn static_method(
        mut self,
        name: impl Into<String>,
        params: Vec<TypeRef>,
        returns: Option<TypeRef>,
        invoker: impl Fn(&[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
    ) -> ClassBuilder {
        self.methods.push(Operation {
            name: name.into(),
            kind: OpKind::Static,
            params,
            returns,
            invoker: Arc::new(move |_, args| invoker(args)),
        });

        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        params: Vec<TypeRef>,
        returns: Option<TypeRef>,
        invoker: impl Fn(&Value, &[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
    ) -> ClassBuilder {
        self.methods.push(Operation {
            name: name.into(),
            kind: OpKind::Instance,
            params,
            returns,
            invoker: Arc::new(move |target, args| match target {
                Some(target) => invoker(target, args),
                None => Err(InvokeError::NoReceiver),
            }),
        });

        self
    }

    /// Adds a record component. Its accessor is also registered as a method with the same name,
    /// like the host's records do.
    pub fn component(
        mut self,
        name: impl Into<String>,
        ty: TypeRef,
        accessor: impl Fn(&Value) -> Result<Value, InvokeError> + Send + Sync + 'static,
    ) -> ClassBuilder {
        let name = name.into();

        let accessor = Operation {
            name: name.clone(),
            kind: OpKind::Instance,
            params: vec![],
            returns: Some(ty.clone()),
            invoker: Arc::new(move |target, _| match target {
                Some(target) => accessor(target),
                None => Err(InvokeError::NoReceiver),
            }),
        };

        self.methods.push(accessor.clone());

        self.components.get_or_insert_with(Vec::new).push(Component {
            name,
            ty,
            accessor,
        });

        self
    }

    pub fn build(self) -> ClassRef {
        let mut by_name: CaseInsensitiveHashMap<Vec<usize>> = CaseInsensitiveHashMap::new();

        for (index, method) in self.methods.iter().enumerate() {
            match by_name.get_mut(method.name.as_str()) {
                Some(indices) => indices.push(index),
                None => {
                    by_name.insert(method.name.clone(), vec![index]);
                }
            }
        }

        ClassRef(Arc::new(HostClass {
            name: self.name,
            superclass: self.superclass,
            interfaces: self.interfaces,
            constructors: self.constructors,
            methods: self.methods,
            by_name,
            components: self.components,
        }))
    }
}

/// The parts of the host's rendering system that the bridge relies on.
pub trait Host {
    /// Decodes image bytes into a host image value.
    fn decode_image(&self, bytes: &[u8]) -> Option<Value>;

    /// The host's texture manager instance.
    fn texture_manager(&self) -> Option<Value>;

    /// The host's mutable texture class, built around a decoded image.
    fn dynamic_texture_class(&self) -> Option<ClassRef>;

    /// The host's "client asset" texture wrapper, on versions that have one.
    fn client_asset_class(&self) -> Option<ClassRef> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_widens_upwards_only() {
        assert!(Primitive::Long.widens_from(Primitive::Byte));
        assert!(Primitive::Double.widens_from(Primitive::Long));
        assert!(Primitive::Float.widens_from(Primitive::Int));
        assert!(!Primitive::Int.widens_from(Primitive::Long));
        assert!(!Primitive::Int.widens_from(Primitive::Char));
        assert!(!Primitive::Boolean.widens_from(Primitive::Byte));
        assert!(Primitive::Char.widens_from(Primitive::Char));
    }

    #[test]
    fn defaults_have_their_own_kind() {
        use strum::IntoEnumIterator;

        for kind in Primitive::iter() {
            assert!(kind.widens_from(kind));
            assert_eq!(PrimValue::default_for(kind).kind(), kind);
        }
    }

    #[test]
    fn subclassing_follows_superclasses_and_interfaces() {
        let texture = HostClass::builder("Texture").build();
        let base = HostClass::builder("AbstractTexture")
            .implements(&texture)
            .build();
        let dynamic = HostClass::builder("DynamicTexture").extends(&base).build();

        assert!(dynamic.is_subclass_of(&texture));
        assert!(dynamic.is_subclass_of(&base));
        assert!(!base.is_subclass_of(&dynamic));
    }

    #[test]
    fn method_names_are_case_insensitive() {
        let class = HostClass::builder("Identifier")
            .static_method("fromNamespaceAndPath", vec![], None, |_| Ok(Value::Null))
            .static_method("of", vec![], None, |_| Ok(Value::Null))
            .build();

        assert_eq!(class.methods_named("FROMNAMESPACEANDPATH").count(), 1);
        assert_eq!(class.methods_named("parse").count(), 0);
    }

    #[test]
    fn components_register_accessors() {
        let class = HostClass::builder("Skin")
            .component("body", TypeRef::Str, |_| Ok(Value::str("body")))
            .build();

        assert!(class.is_record());
        assert_eq!(class.methods_named("body").count(), 1);

        let skin = Value::Object(ObjectRef::new(&class, ()));
        let body = class.components().unwrap()[0].read(&skin).unwrap();
        assert_eq!(body, Value::str("body"));
    }
}
