//! Type descriptors for schema-registered runtime types
//!
//! Provides [`TypeRef`], [`TypeDescriptor`] and [`MemberDescriptor`], the explicit
//! schema that stands in for runtime reflection: every record type an operation
//! walks is described once and registered in the [`TypeRegistry`](crate::TypeRegistry).

use crate::error::ModelError;
use crate::object::ObjectRef;
use crate::registry::TypeRegistry;
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Recognized primitive kinds
///
/// Values of these kinds always carry a reliable value-equality contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarKind {
    /// `bool`
    Bool,

    /// `i64`
    Int,

    /// `f64`
    Float,

    /// `string`
    Str,
}

impl ScalarKind {
    /// Textual name used by [`TypeRef`] parsing and display
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "i64",
            Self::Float => "f64",
            Self::Str => "string",
        }
    }

    /// Parse a scalar name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Bool),
            "i64" => Some(Self::Int),
            "f64" => Some(Self::Float),
            "string" => Some(Self::Str),
            _ => None,
        }
    }
}

impl Display for ScalarKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structural reference to a runtime type
///
/// Record types are referenced by name and resolved through the registry,
/// which is what allows self-referential types (`Level.next: Level`).
///
/// # Examples
/// - `i64`, `string`
/// - `Level`
/// - `List<Level>`, `Map<string, List<i64>>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// Primitive value
    Scalar(ScalarKind),

    /// Registered record (or opaque) type
    Named(Arc<str>),

    /// Fixed-size indexable sequence
    Array(Arc<TypeRef>),

    /// Resizable indexable sequence
    List(Arc<TypeRef>),

    /// Unordered unique-membership collection
    Set(Arc<TypeRef>),

    /// Key-to-value mapping with scalar keys
    Map(ScalarKind, Arc<TypeRef>),
}

impl TypeRef {
    /// `bool`
    pub const BOOL: Self = Self::Scalar(ScalarKind::Bool);
    /// `i64`
    pub const INT: Self = Self::Scalar(ScalarKind::Int);
    /// `f64`
    pub const FLOAT: Self = Self::Scalar(ScalarKind::Float);
    /// `string`
    pub const STR: Self = Self::Scalar(ScalarKind::Str);

    /// Reference a registered type by name
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::Named(name.into())
    }

    /// `Array<item>`
    #[inline]
    #[must_use]
    pub fn array(item: TypeRef) -> Self {
        Self::Array(Arc::new(item))
    }

    /// `List<item>`
    #[inline]
    #[must_use]
    pub fn list(item: TypeRef) -> Self {
        Self::List(Arc::new(item))
    }

    /// `Set<item>`
    #[inline]
    #[must_use]
    pub fn set(item: TypeRef) -> Self {
        Self::Set(Arc::new(item))
    }

    /// `Map<key, value>`
    #[inline]
    #[must_use]
    pub fn map(key: ScalarKind, value: TypeRef) -> Self {
        Self::Map(key, Arc::new(value))
    }

    /// Check if this is a primitive
    #[inline]
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    /// Check if this is a collection type
    #[inline]
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::Array(_) | Self::List(_) | Self::Set(_) | Self::Map(..)
        )
    }

    /// Element type of a collection (value type for maps)
    #[must_use]
    pub fn item_type(&self) -> Option<&TypeRef> {
        match self {
            Self::Array(item) | Self::List(item) | Self::Set(item) | Self::Map(_, item) => {
                Some(item)
            }
            Self::Scalar(_) | Self::Named(_) => None,
        }
    }

    /// Name of a registered type
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Named(name) => f.write_str(name),
            Self::Array(item) => write!(f, "Array<{item}>"),
            Self::List(item) => write!(f, "List<{item}>"),
            Self::Set(item) => write!(f, "Set<{item}>"),
            Self::Map(key, value) => write!(f, "Map<{key}, {value}>"),
        }
    }
}

impl FromStr for TypeRef {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ModelError::InvalidTypeName(s.to_string());
        if s.is_empty() {
            return Err(invalid());
        }

        if let Some(kind) = ScalarKind::from_name(s) {
            return Ok(Self::Scalar(kind));
        }

        let Some(open) = s.find('<') else {
            if s.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Ok(Self::named(s));
            }
            return Err(invalid());
        };

        if !s.ends_with('>') {
            return Err(invalid());
        }

        let head = &s[..open];
        let args = split_type_args(&s[open + 1..s.len() - 1]).ok_or_else(invalid)?;
        match (head, args.as_slice()) {
            ("Array", [item]) => Ok(Self::array(item.parse()?)),
            ("List", [item]) => Ok(Self::list(item.parse()?)),
            ("Set", [item]) => Ok(Self::set(item.parse()?)),
            ("Map", [key, value]) => {
                let key = ScalarKind::from_name(key.trim()).ok_or_else(invalid)?;
                Ok(Self::map(key, value.parse()?))
            }
            _ => Err(invalid()),
        }
    }
}

/// Split generic arguments at top-level commas
fn split_type_args(inner: &str) -> Option<Vec<&str>> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                args.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    args.push(&inner[start..]);
    Some(args)
}

/// Kind of member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Accessor-style member
    Property,

    /// Storage member
    Field,
}

/// Member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Visible to callers
    #[default]
    Public,

    /// Internal state
    NonPublic,
}

/// Named, typed accessor for a member of a record type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberDescriptor {
    name: Arc<str>,
    ty: TypeRef,
    kind: MemberKind,
    visibility: Visibility,
    readonly: bool,
}

impl MemberDescriptor {
    /// Public writable property
    #[inline]
    #[must_use]
    pub fn property(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: MemberKind::Property,
            visibility: Visibility::Public,
            readonly: false,
        }
    }

    /// Public writable field
    #[inline]
    #[must_use]
    pub fn field(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            kind: MemberKind::Field,
            ..Self::property(name, ty)
        }
    }

    /// Mark as readonly
    #[inline]
    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Mark as non-public
    #[inline]
    #[must_use]
    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    /// Member name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Declared type
    #[inline]
    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Member kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Visibility
    #[inline]
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Check if the member cannot be written after construction
    #[inline]
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }
}

/// Custom value-equality contract for a record type
#[derive(Clone)]
pub struct Equality(Arc<dyn Fn(&ObjectRef, &ObjectRef) -> bool + Send + Sync>);

impl Equality {
    /// Wrap an equality function
    #[inline]
    #[must_use]
    pub fn new(f: impl Fn(&ObjectRef, &ObjectRef) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Compare two instances
    #[inline]
    #[must_use]
    pub fn equals(&self, x: &ObjectRef, y: &ObjectRef) -> bool {
        (self.0)(x, y)
    }
}

impl Debug for Equality {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Equality(..)")
    }
}

/// Shape of a registered type
#[derive(Debug, Clone)]
pub enum Shape {
    /// Record with ordered members
    Record(Vec<MemberDescriptor>),

    /// Enumerable without a recognized collection shape
    Opaque,
}

/// Description of a registered type
///
/// # Invariants
/// - Member names are unique within a descriptor
/// - Immutable after construction
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: Arc<str>,
    shape: Shape,
    equality: Option<Equality>,
    notifies: bool,
    constructible: bool,
}

impl TypeDescriptor {
    /// Start describing a record type
    #[inline]
    #[must_use]
    pub fn record(name: impl Into<Arc<str>>) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            name: name.into(),
            members: Vec::new(),
            opaque: false,
            equality: None,
            notifies: true,
            constructible: true,
        }
    }

    /// Start describing an enumerable type with no recognized shape
    #[inline]
    #[must_use]
    pub fn opaque(name: impl Into<Arc<str>>) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            opaque: true,
            ..Self::record(name)
        }
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Reference to this type
    #[inline]
    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::Named(self.name.clone())
    }

    /// Shape
    #[inline]
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Members in declaration order (empty for opaque types)
    #[must_use]
    pub fn members(&self) -> &[MemberDescriptor] {
        match &self.shape {
            Shape::Record(members) => members,
            Shape::Opaque => &[],
        }
    }

    /// Lookup a member by name
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members().iter().find(|m| &*m.name == name)
    }

    /// Custom equality contract, if declared
    #[inline]
    #[must_use]
    pub fn equality(&self) -> Option<&Equality> {
        self.equality.as_ref()
    }

    /// Check if instances raise change notifications
    #[inline]
    #[must_use]
    pub fn notifies(&self) -> bool {
        self.notifies
    }

    /// Check if new instances may be created by the default instantiation policy
    #[inline]
    #[must_use]
    pub fn constructible(&self) -> bool {
        self.constructible
    }
}

/// Builder for [`TypeDescriptor`]
#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    name: Arc<str>,
    members: Vec<MemberDescriptor>,
    opaque: bool,
    equality: Option<Equality>,
    notifies: bool,
    constructible: bool,
}

impl TypeDescriptorBuilder {
    /// Add a member
    #[inline]
    #[must_use]
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Add a public writable property
    #[inline]
    #[must_use]
    pub fn property(self, name: &str, ty: TypeRef) -> Self {
        self.member(MemberDescriptor::property(name, ty))
    }

    /// Add a public readonly property
    #[inline]
    #[must_use]
    pub fn readonly_property(self, name: &str, ty: TypeRef) -> Self {
        self.member(MemberDescriptor::property(name, ty).readonly())
    }

    /// Add a public writable field
    #[inline]
    #[must_use]
    pub fn field(self, name: &str, ty: TypeRef) -> Self {
        self.member(MemberDescriptor::field(name, ty))
    }

    /// Declare a value-equality contract
    #[inline]
    #[must_use]
    pub fn equality(
        mut self,
        f: impl Fn(&ObjectRef, &ObjectRef) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.equality = Some(Equality::new(f));
        self
    }

    /// Instances do not raise change notifications
    #[inline]
    #[must_use]
    pub fn not_notifying(mut self) -> Self {
        self.notifies = false;
        self
    }

    /// Instances cannot be created by the default instantiation policy
    #[inline]
    #[must_use]
    pub fn not_constructible(mut self) -> Self {
        self.constructible = false;
        self
    }

    /// Build descriptor
    ///
    /// # Errors
    /// Returns error if two members share a name
    pub fn build(self) -> Result<TypeDescriptor, ModelError> {
        for (i, member) in self.members.iter().enumerate() {
            if self.members[..i].iter().any(|m| m.name == member.name) {
                return Err(ModelError::DuplicateMember {
                    ty: self.name.clone(),
                    member: member.name.clone(),
                });
            }
        }

        let shape = if self.opaque {
            Shape::Opaque
        } else {
            Shape::Record(self.members)
        };

        Ok(TypeDescriptor {
            name: self.name,
            shape,
            equality: self.equality,
            notifies: self.notifies,
            constructible: self.constructible,
        })
    }

    /// Build and register in the global registry
    ///
    /// # Errors
    /// Returns error if the descriptor is invalid or the name is taken
    pub fn register(self) -> Result<Arc<TypeDescriptor>, ModelError> {
        TypeRegistry::global().register(self.build()?)
    }
}
