//! Dynamic values stored in object graphs

use crate::object::ObjectRef;
use crate::types::{ScalarKind, TypeRef};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// A member, item or entry value
///
/// Scalars are plain values; objects are shared references into the graph.
/// `PartialEq` is shallow: scalars compare by value, objects by identity.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent reference
    #[default]
    Null,

    /// `bool`
    Bool(bool),

    /// `i64`
    Int(i64),

    /// `f64`
    Float(f64),

    /// `string`
    Str(Arc<str>),

    /// Reference to a live object
    Object(ObjectRef),
}

impl Value {
    /// Default value for a declared member or item type
    #[must_use]
    pub fn default_for(ty: &TypeRef) -> Self {
        match ty {
            TypeRef::Scalar(ScalarKind::Bool) => Self::Bool(false),
            TypeRef::Scalar(ScalarKind::Int) => Self::Int(0),
            TypeRef::Scalar(ScalarKind::Float) => Self::Float(0.0),
            _ => Self::Null,
        }
    }

    /// Check for `Null`
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check for a scalar
    #[inline]
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_)
        )
    }

    /// Object reference, if any
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Integer value, if any
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// String value, if any
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Runtime type (`None` for `Null`)
    #[must_use]
    pub fn runtime_type(&self) -> Option<TypeRef> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(TypeRef::BOOL),
            Self::Int(_) => Some(TypeRef::INT),
            Self::Float(_) => Some(TypeRef::FLOAT),
            Self::Str(_) => Some(TypeRef::STR),
            Self::Object(o) => Some(o.type_ref().clone()),
        }
    }

    /// Value equality for two scalars
    ///
    /// Returns `None` unless both sides are scalars. `NaN` equals `NaN`.
    #[must_use]
    pub fn scalar_eq(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a == b),
            (Self::Int(a), Self::Int(b)) => Some(a == b),
            (Self::Float(a), Self::Float(b)) => Some(a == b || (a.is_nan() && b.is_nan())),
            (Self::Str(a), Self::Str(b)) => Some(a == b),
            (a, b) if a.is_scalar() && b.is_scalar() => Some(false),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (a, b) => a.scalar_eq(b).unwrap_or(false),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::Object(o) => write!(f, "{o}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Self::Object(v)
    }
}

impl From<&ObjectRef> for Value {
    fn from(v: &ObjectRef) -> Self {
        Self::Object(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Mapping key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// `bool` key
    Bool(bool),

    /// `i64` key
    Int(i64),

    /// `string` key
    Str(Arc<str>),
}

impl Key {
    /// Scalar kind of this key
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::Int(_) => ScalarKind::Int,
            Self::Str(_) => ScalarKind::Str,
        }
    }

    /// Key as a value
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(v) => Value::Bool(*v),
            Self::Int(v) => Value::Int(*v),
            Self::Str(v) => Value::Str(v.clone()),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for Key {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Self::Str(v.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_equality() {
        assert_eq!(Value::from(1), Value::Int(1));
        assert_ne!(Value::from(1), Value::from(2));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Int(0));
    }

    #[test]
    fn scalar_eq_rejects_objects() {
        assert_eq!(Value::Null.scalar_eq(&Value::Null), None);
        assert_eq!(Value::Int(1).scalar_eq(&Value::Bool(true)), Some(false));
    }

    #[test]
    fn defaults_by_type() {
        assert_eq!(Value::default_for(&TypeRef::INT), Value::Int(0));
        assert_eq!(Value::default_for(&TypeRef::BOOL), Value::Bool(false));
        assert!(Value::default_for(&TypeRef::STR).is_null());
        assert!(Value::default_for(&TypeRef::named("Level")).is_null());
    }

    #[test]
    fn key_round_trip_to_value() {
        let key = Key::from("a");
        assert_eq!(key.kind(), ScalarKind::Str);
        assert_eq!(key.to_value(), Value::from("a"));
    }
}
