//! Live objects
//!
//! Provides [`ObjectRef`], a shared handle to an instance whose shape is given by
//! its [`TypeRef`]: record members, indexed items (array, list, set) or keyed
//! entries (map). Every mutation raises exactly one [`ObjectEvent`] after the
//! internal borrow is released, so handlers may read or mutate the graph.

use crate::error::ModelError;
use crate::event::{EventSource, ObjectEvent, Subscription};
use crate::registry::TypeRegistry;
use crate::types::{ScalarKind, Shape, TypeDescriptor, TypeRef};
use crate::value::{Key, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Identity of a live object
///
/// Stable while the object is alive. Two live objects never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(usize);

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

enum ObjectData {
    Record(IndexMap<Arc<str>, Value>),
    Items(Vec<Value>),
    Entries(IndexMap<Key, Value>),
}

struct Object {
    ty: TypeRef,
    descriptor: Option<Arc<TypeDescriptor>>,
    data: RefCell<ObjectData>,
    events: EventSource<ObjectEvent>,
}

/// Shared handle to a live object
///
/// Cloning shares the instance. Equality and hashing are by identity.
#[derive(Clone)]
pub struct ObjectRef(Rc<Object>);

/// Non-owning handle to a live object
#[derive(Clone)]
pub struct WeakObjectRef(Weak<Object>);

impl WeakObjectRef {
    /// Upgrade to a strong handle if the object is still alive
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }
}

impl Debug for WeakObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("WeakObjectRef(..)")
    }
}

impl ObjectRef {
    fn from_parts(ty: TypeRef, descriptor: Option<Arc<TypeDescriptor>>, data: ObjectData) -> Self {
        Self(Rc::new(Object {
            ty,
            descriptor,
            data: RefCell::new(data),
            events: EventSource::new(),
        }))
    }

    /// Create an instance of a described type with default member values
    #[must_use]
    pub fn new(descriptor: &Arc<TypeDescriptor>) -> Self {
        let data = match descriptor.shape() {
            Shape::Record(members) => ObjectData::Record(
                members
                    .iter()
                    .map(|m| (m.name().clone(), Value::default_for(m.ty())))
                    .collect(),
            ),
            Shape::Opaque => ObjectData::Items(Vec::new()),
        };
        Self::from_parts(descriptor.type_ref(), Some(descriptor.clone()), data)
    }

    /// Create an instance of a registered type by name
    ///
    /// # Errors
    /// Returns error if the name is not registered
    pub fn named(name: &str) -> Result<Self, ModelError> {
        TypeRegistry::global()
            .get(name)
            .map(|d| Self::new(&d))
            .ok_or_else(|| ModelError::UnknownType(name.into()))
    }

    /// Fixed-size array
    #[must_use]
    pub fn array(item: TypeRef, values: Vec<Value>) -> Self {
        Self::from_parts(TypeRef::array(item), None, ObjectData::Items(values))
    }

    /// Resizable list
    #[must_use]
    pub fn list(item: TypeRef, values: Vec<Value>) -> Self {
        Self::from_parts(TypeRef::list(item), None, ObjectData::Items(values))
    }

    /// Set; duplicate values (by shallow equality) are dropped
    #[must_use]
    pub fn new_set(item: TypeRef, values: Vec<Value>) -> Self {
        let mut unique: Vec<Value> = Vec::with_capacity(values.len());
        for value in values {
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        Self::from_parts(TypeRef::set(item), None, ObjectData::Items(unique))
    }

    /// Map with scalar keys
    #[must_use]
    pub fn map(key: ScalarKind, value: TypeRef, entries: impl IntoIterator<Item = (Key, Value)>) -> Self {
        Self::from_parts(
            TypeRef::map(key, value),
            None,
            ObjectData::Entries(entries.into_iter().collect()),
        )
    }

    /// Default instantiation policy
    ///
    /// Registered constructible records get default member values, arrays get
    /// `len` default items, other collections start empty.
    ///
    /// # Errors
    /// Returns error if the type is a scalar, unregistered, opaque or not constructible
    pub fn instantiate(ty: &TypeRef, len: usize) -> Result<Self, ModelError> {
        match ty {
            TypeRef::Named(name) => {
                let descriptor = TypeRegistry::global()
                    .get(name)
                    .ok_or_else(|| ModelError::UnknownType(name.clone()))?;
                if !descriptor.constructible() || matches!(descriptor.shape(), Shape::Opaque) {
                    return Err(ModelError::NotConstructible(ty.clone()));
                }
                Ok(Self::new(&descriptor))
            }
            TypeRef::Array(item) => Ok(Self::array(
                (**item).clone(),
                vec![Value::default_for(item); len],
            )),
            TypeRef::List(item) => Ok(Self::list((**item).clone(), Vec::new())),
            TypeRef::Set(item) => Ok(Self::new_set((**item).clone(), Vec::new())),
            TypeRef::Map(key, value) => Ok(Self::map(*key, (**value).clone(), [])),
            TypeRef::Scalar(_) => Err(ModelError::NotConstructible(ty.clone())),
        }
    }

    /// Initialize a member and return `self`
    ///
    /// # Errors
    /// Returns error if the member is unknown
    pub fn with(self, member: &str, value: impl Into<Value>) -> Result<Self, ModelError> {
        self.initialize(member, value)?;
        Ok(self)
    }

    /// Identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        ObjectId(Rc::as_ptr(&self.0) as usize)
    }

    /// Check if both handles point to the same instance
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Non-owning handle
    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Rc::downgrade(&self.0))
    }

    /// Runtime type
    #[inline]
    #[must_use]
    pub fn type_ref(&self) -> &TypeRef {
        &self.0.ty
    }

    /// Descriptor for registered types
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> Option<&Arc<TypeDescriptor>> {
        self.0.descriptor.as_ref()
    }

    /// Check if the instance raises change notifications
    ///
    /// Collections always notify; records follow their descriptor.
    #[inline]
    #[must_use]
    pub fn notifies(&self) -> bool {
        self.0.descriptor.as_ref().map_or(true, |d| d.notifies())
    }

    fn unsupported(&self, operation: &'static str) -> ModelError {
        ModelError::UnsupportedOperation {
            ty: self.0.ty.clone(),
            operation,
        }
    }

    fn unknown_member(&self, member: &str) -> ModelError {
        ModelError::UnknownMember {
            ty: self.0.ty.clone(),
            member: member.into(),
        }
    }

    fn emit(&self, event: &ObjectEvent) {
        self.0.events.emit(event);
    }

    /// Read a member
    ///
    /// # Errors
    /// Returns error if the instance is not a record or has no such member
    pub fn get(&self, member: &str) -> Result<Value, ModelError> {
        match &*self.0.data.borrow() {
            ObjectData::Record(values) => values
                .get(member)
                .cloned()
                .ok_or_else(|| self.unknown_member(member)),
            _ => Err(self.unsupported("get")),
        }
    }

    fn write_member(&self, member: &str, value: Value, respect_readonly: bool) -> Result<bool, ModelError> {
        if respect_readonly
            && self
                .descriptor()
                .and_then(|d| d.member(member))
                .is_some_and(|m| m.is_readonly())
        {
            return Err(ModelError::ReadonlyMember {
                ty: self.0.ty.clone(),
                member: member.into(),
            });
        }

        let mut data = self.0.data.borrow_mut();
        let ObjectData::Record(values) = &mut *data else {
            return Err(self.unsupported("set"));
        };
        let slot = values
            .get_mut(member)
            .ok_or_else(|| self.unknown_member(member))?;
        if *slot == value {
            return Ok(false);
        }
        *slot = value;
        Ok(true)
    }

    /// Write a writable member
    ///
    /// Notifies only when the value changed (shallow) and the type notifies.
    /// Returns whether the value changed.
    ///
    /// # Errors
    /// Returns error if the member is unknown or readonly
    pub fn set(&self, member: &str, value: impl Into<Value>) -> Result<bool, ModelError> {
        let changed = self.write_member(member, value.into(), true)?;
        if changed && self.notifies() {
            self.emit(&ObjectEvent::property(member));
        }
        Ok(changed)
    }

    /// Write any member, readonly included, without notifying
    ///
    /// Used to populate freshly created instances.
    ///
    /// # Errors
    /// Returns error if the member is unknown
    pub fn initialize(&self, member: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        self.write_member(member, value.into(), false).map(|_| ())
    }

    /// Raise the "all properties changed" notification
    pub fn notify_all(&self) {
        if self.notifies() {
            self.emit(&ObjectEvent::PropertyChanged(None));
        }
    }

    /// Number of items or entries; zero for records
    #[must_use]
    pub fn len(&self) -> usize {
        match &*self.0.data.borrow() {
            ObjectData::Record(_) => 0,
            ObjectData::Items(items) => items.len(),
            ObjectData::Entries(entries) => entries.len(),
        }
    }

    /// Check if there are no items or entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an item
    ///
    /// # Errors
    /// Returns error if the instance has no items or the index is out of range
    pub fn item(&self, index: usize) -> Result<Value, ModelError> {
        match &*self.0.data.borrow() {
            ObjectData::Items(items) => items.get(index).cloned().ok_or(ModelError::IndexOutOfRange {
                index,
                len: items.len(),
            }),
            _ => Err(self.unsupported("item")),
        }
    }

    /// Snapshot of all items (empty for records and maps)
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        match &*self.0.data.borrow() {
            ObjectData::Items(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Check if a set or sequence holds a value (shallow equality)
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        match &*self.0.data.borrow() {
            ObjectData::Items(items) => items.contains(value),
            _ => false,
        }
    }

    fn with_list<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Vec<Value>) -> Result<R, ModelError>,
    ) -> Result<R, ModelError> {
        if !matches!(self.0.ty, TypeRef::List(_)) {
            return Err(self.unsupported(operation));
        }
        match &mut *self.0.data.borrow_mut() {
            ObjectData::Items(items) => f(items),
            _ => Err(self.unsupported(operation)),
        }
    }

    /// Replace the item at `index`, returning the old value
    ///
    /// Allowed on arrays and lists.
    ///
    /// # Errors
    /// Returns error on sets, maps, records or an out-of-range index
    pub fn replace(&self, index: usize, value: impl Into<Value>) -> Result<Value, ModelError> {
        if !matches!(self.0.ty, TypeRef::Array(_) | TypeRef::List(_)) {
            return Err(self.unsupported("replace"));
        }
        let old = {
            let mut data = self.0.data.borrow_mut();
            let ObjectData::Items(items) = &mut *data else {
                return Err(self.unsupported("replace"));
            };
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(ModelError::IndexOutOfRange { index, len })?;
            std::mem::replace(slot, value.into())
        };
        self.emit(&ObjectEvent::Replace { index });
        Ok(old)
    }

    /// Append to a list
    ///
    /// # Errors
    /// Returns error unless the instance is a list
    pub fn push(&self, value: impl Into<Value>) -> Result<(), ModelError> {
        let value = value.into();
        let index = self.with_list("push", |items| {
            items.push(value);
            Ok(items.len() - 1)
        })?;
        self.emit(&ObjectEvent::Add { index });
        Ok(())
    }

    /// Insert into a list
    ///
    /// # Errors
    /// Returns error unless the instance is a list and `index <= len`
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<(), ModelError> {
        let value = value.into();
        self.with_list("insert", |items| {
            if index > items.len() {
                return Err(ModelError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            Ok(())
        })?;
        self.emit(&ObjectEvent::Add { index });
        Ok(())
    }

    /// Remove from a list, returning the removed value
    ///
    /// # Errors
    /// Returns error unless the instance is a list and the index is in range
    pub fn remove_at(&self, index: usize) -> Result<Value, ModelError> {
        let removed = self.with_list("remove_at", |items| {
            if index >= items.len() {
                return Err(ModelError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            Ok(items.remove(index))
        })?;
        self.emit(&ObjectEvent::Remove { index });
        Ok(removed)
    }

    /// Move an item within a list
    ///
    /// # Errors
    /// Returns error unless the instance is a list and both indices are in range
    pub fn move_item(&self, from: usize, to: usize) -> Result<(), ModelError> {
        self.with_list("move_item", |items| {
            let len = items.len();
            for index in [from, to] {
                if index >= len {
                    return Err(ModelError::IndexOutOfRange { index, len });
                }
            }
            let item = items.remove(from);
            items.insert(to, item);
            Ok(())
        })?;
        self.emit(&ObjectEvent::Move { from, to });
        Ok(())
    }

    /// Remove all items or entries
    ///
    /// # Errors
    /// Returns error on arrays and records
    pub fn clear(&self) -> Result<(), ModelError> {
        {
            let mut data = self.0.data.borrow_mut();
            match (&self.0.ty, &mut *data) {
                (TypeRef::List(_) | TypeRef::Set(_), ObjectData::Items(items)) => items.clear(),
                (TypeRef::Map(..), ObjectData::Entries(entries)) => entries.clear(),
                _ => return Err(self.unsupported("clear")),
            }
        }
        self.emit(&ObjectEvent::Reset);
        Ok(())
    }

    fn with_set<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Result<R, ModelError> {
        if !matches!(self.0.ty, TypeRef::Set(_)) {
            return Err(self.unsupported(operation));
        }
        match &mut *self.0.data.borrow_mut() {
            ObjectData::Items(items) => Ok(f(items)),
            _ => Err(self.unsupported(operation)),
        }
    }

    /// Add to a set; returns `false` if already present
    ///
    /// # Errors
    /// Returns error unless the instance is a set
    pub fn set_add(&self, value: impl Into<Value>) -> Result<bool, ModelError> {
        let value = value.into();
        let added = self.with_set("set_add", |items| {
            if items.contains(&value) {
                None
            } else {
                items.push(value);
                Some(items.len() - 1)
            }
        })?;
        match added {
            Some(index) => {
                self.emit(&ObjectEvent::Add { index });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove from a set; returns `false` if absent
    ///
    /// # Errors
    /// Returns error unless the instance is a set
    pub fn set_remove(&self, value: &Value) -> Result<bool, ModelError> {
        let removed = self.with_set("set_remove", |items| {
            let index = items.iter().position(|v| v == value)?;
            items.remove(index);
            Some(index)
        })?;
        match removed {
            Some(index) => {
                self.emit(&ObjectEvent::Remove { index });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn with_entries<R>(
        &self,
        key: Option<&Key>,
        operation: &'static str,
        f: impl FnOnce(&mut IndexMap<Key, Value>) -> R,
    ) -> Result<R, ModelError> {
        let TypeRef::Map(kind, _) = &self.0.ty else {
            return Err(self.unsupported(operation));
        };
        if let Some(key) = key {
            if key.kind() != *kind {
                return Err(ModelError::InvalidValue {
                    ty: self.0.ty.clone(),
                    reason: "key kind does not match",
                });
            }
        }
        match &mut *self.0.data.borrow_mut() {
            ObjectData::Entries(entries) => Ok(f(entries)),
            _ => Err(self.unsupported(operation)),
        }
    }

    /// Insert or replace a map entry, returning the previous value
    ///
    /// # Errors
    /// Returns error unless the instance is a map with matching key kind
    pub fn insert_entry(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<Option<Value>, ModelError> {
        let key = key.into();
        let value = value.into();
        let previous = self.with_entries(Some(&key), "insert_entry", |entries| {
            entries.insert(key.clone(), value)
        })?;
        self.emit(&ObjectEvent::EntryChanged { key });
        Ok(previous)
    }

    /// Remove a map entry, returning the removed value
    ///
    /// # Errors
    /// Returns error unless the instance is a map with matching key kind
    pub fn remove_entry(&self, key: &Key) -> Result<Option<Value>, ModelError> {
        let removed = self.with_entries(Some(key), "remove_entry", |entries| entries.shift_remove(key))?;
        if removed.is_some() {
            self.emit(&ObjectEvent::EntryChanged { key: key.clone() });
        }
        Ok(removed)
    }

    /// Read a map entry
    #[must_use]
    pub fn entry(&self, key: &Key) -> Option<Value> {
        match &*self.0.data.borrow() {
            ObjectData::Entries(entries) => entries.get(key).cloned(),
            _ => None,
        }
    }

    /// Snapshot of map keys in insertion order
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        match &*self.0.data.borrow() {
            ObjectData::Entries(entries) => entries.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Snapshot of map entries in insertion order
    #[must_use]
    pub fn entries(&self) -> Vec<(Key, Value)> {
        match &*self.0.data.borrow() {
            ObjectData::Entries(entries) => entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => Vec::new(),
        }
    }

    /// Observe change notifications
    pub fn subscribe(&self, handler: impl Fn(&ObjectEvent) + 'static) -> Subscription {
        self.0.events.subscribe(handler)
    }

    /// Number of live subscriptions
    #[inline]
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.0.events.handler_count()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0.ty, self.id())
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("ty", &self.0.ty)
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}
