//! Testing utilities for the stategraph workspace
//!
//! Stub domain types, builders for populated instances, and tracing setup.

#![allow(missing_docs)]

use once_cell::sync::Lazy;
use stategraph_model::{
    Key, MemberDescriptor, ObjectRef, ScalarKind, TypeDescriptor, TypeRef, Value,
};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub const WITH_SIMPLE: &str = "WithSimple";
pub const WITH_COMPLEX: &str = "WithComplex";
pub const LEVEL: &str = "Level";
pub const IMMUTABLE: &str = "Immutable";
pub const WITH_IMMUTABLE: &str = "WithImmutable";
pub const WITH_READONLY: &str = "WithReadonly";
pub const WITH_READONLY_COMPLEX: &str = "WithReadonlyComplex";
pub const NOT_NOTIFYING: &str = "NotNotifying";
pub const MONEY: &str = "Money";
pub const WITH_LIST: &str = "WithList";
pub const WITH_ARRAY: &str = "WithArray";
pub const WITH_SET: &str = "WithSet";
pub const WITH_MAP: &str = "WithMap";
pub const BAG: &str = "Bag";
pub const WITH_BAG: &str = "WithBag";
pub const HOLDER: &str = "Holder";
pub const WITH_SIMPLE_SET: &str = "WithSimpleSet";
pub const SEALED: &str = "Sealed";
pub const WITH_SEALED: &str = "WithSealed";
pub const WITH_FIELDS: &str = "WithFields";
pub const PARENT: &str = "Parent";
pub const CHILD: &str = "Child";

static REGISTERED: Lazy<()> = Lazy::new(|| {
    let named = TypeRef::named;

    TypeDescriptor::record(WITH_SIMPLE)
        .property("int_value", TypeRef::INT)
        .property("double_value", TypeRef::FLOAT)
        .property("string_value", TypeRef::STR)
        .property("flag", TypeRef::BOOL)
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_COMPLEX)
        .property("name", TypeRef::STR)
        .property("complex", named(WITH_SIMPLE))
        .register()
        .unwrap();
    TypeDescriptor::record(LEVEL)
        .property("value", TypeRef::INT)
        .property("next", named(LEVEL))
        .property("levels", TypeRef::list(named(LEVEL)))
        .register()
        .unwrap();
    TypeDescriptor::record(IMMUTABLE)
        .readonly_property("value", TypeRef::INT)
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_IMMUTABLE)
        .property("name", TypeRef::STR)
        .property("immutable", named(IMMUTABLE))
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_READONLY)
        .readonly_property("id", TypeRef::INT)
        .property("value", TypeRef::INT)
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_READONLY_COMPLEX)
        .readonly_property("complex", named(WITH_SIMPLE))
        .register()
        .unwrap();
    TypeDescriptor::record(NOT_NOTIFYING)
        .property("value", TypeRef::INT)
        .not_notifying()
        .register()
        .unwrap();
    TypeDescriptor::record(MONEY)
        .property("amount", TypeRef::INT)
        .property("currency", TypeRef::STR)
        .equality(|x, y| {
            x.get("amount").ok() == y.get("amount").ok()
                && x.get("currency").ok() == y.get("currency").ok()
        })
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_LIST)
        .property("name", TypeRef::STR)
        .property("items", TypeRef::list(named(WITH_SIMPLE)))
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_ARRAY)
        .property("ints", TypeRef::array(TypeRef::INT))
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_SET)
        .property("ints", TypeRef::set(TypeRef::INT))
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_MAP)
        .property("lookup", TypeRef::map(ScalarKind::Str, named(WITH_SIMPLE)))
        .register()
        .unwrap();
    TypeDescriptor::opaque(BAG).register().unwrap();
    TypeDescriptor::record(WITH_BAG)
        .property("value", TypeRef::INT)
        .property("bag", named(BAG))
        .register()
        .unwrap();
    TypeDescriptor::record(HOLDER)
        .property("inner", named(WITH_BAG))
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_SIMPLE_SET)
        .property("records", TypeRef::set(named(WITH_SIMPLE)))
        .register()
        .unwrap();
    TypeDescriptor::record(SEALED)
        .property("value", TypeRef::INT)
        .not_constructible()
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_SEALED)
        .property("sealed", named(SEALED))
        .register()
        .unwrap();
    TypeDescriptor::record(WITH_FIELDS)
        .field("value", TypeRef::INT)
        .member(MemberDescriptor::field("hidden", TypeRef::INT).non_public())
        .property("computed", TypeRef::INT)
        .register()
        .unwrap();
    TypeDescriptor::record(PARENT)
        .property("name", TypeRef::STR)
        .property("child", named(CHILD))
        .register()
        .unwrap();
    TypeDescriptor::record(CHILD)
        .property("name", TypeRef::STR)
        .property("parent", named(PARENT))
        .register()
        .unwrap();
});

/// Register every stub type once per process
pub fn register_stubs() {
    Lazy::force(&REGISTERED);
}

/// New default instance of a stub type
pub fn new(name: &str) -> ObjectRef {
    register_stubs();
    ObjectRef::named(name).unwrap()
}

pub fn with_simple(int_value: i64, string_value: &str) -> ObjectRef {
    new(WITH_SIMPLE)
        .with("int_value", int_value)
        .unwrap()
        .with("string_value", string_value)
        .unwrap()
}

pub fn with_complex(name: &str, complex: Option<ObjectRef>) -> ObjectRef {
    new(WITH_COMPLEX)
        .with("name", name)
        .unwrap()
        .with("complex", complex)
        .unwrap()
}

pub fn level(value: i64) -> ObjectRef {
    let level = new(LEVEL).with("value", value).unwrap();
    level
        .initialize("levels", ObjectRef::list(TypeRef::named(LEVEL), Vec::new()))
        .unwrap();
    level
}

/// Chain `values[0] -> values[1] -> ...` through `next`
pub fn level_chain(values: &[i64]) -> Option<ObjectRef> {
    values.iter().rev().fold(None, |next, value| {
        let head = level(*value);
        head.initialize("next", next).unwrap();
        Some(head)
    })
}

pub fn immutable(value: i64) -> ObjectRef {
    new(IMMUTABLE).with("value", value).unwrap()
}

pub fn with_immutable(name: &str, value: Option<i64>) -> ObjectRef {
    new(WITH_IMMUTABLE)
        .with("name", name)
        .unwrap()
        .with("immutable", value.map(immutable))
        .unwrap()
}

pub fn with_readonly(id: i64, value: i64) -> ObjectRef {
    new(WITH_READONLY)
        .with("id", id)
        .unwrap()
        .with("value", value)
        .unwrap()
}

pub fn money(amount: i64, currency: &str) -> ObjectRef {
    new(MONEY)
        .with("amount", amount)
        .unwrap()
        .with("currency", currency)
        .unwrap()
}

pub fn with_list(name: &str, items: Vec<ObjectRef>) -> ObjectRef {
    let list = ObjectRef::list(
        TypeRef::named(WITH_SIMPLE),
        items.into_iter().map(Value::from).collect(),
    );
    new(WITH_LIST)
        .with("name", name)
        .unwrap()
        .with("items", list)
        .unwrap()
}

pub fn with_array(ints: &[i64]) -> ObjectRef {
    let array = ObjectRef::array(TypeRef::INT, ints.iter().copied().map(Value::from).collect());
    new(WITH_ARRAY).with("ints", array).unwrap()
}

pub fn with_set(ints: &[i64]) -> ObjectRef {
    let set = ObjectRef::new_set(TypeRef::INT, ints.iter().copied().map(Value::from).collect());
    new(WITH_SET).with("ints", set).unwrap()
}

pub fn with_simple_set(records: Vec<ObjectRef>) -> ObjectRef {
    let set = ObjectRef::new_set(
        TypeRef::named(WITH_SIMPLE),
        records.into_iter().map(Value::from).collect(),
    );
    new(WITH_SIMPLE_SET).with("records", set).unwrap()
}

/// A `WithBag` whose bag is set, so its `bag` member cannot be walked
pub fn with_bag(value: i64) -> ObjectRef {
    let with_bag = new(WITH_BAG).with("value", value).unwrap();
    with_bag.set("bag", new(BAG)).unwrap();
    with_bag
}

pub fn with_map(entries: Vec<(&str, ObjectRef)>) -> ObjectRef {
    let map = ObjectRef::map(
        ScalarKind::Str,
        TypeRef::named(WITH_SIMPLE),
        entries
            .into_iter()
            .map(|(k, v)| (Key::from(k), Value::from(v))),
    );
    new(WITH_MAP).with("lookup", map).unwrap()
}

/// Read `member` of an object-valued `value`
pub fn member(value: &Value, name: &str) -> Value {
    value.as_object().unwrap().get(name).unwrap()
}

/// Read an object-valued member
pub fn object(owner: &ObjectRef, name: &str) -> ObjectRef {
    owner.get(name).unwrap().as_object().unwrap().clone()
}

static TRACING: Once = Once::new();

/// Install a test-writer subscriber filtered by `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stategraph=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}
