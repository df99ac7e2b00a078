//! Stategraph Object Model
//!
//! Runtime object graphs over schema-registered types.
//!
//! # Core Concepts
//!
//! - [`TypeRef`]: Structural reference to a runtime type
//! - [`TypeDescriptor`]: Members, equality contract and notification flags of a record type
//! - [`TypeRegistry`]: Process-wide lookup for named types
//! - [`ObjectRef`]: Shared handle to a live record, array, list, set or map
//! - [`EventSource`] / [`Subscription`]: Explicit observer registration with RAII teardown
//! - [`MemberPath`]: Addressing within a graph
//!
//! # Example
//!
//! ```rust,ignore
//! use stategraph_model::{ObjectRef, TypeDescriptor, TypeRef};
//!
//! let level = TypeDescriptor::record("Level")
//!     .property("value", TypeRef::INT)
//!     .property("next", TypeRef::named("Level"))
//!     .register()?;
//!
//! let root = ObjectRef::new(&level);
//! let _sub = root.subscribe(|e| println!("{e:?}"));
//! root.set("value", 1)?;
//! ```

#![warn(unreachable_pub)]

mod error;
mod event;
mod object;
mod path;
mod registry;
mod types;
mod value;

// Re-exports
pub use error::ModelError;
pub use event::{EventSource, ObjectEvent, Subscription};
pub use object::{ObjectId, ObjectRef, WeakObjectRef};
pub use path::{MemberPath, PathSegment};
pub use registry::TypeRegistry;
pub use types::{
    Equality, MemberDescriptor, MemberKind, ScalarKind, Shape, TypeDescriptor,
    TypeDescriptorBuilder, TypeRef, Visibility,
};
pub use value::{Key, Value};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn registered_self_referential_type() {
        let level = TypeDescriptor::record("ModelLevel")
            .property("value", TypeRef::INT)
            .property("next", TypeRef::named("ModelLevel"))
            .register()
            .unwrap();

        let root = ObjectRef::new(&level);
        let next = ObjectRef::named("ModelLevel").unwrap();
        root.set("next", &next).unwrap();
        next.set("next", &root).unwrap();

        let back = root.get("next").unwrap();
        let back = back.as_object().unwrap().get("next").unwrap();
        assert!(back.as_object().unwrap().ptr_eq(&root));
    }

    #[test]
    fn events_report_member_paths() {
        let level = TypeDescriptor::record("ModelPathLevel")
            .property("value", TypeRef::INT)
            .build()
            .unwrap();
        let root = ObjectRef::new(&std::sync::Arc::new(level));

        let paths = Rc::new(RefCell::new(Vec::new()));
        let sink = paths.clone();
        let _sub = root.subscribe(move |e| {
            if let ObjectEvent::PropertyChanged(Some(name)) = e {
                sink.borrow_mut().push(MemberPath::root().member(name.clone()).to_string());
            }
        });

        root.set("value", 3).unwrap();
        assert_eq!(*paths.borrow(), vec!["value".to_string()]);
    }
}
