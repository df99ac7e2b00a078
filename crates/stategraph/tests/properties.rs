//! Property tests over generated graphs

use proptest::prelude::*;
use stategraph::prelude::*;
use stategraph_test_utils as stubs;

#[derive(Debug, Clone)]
struct ListShape {
    name: String,
    items: Vec<(i64, String)>,
}

impl ListShape {
    fn build(&self) -> ObjectRef {
        let items = self
            .items
            .iter()
            .map(|(int_value, string_value)| stubs::with_simple(*int_value, string_value))
            .collect();
        stubs::with_list(&self.name, items)
    }
}

fn list_shape() -> impl Strategy<Value = ListShape> {
    (
        "[a-c]{0,2}",
        prop::collection::vec((0..3_i64, "[a-b]{0,1}"), 0..4),
    )
        .prop_map(|(name, items)| ListShape { name, items })
}

fn chain() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0..3_i64, 1..5)
}

fn reference_handling() -> impl Strategy<Value = ReferenceHandling> {
    prop_oneof![
        Just(ReferenceHandling::Throw),
        Just(ReferenceHandling::References),
        Just(ReferenceHandling::Structural),
        Just(ReferenceHandling::StructuralWithReferenceLoops),
    ]
}

fn structural() -> std::sync::Arc<Settings> {
    Settings::properties(ReferenceHandling::Structural)
}

proptest! {
    #[test]
    fn equality_is_reflexive(shape in list_shape()) {
        let x = shape.build();
        prop_assert!(equals(&x, &x, &structural()).unwrap());
        prop_assert!(equals(&x, &shape.build(), &structural()).unwrap());
    }

    #[test]
    fn equality_is_symmetric(a in list_shape(), b in list_shape(), rh in reference_handling()) {
        let settings = Settings::properties(rh);
        let (x, y) = (a.build(), b.build());
        let forward = equals(&x, &y, &settings).ok();
        let backward = equals(&y, &x, &settings).ok();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn diff_is_none_exactly_when_equal(a in list_shape(), b in list_shape()) {
        let (x, y) = (a.build(), b.build());
        let equal = equals(&x, &y, &structural()).unwrap();
        let diff = diff(&x, &y, &structural()).unwrap();
        prop_assert_eq!(diff.is_none(), equal);
    }

    #[test]
    fn chains_diff_agrees_with_equals(a in chain(), b in chain()) {
        let x = stubs::level_chain(&a).unwrap();
        let y = stubs::level_chain(&b).unwrap();
        let equal = equals(&x, &y, &structural()).unwrap();
        prop_assert_eq!(equal, a == b);
        prop_assert_eq!(diff(&x, &y, &structural()).unwrap().is_none(), equal);
    }

    #[test]
    fn copy_makes_equal(a in list_shape(), b in list_shape()) {
        let (source, target) = (a.build(), b.build());
        copy(&source, &target, &structural()).unwrap();
        prop_assert!(equals(&source, &target, &structural()).unwrap());
        prop_assert!(diff(&source, &target, &structural()).unwrap().is_none());
    }

    #[test]
    fn copied_chains_are_equal(a in chain(), b in chain()) {
        let source = stubs::level_chain(&a).unwrap();
        let target = stubs::level_chain(&b).unwrap();
        copy(&source, &target, &structural()).unwrap();
        prop_assert!(equals(&source, &target, &structural()).unwrap());
    }
}
