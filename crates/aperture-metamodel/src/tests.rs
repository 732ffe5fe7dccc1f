//! Unit tests for aperture-metamodel

use std::sync::Arc;
use std::thread;

use anyhow::bail;
use proptest::prelude::*;
use serde_json::{Value, json};

use crate::{
    ActionArgs, DomainObject, Introspect, Invocable, MemberDescriptor, MetamodelError, Nature,
    SemanticsOf, SpecRegistry, TypeDescriptor,
};

// ============================================================================
// Fixtures
// ============================================================================

struct Invoice {
    total: f64,
}

impl Introspect for Invoice {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new("Invoice")
            .domain_object(Nature::Entity)
            .member(MemberDescriptor::property("getTotal"))
            .member(MemberDescriptor::action("void").semantics(SemanticsOf::Idempotent))
    }
}

impl Invocable for Invoice {
    fn invoke(&mut self, action: &str, _args: &ActionArgs) -> anyhow::Result<Value> {
        match action {
            "void" => {
                self.total = 0.0;
                Ok(Value::Null)
            }
            other => bail!("unknown action {other}"),
        }
    }

    fn read_property(&self, property: &str) -> anyhow::Result<Value> {
        match property {
            "total" => Ok(json!(self.total)),
            other => bail!("no readable property {other}"),
        }
    }
}

struct Scratch;

impl Introspect for Scratch {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new("Scratch").member(MemberDescriptor::action("run"))
    }
}

impl Invocable for Scratch {
    fn invoke(&mut self, _action: &str, _args: &ActionArgs) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }
}

// ============================================================================
// Registry Tests
// ============================================================================

#[test]
fn load_is_idempotent() {
    let registry = SpecRegistry::new();
    let first = registry.load::<Invoice>().unwrap();
    let second = registry.load::<Invoice>().unwrap();

    assert_eq!(first, second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
}

#[test]
fn load_object_shares_cache_with_load() {
    let registry = SpecRegistry::new();
    let object: Box<dyn DomainObject> = Box::new(Invoice { total: 12.5 });

    let by_object = registry.load_object(object.as_ref()).unwrap();
    let by_type = registry.load::<Invoice>().unwrap();

    assert!(Arc::ptr_eq(&by_object, &by_type));
    assert_eq!(by_type.action("void").map(|a| a.semantics), Some(SemanticsOf::Idempotent));
}

#[test]
fn non_domain_type_is_rejected_and_not_cached() {
    let registry = SpecRegistry::new();

    assert!(!registry.is_domain_object::<Scratch>());
    assert!(registry.is_domain_object::<Invoice>());

    let err = registry.load::<Scratch>().unwrap_err();
    assert!(matches!(err, MetamodelError::NotADomainObject { type_name } if type_name == "Scratch"));
    assert!(registry.is_empty());
}

#[test]
fn all_specs_lists_built_specs() {
    let registry = SpecRegistry::new();
    assert!(registry.all_specs().unwrap().is_empty());

    registry.load::<Invoice>().unwrap();
    let all = registry.all_specs().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title(), "Invoice");
}

#[test]
fn concurrent_first_loads_agree() {
    let registry = Arc::new(SpecRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.load::<Invoice>().unwrap())
        })
        .collect();

    let specs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(registry.len(), 1);
    for spec in &specs {
        assert!(Arc::ptr_eq(spec, &specs[0]));
        assert_eq!(spec.properties().len(), 1);
        assert_eq!(spec.actions().len(), 1);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn member_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z][a-zA-Z]{1,10}", 0..12)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    /// Property: building twice from the same descriptor yields equal specs
    #[test]
    fn prop_build_is_deterministic(names in member_names()) {
        let mut descriptor = TypeDescriptor::new("Generated").domain_object(Nature::ViewModel);
        for (i, name) in names.iter().enumerate() {
            let member = match i % 3 {
                0 => MemberDescriptor::property(name.clone()),
                1 => MemberDescriptor::collection(name.clone()),
                _ => MemberDescriptor::action(name.clone()),
            };
            descriptor = descriptor.member(member);
        }

        let a = crate::ObjectSpec::build(&descriptor).unwrap();
        let b = crate::ObjectSpec::build(&descriptor).unwrap();
        prop_assert_eq!(&a, &b);

        // Every member lands in exactly one list
        let exposed = a.properties().len() + a.collections().len() + a.actions().len();
        prop_assert_eq!(exposed, names.len());
    }
}
