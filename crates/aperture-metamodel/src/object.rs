//! Traits implemented by domain types, and the object-safe view of them.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::TypeDescriptor;

/// Static metadata of a domain type.
pub trait Introspect {
    fn describe() -> TypeDescriptor;
}

/// Member dispatch for a domain type.
///
/// Members are addressed by the names used in the type's descriptor.
/// Errors returned here are action-body failures and reach the caller
/// unchanged.
pub trait Invocable {
    fn invoke(&mut self, action: &str, args: &ActionArgs) -> anyhow::Result<Value>;

    fn read_property(&self, property: &str) -> anyhow::Result<Value> {
        bail!("no readable property {property}")
    }

    fn write_property(&mut self, property: &str, value: Value) -> anyhow::Result<()> {
        let _ = value;
        bail!("no writable property {property}")
    }
}

/// Object-safe view of any `Introspect + Invocable` type.
pub trait DomainObject: Any + Send {
    /// Identity of the concrete type; the registry cache key.
    fn object_type_id(&self) -> TypeId;

    fn rust_type_name(&self) -> &'static str;

    fn descriptor(&self) -> TypeDescriptor;

    fn dispatch(&mut self, action: &str, args: &ActionArgs) -> anyhow::Result<Value>;

    fn get_property(&self, property: &str) -> anyhow::Result<Value>;

    fn set_property(&mut self, property: &str, value: Value) -> anyhow::Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> DomainObject for T
where
    T: Introspect + Invocable + Send + 'static,
{
    fn object_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn rust_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn descriptor(&self) -> TypeDescriptor {
        T::describe()
    }

    fn dispatch(&mut self, action: &str, args: &ActionArgs) -> anyhow::Result<Value> {
        self.invoke(action, args)
    }

    fn get_property(&self, property: &str) -> anyhow::Result<Value> {
        self.read_property(property)
    }

    fn set_property(&mut self, property: &str, value: Value) -> anyhow::Result<()> {
        self.write_property(property, value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn DomainObject {
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

/// Named action arguments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionArgs(BTreeMap<String, Value>);

impl ActionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns a required string argument.
    pub fn str(&self, name: &str) -> anyhow::Result<&str> {
        match self.0.get(name) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => bail!("argument {name} must be a string, got {other}"),
            None => bail!("missing argument {name}"),
        }
    }

    /// Returns a required numeric argument.
    pub fn f64(&self, name: &str) -> anyhow::Result<f64> {
        match self.0.get(name).and_then(Value::as_f64) {
            Some(n) => Ok(n),
            None => bail!("missing or non-numeric argument {name}"),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ActionArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
