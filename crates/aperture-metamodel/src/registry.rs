//! Spec registry: one cached [`ObjectSpec`] per type.

use std::any::TypeId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::descriptor::TypeDescriptor;
use crate::error::{MetamodelError, Result};
use crate::object::{DomainObject, Introspect};
use crate::spec::ObjectSpec;

/// Caches specifications by concrete type.
///
/// Lookups take the read lock. A miss takes the write lock and builds under
/// it, so each type is built at most once and no caller ever sees a partial
/// spec.
#[derive(Debug, Default)]
pub struct SpecRegistry {
    specs: RwLock<HashMap<TypeId, Arc<ObjectSpec>>>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the specification of `T`, building it on first request.
    pub fn load<T: Introspect + 'static>(&self) -> Result<Arc<ObjectSpec>> {
        self.load_with(TypeId::of::<T>(), T::describe)
    }

    /// Returns the specification of the concrete type behind `object`.
    pub fn load_object(&self, object: &dyn DomainObject) -> Result<Arc<ObjectSpec>> {
        self.load_with(object.object_type_id(), || object.descriptor())
    }

    fn load_with(&self, key: TypeId, describe: impl FnOnce() -> TypeDescriptor) -> Result<Arc<ObjectSpec>> {
        {
            let specs = self.specs.read().map_err(|_| poisoned())?;
            if let Some(spec) = specs.get(&key) {
                return Ok(Arc::clone(spec));
            }
        }

        let mut specs = self.specs.write().map_err(|_| poisoned())?;
        match specs.entry(key) {
            Entry::Occupied(e) => Ok(Arc::clone(e.get())),
            Entry::Vacant(e) => {
                let spec = Arc::new(ObjectSpec::build(&describe())?);
                debug!(object_type = %spec.object_type(), "Specification built");
                Ok(Arc::clone(e.insert(spec)))
            }
        }
    }

    /// Whether `T` carries the domain-object marker. Does not build.
    pub fn is_domain_object<T: Introspect>(&self) -> bool {
        T::describe().is_domain_object()
    }

    /// Every specification built so far, ordered by object type.
    pub fn all_specs(&self) -> Result<Vec<Arc<ObjectSpec>>> {
        let specs = self.specs.read().map_err(|_| poisoned())?;
        let mut all: Vec<Arc<ObjectSpec>> = specs.values().cloned().collect();
        all.sort_by(|a, b| a.object_type().cmp(b.object_type()));
        Ok(all)
    }

    pub fn len(&self) -> usize {
        self.specs.read().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> MetamodelError {
    MetamodelError::Internal("lock poisoned".to_string())
}
