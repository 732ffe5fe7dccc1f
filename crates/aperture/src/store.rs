//! Id-keyed holder of domain objects.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use aperture_metamodel::DomainObject;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;

/// Shared handle to a stored object.
///
/// The mutex serializes invocations against one object; different objects
/// have independent locks.
pub type ObjectHandle = Arc<Mutex<Box<dyn DomainObject>>>;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage consumed by the invocation pipeline.
pub trait ObjectStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<ObjectHandle>>;

    /// Stores `object` under a freshly generated id and returns the id.
    fn put(&self, object: Box<dyn DomainObject>) -> Result<String>;

    /// Objects whose concrete type is `type_id`, ordered by id.
    fn all_of_type(&self, type_id: TypeId) -> Result<Vec<(String, ObjectHandle)>>;

    /// Every stored object, ordered by id.
    fn all(&self) -> Result<Vec<(String, ObjectHandle)>>;
}

struct Entry {
    type_id: TypeId,
    handle: ObjectHandle,
}

/// In-process [`ObjectStore`].
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Entry>>,
    prefix_with_type: bool,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("objects", &self.len())
            .field("prefix_with_type", &self.prefix_with_type)
            .finish()
    }
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            prefix_with_type: true,
        }
    }

    /// Whether ids look like `Customer_<uuid>` (default) or bare `<uuid>`.
    pub fn with_type_prefix(mut self, enabled: bool) -> Self {
        self.prefix_with_type = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.objects.read().map_or(0, |o| o.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn generate_id(&self, object_type: &str) -> String {
        let uuid = Uuid::new_v4().simple();
        if self.prefix_with_type {
            format!("{object_type}_{uuid}")
        } else {
            uuid.to_string()
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Internal("lock poisoned".to_string())
}

impl ObjectStore for InMemoryObjectStore {
    fn get(&self, id: &str) -> Result<Option<ObjectHandle>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects.get(id).map(|e| Arc::clone(&e.handle)))
    }

    fn put(&self, object: Box<dyn DomainObject>) -> Result<String> {
        let descriptor = object.descriptor();
        let Some(attrs) = descriptor.domain_object_attrs() else {
            return Err(StoreError::NotADomainObject {
                type_name: descriptor.type_name().to_string(),
            });
        };
        let object_type = attrs
            .object_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(descriptor.type_name());

        let id = self.generate_id(object_type);
        let entry = Entry {
            type_id: object.object_type_id(),
            handle: Arc::new(Mutex::new(object)),
        };
        self.objects
            .write()
            .map_err(|_| poisoned())?
            .insert(id.clone(), entry);

        debug!(id = %id, object_type = %object_type, "Object stored");
        Ok(id)
    }

    fn all_of_type(&self, type_id: TypeId) -> Result<Vec<(String, ObjectHandle)>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects
            .iter()
            .filter(|(_, e)| e.type_id == type_id)
            .map(|(id, e)| (id.clone(), Arc::clone(&e.handle)))
            .collect())
    }

    fn all(&self) -> Result<Vec<(String, ObjectHandle)>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects
            .iter()
            .map(|(id, e)| (id.clone(), Arc::clone(&e.handle)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aperture_metamodel::{ActionArgs, Introspect, Invocable, Nature, TypeDescriptor};
    use serde_json::Value;

    struct Note;

    impl Introspect for Note {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::new("NoteEntity").object_type("Note")
        }
    }

    impl Invocable for Note {
        fn invoke(&mut self, _action: &str, _args: &ActionArgs) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    struct Tag;

    impl Introspect for Tag {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::new("Tag").domain_object(Nature::ViewModel)
        }
    }

    impl Invocable for Tag {
        fn invoke(&mut self, _action: &str, _args: &ActionArgs) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    struct Loose;

    impl Introspect for Loose {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::new("Loose")
        }
    }

    impl Invocable for Loose {
        fn invoke(&mut self, _action: &str, _args: &ActionArgs) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_ids_use_object_type_prefix() {
        let store = InMemoryObjectStore::new();
        let id = store.put(Box::new(Note)).unwrap();
        assert!(id.starts_with("Note_"));
        assert_eq!(id.len(), "Note_".len() + 32);
        assert!(store.get(&id).unwrap().is_some());
        assert!(store.get("Note_missing").unwrap().is_none());
    }

    #[test]
    fn test_ids_without_prefix() {
        let store = InMemoryObjectStore::new().with_type_prefix(false);
        let id = store.put(Box::new(Tag)).unwrap();
        assert_eq!(id.len(), 32);
    }

    #[test]
    fn test_ids_are_unique() {
        let store = InMemoryObjectStore::new();
        let a = store.put(Box::new(Tag)).unwrap();
        let b = store.put(Box::new(Tag)).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_rejects_non_domain_object() {
        let store = InMemoryObjectStore::new();
        assert_eq!(
            store.put(Box::new(Loose)),
            Err(StoreError::NotADomainObject {
                type_name: "Loose".to_string()
            })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_all_of_type_filters() {
        let store = InMemoryObjectStore::new();
        store.put(Box::new(Note)).unwrap();
        store.put(Box::new(Tag)).unwrap();
        store.put(Box::new(Tag)).unwrap();

        assert_eq!(store.all_of_type(TypeId::of::<Tag>()).unwrap().len(), 2);
        assert_eq!(store.all_of_type(TypeId::of::<Note>()).unwrap().len(), 1);
        assert_eq!(store.all().unwrap().len(), 3);
    }
}
