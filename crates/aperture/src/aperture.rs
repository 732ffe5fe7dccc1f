//! Top-level facade wiring realm, registry, store, bus, and pipeline.

use std::path::Path;
use std::sync::Arc;

use aperture_config::{ApertureConfig, ConfigLoader, SecurityConfig};
use aperture_metamodel::{ActionArgs, DomainObject, SpecRegistry};
use aperture_rbac::{RealmError, SecurityRealm, Session};
use serde_json::Value;
use tracing::info;

use crate::error::{EventError, Result, SetupError};
use crate::events::{EventBus, EventListener};
use crate::guard::Guard;
use crate::pipeline::ActionPipeline;
use crate::store::{InMemoryObjectStore, ObjectStore};

/// An assembled Aperture instance.
///
/// # Examples
///
/// ```
/// use aperture::Aperture;
/// use aperture_config::ApertureConfig;
///
/// let aperture = Aperture::from_config(&ApertureConfig::default())?;
/// let session = aperture.session();
/// assert!(!session.is_authenticated());
/// # Ok::<(), aperture::SetupError>(())
/// ```
#[derive(Debug)]
pub struct Aperture {
    realm: Arc<SecurityRealm>,
    registry: Arc<SpecRegistry>,
    store: Arc<InMemoryObjectStore>,
    bus: Arc<EventBus>,
    pipeline: ActionPipeline,
}

impl Default for Aperture {
    fn default() -> Self {
        Self::new()
    }
}

impl Aperture {
    /// An instance with an empty realm and default settings.
    pub fn new() -> Self {
        Self::assemble(Arc::new(SecurityRealm::new()), &ApertureConfig::default())
    }

    /// Builds an instance from configuration, creating the declared roles,
    /// permissions, and principals.
    pub fn from_config(config: &ApertureConfig) -> std::result::Result<Self, SetupError> {
        config.validate()?;
        let realm = build_realm(&config.security)?;
        Ok(Self::assemble(realm, config))
    }

    /// Loads layered configuration rooted at `project_dir` and builds from it.
    pub fn from_project_dir(project_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config = ConfigLoader::new().with_project_dir(project_dir).load()?;
        Ok(Self::from_config(&config)?)
    }

    fn assemble(realm: Arc<SecurityRealm>, config: &ApertureConfig) -> Self {
        let registry = Arc::new(SpecRegistry::new());
        let store = Arc::new(
            InMemoryObjectStore::new().with_type_prefix(config.store.id_prefix_with_type),
        );
        let bus = Arc::new(EventBus::with_buffer(config.events.broadcast_buffer));
        let guard = Guard::new().with_audit(config.security.audit);
        let pipeline = ActionPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&bus),
            guard,
        );

        Self {
            realm,
            registry,
            store,
            bus,
            pipeline,
        }
    }

    pub fn realm(&self) -> &Arc<SecurityRealm> {
        &self.realm
    }

    pub fn registry(&self) -> &Arc<SpecRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<InMemoryObjectStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn pipeline(&self) -> &ActionPipeline {
        &self.pipeline
    }

    /// Opens an unauthenticated session against this instance's realm.
    pub fn session(&self) -> Session {
        Session::new(Arc::clone(&self.realm))
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> std::result::Result<(), EventError> {
        self.bus.subscribe(listener)
    }

    pub fn persist(&self, object: Box<dyn DomainObject>) -> Result<String> {
        self.pipeline.persist(object)
    }

    pub fn invoke(&self, session: &Session, target_id: &str, action_id: &str, args: &ActionArgs) -> Result<Value> {
        self.pipeline.invoke(session, target_id, action_id, args)
    }
}

/// Creates a realm holding the roles, permissions, and principals declared
/// in `security`.
pub fn build_realm(security: &SecurityConfig) -> std::result::Result<Arc<SecurityRealm>, RealmError> {
    let realm = SecurityRealm::new();

    for role in &security.roles {
        realm.create_role(&role.name, &role.description)?;
        for permission in &role.permissions {
            realm.add_permission(
                &role.name,
                permission.feature.clone(),
                permission.rule,
                permission.mode,
            )?;
        }
    }

    for principal in &security.principals {
        realm.create_principal(&principal.username, &principal.name, &principal.email)?;
        realm.set_status(&principal.username, principal.status)?;
        for role in &principal.roles {
            realm.assign_role(&principal.username, role)?;
        }
    }

    let (roles, principals, permissions) = (
        realm.role_count()?,
        realm.principal_count()?,
        realm.permission_count()?,
    );
    info!(roles, principals, permissions, "Security realm initialized");
    Ok(Arc::new(realm))
}
