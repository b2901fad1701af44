//! Client facade.
//!
//! The `Client` ties the pieces together: it owns the [`Transport`], shares
//! the [`ObjectTable`] with a [`Dispatcher`] installed on the transport's
//! routes, and drives the [`RegistrationSession`].
//!
//! # Architecture
//!
//! ```text
//! Client<T: Transport>
//!   ├─ table: Arc<RwLock<ObjectTable>>  ◀── shared ──┐
//!   ├─ hooks: SharedHooks               ◀── shared ──┤
//!   ├─ session: RegistrationSession                  │
//!   └─ transport: T                                  │
//!        └─ routes ─▶ handler closures ─▶ Dispatcher ┘
//! ```

use std::sync::Arc;

use lwm2m_proto::{InstanceId, Method, ObjectPath, ObjectType, Registry, Request, Value};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use tracing::{info, warn};

use crate::{
    config::ClientConfig,
    dispatch::{Dispatcher, Operation},
    enabler::{NullEnabler, ObjectEnabler, SharedEnabler},
    error::ClientError,
    hooks::SharedHooks,
    object::Object,
    registration::{RegistrationSession, RegistrationState},
    table::ObjectTable,
    transport::{Handler, RoutePattern, Transport},
};

/// Routes the client installs on its transport.
const ROUTES: [(Method, &str, Operation); 8] = [
    (Method::Get, "/{object}/{instance}/{resource}", Operation::Read),
    (Method::Get, "/{object}/{instance}", Operation::Read),
    (Method::Get, "/{object}", Operation::Read),
    (Method::Put, "/{object}/{instance}/{resource}", Operation::Write),
    (Method::Put, "/{object}/{instance}", Operation::Write),
    (Method::Delete, "/{object}/{instance}", Operation::Delete),
    (Method::Post, "/{object}/{instance}/{resource}", Operation::Execute),
    (Method::Post, "/{object}/{instance}", Operation::Create),
];

/// LWM2M client.
///
/// Construction enables every mandatory object type of the registry with a
/// [`NullEnabler`]; the application then replaces enablers, enables further
/// objects and provisions instances before calling [`start`](Self::start)
/// and [`register`](Self::register).
pub struct Client<T: Transport> {
    transport: T,
    table: Arc<RwLock<ObjectTable>>,
    hooks: SharedHooks,
    session: RegistrationSession,
    config: ClientConfig,
    started: bool,
}

impl<T: Transport> Client<T> {
    /// Create a client over `transport` using `registry` for definitions.
    pub fn new(transport: T, registry: Arc<dyn Registry>, config: ClientConfig) -> Self {
        let mut table = ObjectTable::with_registry(Arc::clone(&registry));
        for object_type in registry.mandatory_types() {
            if let Err(e) = table.enable(object_type, Some(Arc::new(NullEnabler))) {
                warn!(%object_type, error = %e, "could not enable mandatory object");
            }
        }

        Self {
            transport,
            table: Arc::new(RwLock::new(table)),
            hooks: SharedHooks::default(),
            session: RegistrationSession::new(),
            config,
            started: false,
        }
    }

    /// Enable `object_type` with `enabler`.
    pub fn enable_object(
        &self,
        object_type: ObjectType,
        enabler: impl ObjectEnabler + 'static,
    ) -> Result<(), ClientError> {
        self.enable_object_with(object_type, Some(Arc::new(enabler)))
    }

    /// Enable `object_type` with a shared enabler, or none yet.
    pub fn enable_object_with(
        &self,
        object_type: ObjectType,
        enabler: Option<SharedEnabler>,
    ) -> Result<(), ClientError> {
        let result = self.table.write().enable(object_type, enabler);
        self.report(result)
    }

    /// Replace the enabler of an enabled object.
    pub fn set_enabler(
        &self,
        object_type: ObjectType,
        enabler: impl ObjectEnabler + 'static,
    ) -> Result<(), ClientError> {
        self.set_shared_enabler(object_type, Arc::new(enabler))
    }

    /// Replace the enabler of an enabled object with a shared one.
    pub fn set_shared_enabler(
        &self,
        object_type: ObjectType,
        enabler: SharedEnabler,
    ) -> Result<(), ClientError> {
        let result = self.table.write().set_enabler(object_type, enabler);
        self.report(result)
    }

    /// Record a provisioned instance.
    pub fn add_object_instance(
        &self,
        object_type: ObjectType,
        instance: InstanceId,
    ) -> Result<(), ClientError> {
        let result = self.table.write().add_instance(object_type, instance);
        self.report(result)
    }

    /// Record several provisioned instances.
    pub fn add_object_instances(
        &self,
        object_type: ObjectType,
        instances: &[InstanceId],
    ) -> Result<(), ClientError> {
        let result = self.table.write().add_instances(object_type, instances);
        self.report(result)
    }

    /// Look up an enabled object.
    ///
    /// The returned guard holds the table's read lock; drop it before
    /// reconfiguring the client.
    pub fn object(&self, object_type: ObjectType) -> Option<MappedRwLockReadGuard<'_, Object>> {
        RwLockReadGuard::try_map(self.table.read(), |table| table.get(object_type)).ok()
    }

    /// Read access to the whole table.
    pub fn table(&self) -> RwLockReadGuard<'_, ObjectTable> {
        self.table.read()
    }

    /// Enabled object types in ascending order.
    pub fn objects(&self) -> Vec<ObjectType> {
        self.table.read().objects().map(Object::object_type).collect()
    }

    /// Registry used for enables.
    pub fn registry(&self) -> Option<Arc<dyn Registry>> {
        self.table.read().registry().cloned()
    }

    /// Swap the registry used for subsequent enables.
    pub fn use_registry(&self, registry: Arc<dyn Registry>) {
        self.table.write().set_registry(registry);
    }

    /// Dispatcher sharing this client's table and hooks.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::with_hooks(Arc::clone(&self.table), self.hooks.clone())
    }

    /// Install the operation routes and start the transport.
    pub fn start(&mut self) -> Result<(), ClientError> {
        let result = self.install_routes();
        if result.is_ok() {
            info!(routes = ROUTES.len(), "client started");
            self.hooks.emit_startup();
        }
        self.report(result)
    }

    fn install_routes(&mut self) -> Result<(), ClientError> {
        if self.started {
            return Err(ClientError::AlreadyStarted);
        }
        let dispatcher = self.dispatcher();
        for (method, pattern, operation) in ROUTES {
            let pattern = RoutePattern::parse(pattern)?;
            let dispatcher = dispatcher.clone();
            let handler: Handler = Arc::new(move |req: &Request| dispatcher.dispatch(operation, req));
            self.transport.register_route(method, pattern, handler)?;
        }
        self.transport.start()?;
        self.started = true;
        Ok(())
    }

    /// Register with the server as `endpoint`. Returns the assigned location.
    pub fn register(&mut self, endpoint: &str) -> Result<String, ClientError> {
        let links = self.table.read().links();
        let result = self.session.register(endpoint, &links, &self.config, &self.transport);
        if let Ok(location) = &result {
            self.hooks.emit_registered(location);
        }
        self.report(result)
    }

    /// Refresh the registration, re-advertising the current object list.
    pub fn update(&mut self) -> Result<(), ClientError> {
        let links = self.table.read().links();
        let result = self.session.update(Some(&links), &self.config, &self.transport);
        self.report(result)
    }

    /// Deregister from the server.
    pub fn deregister(&mut self) -> Result<(), ClientError> {
        let was_registered = self.session.state() == RegistrationState::Registered;
        let result = self.session.deregister(&self.transport);
        if was_registered {
            self.hooks.emit_deregistered();
        }
        self.report(result)
    }

    /// Registration state.
    pub fn state(&self) -> RegistrationState {
        self.session.state()
    }

    /// Server-assigned location while registered.
    pub fn location(&self) -> Option<&str> {
        self.session.location()
    }

    /// Registration parameters.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Call `f` once the routes are live.
    pub fn on_startup(&self, f: impl Fn() + Send + Sync + 'static) {
        self.hooks.update(|h| h.startup = Some(Arc::new(f)));
    }

    /// Call `f` after each successful read.
    pub fn on_read(&self, f: impl Fn(ObjectPath) + Send + Sync + 'static) {
        self.hooks.update(|h| h.read = Some(Arc::new(f)));
    }

    /// Call `f` after each successful write.
    pub fn on_write(&self, f: impl Fn(ObjectPath, &Value) + Send + Sync + 'static) {
        self.hooks.update(|h| h.write = Some(Arc::new(f)));
    }

    /// Call `f` after each successful execute.
    pub fn on_execute(&self, f: impl Fn(ObjectPath) + Send + Sync + 'static) {
        self.hooks.update(|h| h.execute = Some(Arc::new(f)));
    }

    /// Call `f` with the location after registering.
    pub fn on_registered(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.hooks.update(|h| h.registered = Some(Arc::new(f)));
    }

    /// Call `f` after deregistering.
    pub fn on_deregistered(&self, f: impl Fn() + Send + Sync + 'static) {
        self.hooks.update(|h| h.deregistered = Some(Arc::new(f)));
    }

    /// Call `f` with every error a client operation returns.
    pub fn on_error(&self, f: impl Fn(&ClientError) + Send + Sync + 'static) {
        self.hooks.update(|h| h.error = Some(Arc::new(f)));
    }

    fn report<V>(&self, result: Result<V, ClientError>) -> Result<V, ClientError> {
        if let Err(e) = &result {
            self.hooks.emit_error(e);
        }
        result
    }
}
