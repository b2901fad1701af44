//! Application lifecycle callbacks.
//!
//! Hooks fire synchronously on the thread that caused the event: read, write
//! and execute hooks on the transport thread handling the request,
//! registration hooks on the caller of [`Client::register`] and friends.
//!
//! [`Client::register`]: crate::Client::register

use std::{fmt, sync::Arc};

use lwm2m_proto::{ObjectPath, Value};
use parking_lot::RwLock;

use crate::error::ClientError;

/// Called once the client's routes are live.
pub type StartupHook = Arc<dyn Fn() + Send + Sync>;
/// Called after a successful read or execute on a resource.
pub type ResourceHook = Arc<dyn Fn(ObjectPath) + Send + Sync>;
/// Called after a successful write with the decoded value.
pub type WriteHook = Arc<dyn Fn(ObjectPath, &Value) + Send + Sync>;
/// Called with the assigned location after registration.
pub type RegisteredHook = Arc<dyn Fn(&str) + Send + Sync>;
/// Called after deregistration.
pub type DeregisteredHook = Arc<dyn Fn() + Send + Sync>;
/// Called with every error a client operation returns.
pub type ErrorHook = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// Registered callbacks. Unset hooks are skipped.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Startup hook.
    pub startup: Option<StartupHook>,
    /// Read hook.
    pub read: Option<ResourceHook>,
    /// Write hook.
    pub write: Option<WriteHook>,
    /// Execute hook.
    pub execute: Option<ResourceHook>,
    /// Registration hook.
    pub registered: Option<RegisteredHook>,
    /// Deregistration hook.
    pub deregistered: Option<DeregisteredHook>,
    /// Error hook.
    pub error: Option<ErrorHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("startup", &self.startup.is_some())
            .field("read", &self.read.is_some())
            .field("write", &self.write.is_some())
            .field("execute", &self.execute.is_some())
            .field("registered", &self.registered.is_some())
            .field("deregistered", &self.deregistered.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

/// Hooks shared between the client and its dispatcher.
///
/// Each emit clones the callback out of the lock before calling it, so a
/// hook may itself install or replace hooks.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedHooks(Arc<RwLock<Hooks>>);

impl SharedHooks {
    pub(crate) fn update(&self, f: impl FnOnce(&mut Hooks)) {
        f(&mut self.0.write());
    }

    pub(crate) fn emit_startup(&self) {
        let hook = self.0.read().startup.clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub(crate) fn emit_read(&self, path: ObjectPath) {
        let hook = self.0.read().read.clone();
        if let Some(hook) = hook {
            hook(path);
        }
    }

    pub(crate) fn emit_write(&self, path: ObjectPath, value: &Value) {
        let hook = self.0.read().write.clone();
        if let Some(hook) = hook {
            hook(path, value);
        }
    }

    pub(crate) fn emit_execute(&self, path: ObjectPath) {
        let hook = self.0.read().execute.clone();
        if let Some(hook) = hook {
            hook(path);
        }
    }

    pub(crate) fn emit_registered(&self, location: &str) {
        let hook = self.0.read().registered.clone();
        if let Some(hook) = hook {
            hook(location);
        }
    }

    pub(crate) fn emit_deregistered(&self) {
        let hook = self.0.read().deregistered.clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub(crate) fn emit_error(&self, err: &ClientError) {
        let hook = self.0.read().error.clone();
        if let Some(hook) = hook {
            hook(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use lwm2m_proto::ObjectType;

    use super::*;

    #[test]
    fn unset_hooks_are_skipped() {
        let hooks = SharedHooks::default();
        hooks.emit_startup();
        hooks.emit_read(ObjectPath::object(ObjectType::DEVICE));
        hooks.emit_error(&ClientError::NoRegistry);
    }

    #[test]
    fn hook_may_replace_itself() {
        let hooks = SharedHooks::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let inner = hooks.clone();
        let counter = Arc::clone(&calls);
        hooks.update(|h| {
            h.startup = Some(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                inner.update(|h| h.startup = None);
            }));
        });

        hooks.emit_startup();
        hooks.emit_startup();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
