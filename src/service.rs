use crate::error::Error;
use crate::handler::RequestHandler;

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The service locator the dispatcher resolves handler targets and
/// handler dependencies from.
///
/// Values are stored by type, request handlers by string id. Registration
/// happens at application setup; serving only reads, so the locks are
/// uncontended during dispatch.
#[derive(Default)]
pub struct Services {
    values: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    handlers: RwLock<HashMap<String, Arc<dyn RequestHandler>>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value under its type, replacing any previous value of the
    /// same type.
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
        write(&self.values).insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Look up a value by type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        read(&self.values)
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Look up a value by type, treating absence as a configuration error.
    pub fn expect<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.get::<T>().ok_or_else(|| {
            Error::config(format!("service '{}' is not registered", type_name::<T>()))
        })
    }

    /// Register a request handler under a string id.
    pub fn register_handler(&self, id: impl Into<String>, handler: impl RequestHandler + 'static) {
        write(&self.handlers).insert(id.into(), Arc::new(handler));
    }

    /// Look up a request handler by id.
    pub fn handler(&self, id: &str) -> Option<Arc<dyn RequestHandler>> {
        read(&self.handlers).get(id).cloned()
    }
}

// Poisoning can only happen if a writer panicked during setup; recover the
// inner map rather than propagating the panic to every request.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|err| err.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|err| err.into_inner())
}
