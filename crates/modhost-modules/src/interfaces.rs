use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::contract::{HostCapabilities, ModuleHost, ModuleInstance};
use crate::error::{Error, Result};

type SharedInterface = Arc<dyn Any + Send + Sync>;

struct InterfaceEntry {
    owner: String,
    value: SharedInterface,
}

/// Named interfaces published by running modules for each other.
#[derive(Default)]
pub struct InterfaceRegistry {
    entries: RwLock<HashMap<String, InterfaceEntry>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `value` under `identity`. The owner may replace its own registration.
    pub fn register<T>(&self, owner: &str, identity: &str, value: Arc<T>) -> Result<()>
    where
        T: Any + Send + Sync,
    {
        if identity.trim().is_empty() {
            return Err(Error::config("interface identity is empty"));
        }
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(identity)
            && existing.owner != owner
        {
            return Err(Error::conflict("interface", identity));
        }
        entries.insert(
            identity.to_string(),
            InterfaceEntry {
                owner: owner.to_string(),
                value,
            },
        );
        debug!(module = owner, identity, "interface registered");
        Ok(())
    }

    pub fn get_optional<T>(&self, identity: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self.entries.read().get(identity)?.value.clone();
        value.downcast::<T>().ok()
    }

    pub fn get_required<T>(&self, identity: &str) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get_optional(identity)
            .ok_or_else(|| Error::not_found("interface", identity))
    }

    pub fn owner_of(&self, identity: &str) -> Option<String> {
        self.entries
            .read()
            .get(identity)
            .map(|entry| entry.owner.clone())
    }

    pub fn identities(&self) -> Vec<String> {
        let mut out: Vec<String> = self.entries.read().keys().cloned().collect();
        out.sort();
        out
    }

    /// Drop every interface `owner` published. Returns how many were removed.
    pub fn remove_owner(&self, owner: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.owner != owner);
        before - entries.len()
    }
}

/// Default host: hands modules the interface registry and forgets their interfaces on unload.
#[derive(Default)]
pub struct SharedSystem {
    interfaces: InterfaceRegistry,
}

impl SharedSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostCapabilities for SharedSystem {
    fn interfaces(&self) -> &InterfaceRegistry {
        &self.interfaces
    }
}

impl ModuleHost for SharedSystem {
    fn on_module_unload(&self, name: &str, _instance: &dyn ModuleInstance) -> anyhow::Result<()> {
        let removed = self.interfaces.remove_owner(name);
        if removed > 0 {
            info!(module = name, removed, "unregistered module interfaces");
        }
        Ok(())
    }
}
