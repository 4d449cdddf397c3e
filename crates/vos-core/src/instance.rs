//! Upstream VOS instances and the registry that holds them.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VosError};

/// Identity of a configured VOS instance.
///
/// # Example
///
/// ```
/// use vos_core::InstanceId;
///
/// let id = InstanceId::new(7);
/// assert_eq!(id.get(), 7);
/// assert_eq!(id.to_string(), "7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u32);

impl InstanceId {
    /// Creates a new instance identity.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the numeric identity.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for InstanceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

fn default_enabled() -> bool {
    true
}

/// A configured upstream telephony-switch instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VosInstance {
    pub id: InstanceId,
    pub name: String,
    /// Base address of the management API, e.g. `http://10.0.0.5:8080`.
    pub base_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl VosInstance {
    pub fn new(id: impl Into<InstanceId>, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            description: None,
            enabled: true,
        }
    }

    /// Builder-style toggle for the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Registry of configured instances.
///
/// Instances are kept ordered by identity so that listings and fan-out
/// dispatch order are stable.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: RwLock<BTreeMap<InstanceId, VosInstance>>,
}

impl InstanceRegistry {
    /// Creates a registry from a list of instances.
    ///
    /// # Errors
    ///
    /// Returns `VosError::InvalidRequest` if two instances share an identity
    /// or an instance has an empty base URL.
    pub fn new(instances: impl IntoIterator<Item = VosInstance>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for instance in instances {
            if instance.base_url.trim().is_empty() {
                return Err(VosError::invalid(format!(
                    "instance {} has an empty base_url",
                    instance.id
                )));
            }
            let id = instance.id;
            if map.insert(id, instance).is_some() {
                return Err(VosError::invalid(format!("duplicate instance id {}", id)));
            }
        }
        Ok(Self {
            instances: RwLock::new(map),
        })
    }

    /// Returns the instance with the given identity.
    pub fn get(&self, id: InstanceId) -> Option<VosInstance> {
        self.instances.read().get(&id).cloned()
    }

    /// Returns the instance or `InstanceNotFound`.
    pub fn require(&self, id: InstanceId) -> Result<VosInstance> {
        self.get(id).ok_or(VosError::InstanceNotFound(id))
    }

    /// Returns the instance if it exists and is enabled.
    pub fn require_enabled(&self, id: InstanceId) -> Result<VosInstance> {
        let instance = self.require(id)?;
        if !instance.enabled {
            return Err(VosError::InstanceDisabled(id));
        }
        Ok(instance)
    }

    /// All instances, ordered by identity.
    pub fn all(&self) -> Vec<VosInstance> {
        self.instances.read().values().cloned().collect()
    }

    /// Enabled instances only, ordered by identity.
    pub fn enabled(&self) -> Vec<VosInstance> {
        self.instances
            .read()
            .values()
            .filter(|i| i.enabled)
            .cloned()
            .collect()
    }

    /// Flips the enabled flag of an instance at runtime.
    pub fn set_enabled(&self, id: InstanceId, enabled: bool) -> Result<()> {
        let mut instances = self.instances.write();
        let instance = instances
            .get_mut(&id)
            .ok_or(VosError::InstanceNotFound(id))?;
        instance.enabled = enabled;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}
