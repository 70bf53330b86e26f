//! Volume claims.
//!
//! A [`VolumeClaim`] is what the orchestrator asks for. The contract treats it
//! as an immutable value: every profile binding and capability call receives
//! it by reference, and only provisioners interpret its contents.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Request descriptor for one or more persistent volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeClaim {
    /// Caller-supplied claim name. Not required to be unique.
    pub name: String,
    /// Requested size of each volume, in GiB.
    pub size: u64,
    /// Storage class requested by the caller, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    /// Number of volumes to create for this claim.
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    /// Backend-specific attributes, opaque to the contract.
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub attributes: FxHashMap<String, String>,
}

fn default_replicas() -> u32 {
    1
}

impl VolumeClaim {
    /// Create a claim for a single volume of `size` GiB.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            storage_class: None,
            replicas: default_replicas(),
            attributes: FxHashMap::default(),
        }
    }

    /// Request a specific storage class.
    pub fn with_storage_class(mut self, class: impl Into<String>) -> Self {
        self.storage_class = Some(class.into());
        self
    }

    /// Request `replicas` volumes instead of one.
    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    /// Attach a backend-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up a backend-specific attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
