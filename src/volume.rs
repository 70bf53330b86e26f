//! Provisioned volume types.
//!
//! The volume lifecycle as observed through the contract:
//!
//! ```text
//!   add()/provision() ──→ Bound ──── delete() ───→ Deleted
//! ```
//!
//! `Available` and `Released` are reported only by backends that track
//! pre-provisioned storage or claim release; the in-memory provisioner
//! never produces them.
//!
//! A [`Volume`] is a snapshot: once returned to a caller it is never updated
//! in place. Operations that change a volume return a new record.

use std::fmt;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::identity::ProvisionerIdentity;

/// Unique identifier for a volume, assigned by its provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(pub String);

impl VolumeId {
    /// Create a new volume ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VolumeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Observable phase of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumePhase {
    /// Created but not yet bound to a claim.
    Available,
    /// Bound to the claim that requested it.
    Bound,
    /// Claim is gone; storage not yet reclaimed.
    Released,
    /// Storage has been reclaimed.
    Deleted,
}

impl VolumePhase {
    /// Check if the volume still occupies backend storage.
    pub fn is_live(&self) -> bool {
        !matches!(self, VolumePhase::Deleted)
    }
}

impl fmt::Display for VolumePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumePhase::Available => write!(f, "Available"),
            VolumePhase::Bound => write!(f, "Bound"),
            VolumePhase::Released => write!(f, "Released"),
            VolumePhase::Deleted => write!(f, "Deleted"),
        }
    }
}

/// Observable state of a provisioned volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Provisioner-assigned identifier.
    pub id: VolumeId,
    /// Name of the claim this volume was created for.
    pub claim: String,
    /// Size in GiB.
    pub size: u64,
    /// Storage class backing this volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    /// Provisioner that owns the volume.
    pub provisioner: ProvisionerIdentity,
    /// Current phase.
    pub phase: VolumePhase,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Deletion timestamp, set once the phase is `Deleted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Backing attributes reported by the provisioner.
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub attributes: FxHashMap<String, String>,
}

impl Volume {
    /// Create a bound volume record stamped with the current time.
    pub fn new(
        id: impl Into<VolumeId>,
        claim: impl Into<String>,
        size: u64,
        provisioner: ProvisionerIdentity,
    ) -> Self {
        Self {
            id: id.into(),
            claim: claim.into(),
            size,
            storage_class: None,
            provisioner,
            phase: VolumePhase::Bound,
            created_at: Utc::now(),
            deleted_at: None,
            attributes: FxHashMap::default(),
        }
    }

    /// Set the storage class.
    pub fn with_storage_class(mut self, class: impl Into<String>) -> Self {
        self.storage_class = Some(class.into());
        self
    }

    /// Attach a backing attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Record of this volume after its storage has been reclaimed.
    pub fn into_deleted(mut self) -> Self {
        self.phase = VolumePhase::Deleted;
        self.deleted_at = Some(Utc::now());
        self
    }
}

/// Ordered collection of volumes, in the producer's reporting order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeList {
    items: Vec<Volume>,
}

impl VolumeList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a volume.
    pub fn push(&mut self, volume: Volume) {
        self.items.push(volume);
    }

    /// Iterate over the volumes.
    pub fn iter(&self) -> std::slice::Iter<'_, Volume> {
        self.items.iter()
    }

    /// Identifiers of all volumes, in list order.
    pub fn ids(&self) -> Vec<&VolumeId> {
        self.items.iter().map(|v| &v.id).collect()
    }

    /// Check whether a volume with this identifier is present.
    pub fn contains(&self, id: &VolumeId) -> bool {
        self.items.iter().any(|v| &v.id == id)
    }

    /// Find a volume by identifier.
    pub fn get(&self, id: &VolumeId) -> Option<&Volume> {
        self.items.iter().find(|v| &v.id == id)
    }

    /// Get the number of volumes.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take the underlying vector.
    pub fn into_vec(self) -> Vec<Volume> {
        self.items
    }
}

impl From<Vec<Volume>> for VolumeList {
    fn from(items: Vec<Volume>) -> Self {
        Self { items }
    }
}

impl From<Volume> for VolumeList {
    fn from(volume: Volume) -> Self {
        Self {
            items: vec![volume],
        }
    }
}

impl FromIterator<Volume> for VolumeList {
    fn from_iter<I: IntoIterator<Item = Volume>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for VolumeList {
    type Item = Volume;
    type IntoIter = std::vec::IntoIter<Volume>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a VolumeList {
    type Item = &'a Volume;
    type IntoIter = std::slice::Iter<'a, Volume>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
