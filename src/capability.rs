//! Capability interfaces and negotiation handles.
//!
//! Each capability is an independent, minimal contract a provisioner may or
//! may not implement:
//!
//! | Capability | Tier | Operation |
//! |------------|------|-----------|
//! | [`Reader`] | current | `read(profile) -> VolumeList` |
//! | [`Adder`] | current | `add(profile) -> VolumeList` |
//! | [`Deleter`] | current | `delete(profile, volume) -> Volume` |
//! | [`Informer`] | legacy, superseded by `Reader` | `info(profile) -> Volume` |
//! | [`Provisioner`] | legacy, superseded by `Adder` | `provision(profile) -> Volume` |
//!
//! Legacy tiers remain separate traits so that older backends stay valid
//! without adapters. New backends should implement the current tier.
//!
//! A provisioner hands out capabilities through accessors returning a
//! [`CapabilityHandle`]. An unsupported handle carries no implementation,
//! so there is nothing a caller could invoke by mistake.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProvisionerResult;
use crate::profile::Profile;
use crate::volume::{Volume, VolumeList};

/// Fetches volume information for a claim.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Volumes matching the profile's claim.
    ///
    /// MUST NOT mutate backend state. An empty list means "no matching
    /// volumes" and is distinct from an error.
    async fn read(&self, profile: &Profile) -> ProvisionerResult<VolumeList>;
}

/// Creates volumes for a claim.
#[async_trait]
pub trait Adder: Send + Sync {
    /// Create the volumes the profile's claim asks for.
    ///
    /// If only some volumes could be created, returns
    /// [`ProvisionerError::PartialAdd`] carrying the ones that were. A full
    /// failure returns any other error and no volumes.
    ///
    /// [`ProvisionerError::PartialAdd`]: crate::error::ProvisionerError::PartialAdd
    async fn add(&self, profile: &Profile) -> ProvisionerResult<VolumeList>;
}

/// Removes previously provisioned volumes.
#[async_trait]
pub trait Deleter: Send + Sync {
    /// Delete `volume`, identified by its record rather than by claim.
    ///
    /// Returns the post-deletion record.
    async fn delete(&self, profile: &Profile, volume: &Volume) -> ProvisionerResult<Volume>;
}

/// Single-volume read. Superseded by [`Reader`].
#[async_trait]
pub trait Informer: Send + Sync {
    /// Fetch the volume backing the profile's claim.
    async fn info(&self, profile: &Profile) -> ProvisionerResult<Volume>;
}

/// Single-volume create. Superseded by [`Adder`].
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create one volume for the profile's claim.
    async fn provision(&self, profile: &Profile) -> ProvisionerResult<Volume>;
}

/// Result of asking a provisioner for a capability.
pub enum CapabilityHandle<'a, T: ?Sized + 'a> {
    /// The provisioner implements the capability.
    Supported(&'a T),
    /// The provisioner does not implement the capability.
    Unsupported,
}

impl<'a, T: ?Sized + 'a> CapabilityHandle<'a, T> {
    /// Check if the capability is supported.
    pub fn is_supported(&self) -> bool {
        matches!(self, CapabilityHandle::Supported(_))
    }

    /// The implementation, if supported.
    pub fn supported(self) -> Option<&'a T> {
        match self {
            CapabilityHandle::Supported(imp) => Some(imp),
            CapabilityHandle::Unsupported => None,
        }
    }
}

impl<T: ?Sized> Clone for CapabilityHandle<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for CapabilityHandle<'_, T> {}

impl<T: ?Sized> fmt::Debug for CapabilityHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityHandle::Supported(_) => write!(f, "Supported"),
            CapabilityHandle::Unsupported => write!(f, "Unsupported"),
        }
    }
}

impl<'a, T: ?Sized + 'a> From<Option<&'a T>> for CapabilityHandle<'a, T> {
    fn from(imp: Option<&'a T>) -> Self {
        match imp {
            Some(imp) => CapabilityHandle::Supported(imp),
            None => CapabilityHandle::Unsupported,
        }
    }
}

/// Names of the negotiable capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Provisioner,
    Deleter,
    Informer,
    Reader,
    Adder,
}

impl CapabilityKind {
    /// All capabilities, in accessor order.
    pub const ALL: [CapabilityKind; 5] = [
        CapabilityKind::Provisioner,
        CapabilityKind::Deleter,
        CapabilityKind::Informer,
        CapabilityKind::Reader,
        CapabilityKind::Adder,
    ];

    /// Check if this is a legacy tier.
    pub fn is_legacy(&self) -> bool {
        matches!(self, CapabilityKind::Provisioner | CapabilityKind::Informer)
    }

    fn bit(self) -> u8 {
        match self {
            CapabilityKind::Provisioner => 1 << 0,
            CapabilityKind::Deleter => 1 << 1,
            CapabilityKind::Informer => 1 << 2,
            CapabilityKind::Reader => 1 << 3,
            CapabilityKind::Adder => 1 << 4,
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::Provisioner => write!(f, "provisioner"),
            CapabilityKind::Deleter => write!(f, "deleter"),
            CapabilityKind::Informer => write!(f, "informer"),
            CapabilityKind::Reader => write!(f, "reader"),
            CapabilityKind::Adder => write!(f, "adder"),
        }
    }
}

/// A set of capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet {
    bits: u8,
}

impl CapabilitySet {
    /// No capabilities.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every capability, both tiers.
    pub fn all() -> Self {
        CapabilityKind::ALL.into_iter().collect()
    }

    /// The current tier only: read, add, delete.
    pub fn current() -> Self {
        [
            CapabilityKind::Reader,
            CapabilityKind::Adder,
            CapabilityKind::Deleter,
        ]
        .into_iter()
        .collect()
    }

    /// Add a capability to the set.
    pub fn with(mut self, kind: CapabilityKind) -> Self {
        self.bits |= kind.bit();
        self
    }

    /// Remove a capability from the set.
    pub fn without(mut self, kind: CapabilityKind) -> Self {
        self.bits &= !kind.bit();
        self
    }

    /// Check if a capability is in the set.
    pub fn contains(&self, kind: CapabilityKind) -> bool {
        self.bits & kind.bit() != 0
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Iterate over the capabilities in accessor order.
    pub fn iter(&self) -> impl Iterator<Item = CapabilityKind> + '_ {
        CapabilityKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
    }
}

impl FromIterator<CapabilityKind> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = CapabilityKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<String> = self.iter().map(|k| k.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    #[test]
    fn test_capability_handle() {
        let imp = Nothing;
        let supported: CapabilityHandle<'_, Nothing> = CapabilityHandle::Supported(&imp);
        let unsupported: CapabilityHandle<'_, Nothing> = CapabilityHandle::Unsupported;

        assert!(supported.is_supported());
        assert!(supported.supported().is_some());
        assert!(!unsupported.is_supported());
        assert!(unsupported.supported().is_none());
        assert_eq!(format!("{unsupported:?}"), "Unsupported");
        assert!(CapabilityHandle::<Nothing>::from(None).supported().is_none());
    }

    #[test]
    fn test_capability_set() {
        let set = CapabilitySet::empty()
            .with(CapabilityKind::Reader)
            .with(CapabilityKind::Adder);
        assert!(set.contains(CapabilityKind::Reader));
        assert!(!set.contains(CapabilityKind::Deleter));
        assert_eq!(set.to_string(), "reader,adder");
        assert_eq!(set.without(CapabilityKind::Adder).to_string(), "reader");
        assert_eq!(CapabilitySet::empty().to_string(), "none");
        assert_eq!(CapabilitySet::all().iter().count(), 5);
        assert!(!CapabilitySet::current().contains(CapabilityKind::Informer));
    }

    #[test]
    fn test_capability_kind_tiers() {
        assert!(CapabilityKind::Informer.is_legacy());
        assert!(CapabilityKind::Provisioner.is_legacy());
        assert!(!CapabilityKind::Reader.is_legacy());
        assert_eq!(
            serde_json::to_string(&CapabilityKind::Deleter).unwrap(),
            "\"deleter\""
        );
    }
}
