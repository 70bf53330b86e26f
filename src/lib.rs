//! Volume Provisioner Contract
//!
//! This crate lets an orchestration server manage persistent volumes across
//! heterogeneous storage backends through one contract. Any backend (cloud
//! block storage, a local volume manager, an in-memory test double)
//! implements the [`VolumeProvisioner`] trait, and callers discover at runtime
//! which operations it supports.
//!
//! # Overview
//!
//! The contract defines:
//! - A [`VolumeProvisioner`] trait: identity, profile binding, capability accessors
//! - Capability traits [`Reader`], [`Adder`], [`Deleter`] and their legacy tiers
//!   [`Informer`], [`Provisioner`]
//! - [`CapabilityHandle`] to report whether a capability is supported
//! - [`VolumeClaim`] / [`Profile`] for requests and their claim-scoped configuration
//! - [`Volume`] / [`VolumeList`] for results
//! - [`ProvisionerError`] / [`RegistryError`] for failures
//!
//! [`ClaimSession`] drives the protocol and [`ProvisionerRegistry`] maps
//! identities to live provisioners. [`InMemoryProvisioner`] is a complete
//! reference backend.
//!
//! # Driving a provisioner
//!
//! ```ignore
//! use volume_provisioner::{ProvisionerRegistry, VolumeClaim};
//!
//! let claim = VolumeClaim::new("data", 10).with_storage_class("fast");
//! let session = registry.bind_first("memory", &claim)?;
//! let volumes = match session.add().await {
//!     Ok(volumes) => volumes,
//!     Err(err) => match err.partial_volumes() {
//!         Some(created) => created.clone(),
//!         None => return Err(err),
//!     },
//! };
//! ```
//!
//! # Lifecycle
//!
//! ```text
//!   registry.resolve() ──→ profile(claim) ──→ accessor() ──→ read() / add() / delete()
//!      (identity)          (applicable?)      (supported?)    (async)
//! ```

pub mod capability;
pub mod claim;
pub mod config;
pub mod error;
pub mod identity;
pub mod memory;
pub mod profile;
pub mod provisioner;
pub mod registry;
pub mod session;
pub mod version;
pub mod volume;

pub use capability::{
    Adder, CapabilityHandle, CapabilityKind, CapabilitySet, Deleter, Informer, Provisioner, Reader,
};
pub use claim::VolumeClaim;
pub use config::{ConfigError, ServerConfig};
pub use error::{ProvisionerError, ProvisionerResult, RegistryError};
pub use identity::ProvisionerIdentity;
pub use memory::InMemoryProvisioner;
pub use profile::Profile;
pub use provisioner::VolumeProvisioner;
pub use registry::ProvisionerRegistry;
pub use session::ClaimSession;
pub use version::VersionInfo;
pub use volume::{Volume, VolumeId, VolumeList, VolumePhase};
