//! The volume provisioner contract.
//!
//! The [`VolumeProvisioner`] trait is what every storage backend implements.
//! Driving one takes two negotiation stages before any volume operation:
//!
//! ```text
//!   profile(claim) ──→ accessor() ──→ read() / add() / delete() / ...
//!   (applicable?)      (supported?)   (async, may fail)
//! ```
//!
//! The stages answer different questions. A backend may accept a claim's
//! profile yet lack a capability (deletion, say), or support every
//! capability yet not understand the claim.
//!
//! ## Method table
//!
//! | Method | Kind | Returns |
//! |--------|------|---------|
//! | `label()` | sync, pure | `&str` |
//! | `name()` | sync, pure | `&str` |
//! | `profile()` | sync | `ProvisionerResult<Option<Profile>>` |
//! | `provisioner()` | sync, pure | `CapabilityHandle<dyn Provisioner>` |
//! | `deleter()` | sync, pure | `CapabilityHandle<dyn Deleter>` |
//! | `informer()` | sync, pure | `CapabilityHandle<dyn Informer>` |
//! | `reader()` | sync, pure | `CapabilityHandle<dyn Reader>` |
//! | `adder()` | sync, pure | `CapabilityHandle<dyn Adder>` |
//! | `identity()` | provided | `ProvisionerIdentity` |
//! | `capabilities()` | provided | `CapabilitySet` |

use crate::capability::{
    Adder, CapabilityHandle, CapabilityKind, CapabilitySet, Deleter, Informer, Provisioner,
    Reader,
};
use crate::claim::VolumeClaim;
use crate::error::ProvisionerResult;
use crate::identity::ProvisionerIdentity;
use crate::profile::Profile;

/// Contract implemented by every persistent volume provisioner.
///
/// # Contract
///
/// - `label()` and `name()` MUST be non-empty and constant for the lifetime
///   of the instance.
/// - `profile()` MUST NOT mutate the instance. It returns `Ok(None)` when the
///   backend's profile system cannot represent the claim (the caller skips
///   this backend), `Ok(Some(_))` with a profile bound to this provisioner's
///   identity, or `Err(_)` for a genuine failure such as claim data the
///   backend cannot interpret at all. Identical claims MUST yield identical
///   outcomes.
/// - Capability accessors MUST be pure and MUST return
///   [`CapabilityHandle::Unsupported`] rather than fail when a capability is
///   not implemented.
pub trait VolumeProvisioner: Send + Sync {
    /// Category of this provisioner.
    fn label(&self) -> &str;

    /// Name of this provisioner within its category.
    fn name(&self) -> &str;

    /// Derive a claim-scoped profile.
    fn profile(&self, claim: &VolumeClaim) -> ProvisionerResult<Option<Profile>>;

    /// Single-volume creation (legacy tier of [`adder`](Self::adder)).
    fn provisioner(&self) -> CapabilityHandle<'_, dyn Provisioner>;

    /// Volume deletion.
    fn deleter(&self) -> CapabilityHandle<'_, dyn Deleter>;

    /// Single-volume information (legacy tier of [`reader`](Self::reader)).
    fn informer(&self) -> CapabilityHandle<'_, dyn Informer>;

    /// Volume information for a claim.
    fn reader(&self) -> CapabilityHandle<'_, dyn Reader>;

    /// Volume creation for a claim.
    fn adder(&self) -> CapabilityHandle<'_, dyn Adder>;

    /// The `(label, name)` pair this provisioner is registered under.
    fn identity(&self) -> ProvisionerResult<ProvisionerIdentity> {
        ProvisionerIdentity::new(self.label(), self.name())
    }

    /// Capabilities this provisioner reports as supported.
    fn capabilities(&self) -> CapabilitySet {
        CapabilityKind::ALL
            .into_iter()
            .filter(|kind| self.supports(*kind))
            .collect()
    }

    /// Ask the accessor for `kind` whether it is supported.
    fn supports(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Provisioner => self.provisioner().is_supported(),
            CapabilityKind::Deleter => self.deleter().is_supported(),
            CapabilityKind::Informer => self.informer().is_supported(),
            CapabilityKind::Reader => self.reader().is_supported(),
            CapabilityKind::Adder => self.adder().is_supported(),
        }
    }
}
