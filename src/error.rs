//! Provisioner and registry error types.
//!
//! Errors are categorized by recoverability:
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | **Transient** | `BackendUnavailable`, `Timeout` | Retry the whole negotiate-then-invoke sequence |
//! | **Claim** | `InvalidClaim`, `CapacityExhausted` | Fix the claim or pick another backend |
//! | **Negotiation** | `Unsupported`, `NoProvisionerAvailable`, `ProfileMismatch` | Choose another provisioner |
//! | **Volume** | `VolumeNotFound`, `PartialAdd` | Inspect the returned volumes |
//! | **Config** | `InvalidIdentity`, `Backend` | Fix configuration |
//! | **Usage** | `Registry` | Fix the caller |
//!
//! "Not applicable" (a provisioner whose profile rejects a claim) and
//! "unsupported capability" are not errors at the contract level: they are
//! reported as `Ok(None)` and [`CapabilityHandle::Unsupported`] respectively.
//! [`ProvisionerError::Unsupported`] is only produced when a caller drives an
//! operation through a [`ClaimSession`] that the backend cannot perform.
//!
//! Registry usage errors live in their own type, [`RegistryError`], so that
//! "nothing registered under that identity" is never confused with a backend
//! fault. Helpers that resolve and bind in one step wrap it in
//! [`ProvisionerError::Registry`].
//!
//! [`CapabilityHandle::Unsupported`]: crate::capability::CapabilityHandle::Unsupported
//! [`ClaimSession`]: crate::session::ClaimSession

use std::time::Duration;

use thiserror::Error;

use crate::capability::CapabilityKind;
use crate::identity::ProvisionerIdentity;
use crate::volume::VolumeList;

/// Errors that can occur while driving a volume provisioner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProvisionerError {
    // ── Transient errors ─────────────────────────────────────────────
    /// Backend cannot be reached right now.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// Capability operation did not finish within the caller's deadline.
    #[error("{operation} operation timed out after {after:?}")]
    Timeout {
        operation: CapabilityKind,
        after: Duration,
    },

    // ── Claim errors ─────────────────────────────────────────────────
    /// Claim data the backend cannot interpret at all.
    #[error("Invalid claim: {0}")]
    InvalidClaim(String),

    /// Backend has no room left for new volumes.
    #[error("Capacity exhausted: {0}")]
    CapacityExhausted(String),

    // ── Negotiation errors ───────────────────────────────────────────
    /// The requested capability is not implemented by this provisioner.
    #[error("Provisioner {provisioner} does not support {capability}")]
    Unsupported {
        provisioner: ProvisionerIdentity,
        capability: CapabilityKind,
    },

    /// No provisioner under the label accepted the claim's profile.
    #[error("No provisioner available for claim {claim} under label {label}")]
    NoProvisionerAvailable { label: String, claim: String },

    /// A provisioner returned a profile bound to a different identity.
    #[error("Profile bound to {found} was returned by {expected}")]
    ProfileMismatch {
        expected: ProvisionerIdentity,
        found: ProvisionerIdentity,
    },

    // ── Volume errors ────────────────────────────────────────────────
    /// Volume not found.
    #[error("Volume not found: {0}")]
    VolumeNotFound(String),

    /// Some, but not all, requested volumes were created.
    #[error("Partially added {} volume(s): {reason}", .volumes.len())]
    PartialAdd { volumes: VolumeList, reason: String },

    // ── Config errors ────────────────────────────────────────────────
    /// Label or name is empty or malformed.
    #[error("Invalid provisioner identity: {0}")]
    InvalidIdentity(String),

    /// Generic backend error.
    #[error("Backend error: {0}")]
    Backend(String),

    // ── Usage errors ─────────────────────────────────────────────────
    /// Registry lookup or registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ProvisionerError {
    /// Returns `true` if this error is transient and the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::Timeout { .. })
    }

    /// Volumes that were created before an add operation fell short.
    ///
    /// Callers of `add` must check this before treating the error as a full
    /// failure.
    pub fn partial_volumes(&self) -> Option<&VolumeList> {
        match self {
            Self::PartialAdd { volumes, .. } => Some(volumes),
            _ => None,
        }
    }
}

/// Result type for provisioner operations.
pub type ProvisionerResult<T> = Result<T, ProvisionerError>;

/// Errors raised by the provisioner registry.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// Nothing is registered under this identity.
    #[error("No provisioner registered as {0}")]
    NotRegistered(ProvisionerIdentity),

    /// Another provisioner already owns this identity.
    #[error("Provisioner {0} is already registered")]
    AlreadyRegistered(ProvisionerIdentity),

    /// The provisioner reported an empty label or name.
    #[error("Invalid provisioner identity: {0}")]
    InvalidIdentity(String),
}
