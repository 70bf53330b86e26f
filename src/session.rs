//! Claim-scoped negotiation.
//!
//! A [`ClaimSession`] pairs a provisioner with the profile it bound for one
//! claim. It is the only way this crate drives capability operations, which
//! makes the protocol order structural: a session cannot exist before its
//! profile has been bound, and every operation negotiates its capability
//! before touching it.
//!
//! ```text
//!   bind(provisioner, claim) ──→ Some(session) ──→ session.read() / add() / ...
//!            │                                         │
//!            └──→ None (not applicable)                ├──→ Unsupported
//!                                                      ├──→ Timeout
//!                                                      └──→ backend result, unchanged
//! ```
//!
//! Sessions never retry. Retry policy belongs to the orchestrator, applied
//! around the whole bind-negotiate-invoke sequence. Dropping an operation's
//! future cancels it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::capability::{CapabilityHandle, CapabilityKind};
use crate::claim::VolumeClaim;
use crate::error::{ProvisionerError, ProvisionerResult};
use crate::identity::ProvisionerIdentity;
use crate::profile::Profile;
use crate::provisioner::VolumeProvisioner;
use crate::volume::{Volume, VolumeList};

/// A provisioner bound to one claim's profile.
pub struct ClaimSession {
    provisioner: Arc<dyn VolumeProvisioner>,
    identity: ProvisionerIdentity,
    profile: Profile,
    timeout: Option<Duration>,
}

impl ClaimSession {
    /// Bind `claim` to `provisioner`.
    ///
    /// Returns `Ok(None)` when the provisioner's profile does not apply to the
    /// claim. The caller should try another provisioner; this is not a
    /// failure of this one.
    pub fn bind(
        provisioner: Arc<dyn VolumeProvisioner>,
        claim: &VolumeClaim,
    ) -> ProvisionerResult<Option<Self>> {
        let identity = provisioner.identity()?;

        let Some(profile) = provisioner.profile(claim)? else {
            debug!(provisioner = %identity, claim = %claim.name, "profile not applicable");
            return Ok(None);
        };

        if profile.provisioner() != &identity {
            return Err(ProvisionerError::ProfileMismatch {
                expected: identity,
                found: profile.provisioner().clone(),
            });
        }

        debug!(provisioner = %identity, claim = %claim.name, "profile bound");
        Ok(Some(Self {
            provisioner,
            identity,
            profile,
            timeout: None,
        }))
    }

    /// Bound every capability operation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Deadline applied to each capability operation, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Identity of the bound provisioner.
    pub fn identity(&self) -> &ProvisionerIdentity {
        &self.identity
    }

    /// The claim-scoped profile.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// The claim this session serves.
    pub fn claim(&self) -> &VolumeClaim {
        self.profile.claim()
    }

    /// Check whether the bound provisioner supports `kind`.
    pub fn supports(&self, kind: CapabilityKind) -> bool {
        self.provisioner.supports(kind)
    }

    /// Volumes matching the claim, through the [`Reader`](crate::Reader) capability.
    pub async fn read(&self) -> ProvisionerResult<VolumeList> {
        let reader = self.negotiate(self.provisioner.reader(), CapabilityKind::Reader)?;
        self.invoke(CapabilityKind::Reader, reader.read(&self.profile))
            .await
    }

    /// Create the claim's volumes, through the [`Adder`](crate::Adder) capability.
    ///
    /// On partial success the error carries the created volumes; see
    /// [`ProvisionerError::partial_volumes`].
    pub async fn add(&self) -> ProvisionerResult<VolumeList> {
        let adder = self.negotiate(self.provisioner.adder(), CapabilityKind::Adder)?;
        self.invoke(CapabilityKind::Adder, adder.add(&self.profile))
            .await
    }

    /// Delete `volume`, through the [`Deleter`](crate::Deleter) capability.
    pub async fn delete(&self, volume: &Volume) -> ProvisionerResult<Volume> {
        let deleter = self.negotiate(self.provisioner.deleter(), CapabilityKind::Deleter)?;
        self.invoke(CapabilityKind::Deleter, deleter.delete(&self.profile, volume))
            .await
    }

    /// Single-volume information, through the legacy [`Informer`](crate::Informer) capability.
    pub async fn info(&self) -> ProvisionerResult<Volume> {
        let informer = self.negotiate(self.provisioner.informer(), CapabilityKind::Informer)?;
        self.invoke(CapabilityKind::Informer, informer.info(&self.profile))
            .await
    }

    /// Single-volume creation, through the legacy [`Provisioner`](crate::Provisioner) capability.
    pub async fn provision(&self) -> ProvisionerResult<Volume> {
        let provisioner =
            self.negotiate(self.provisioner.provisioner(), CapabilityKind::Provisioner)?;
        self.invoke(CapabilityKind::Provisioner, provisioner.provision(&self.profile))
            .await
    }

    /// Read through whichever tier the backend offers.
    ///
    /// Prefers [`Reader`](crate::Reader). Falls back to the legacy
    /// [`Informer`](crate::Informer), whose "not found" becomes an empty list.
    pub async fn lookup(&self) -> ProvisionerResult<VolumeList> {
        if self.supports(CapabilityKind::Reader) || !self.supports(CapabilityKind::Informer) {
            return self.read().await;
        }
        match self.info().await {
            Ok(volume) => Ok(VolumeList::from(volume)),
            Err(ProvisionerError::VolumeNotFound(_)) => Ok(VolumeList::new()),
            Err(err) => Err(err),
        }
    }

    /// Create through whichever tier the backend offers.
    ///
    /// Prefers [`Adder`](crate::Adder), falling back to the legacy
    /// [`Provisioner`](crate::Provisioner).
    pub async fn create(&self) -> ProvisionerResult<VolumeList> {
        if self.supports(CapabilityKind::Adder) || !self.supports(CapabilityKind::Provisioner) {
            return self.add().await;
        }
        self.provision().await.map(VolumeList::from)
    }

    fn negotiate<'a, T: ?Sized + 'a>(
        &self,
        handle: CapabilityHandle<'a, T>,
        kind: CapabilityKind,
    ) -> ProvisionerResult<&'a T> {
        handle.supported().ok_or_else(|| {
            debug!(provisioner = %self.identity, capability = %kind, "capability unsupported");
            ProvisionerError::Unsupported {
                provisioner: self.identity.clone(),
                capability: kind,
            }
        })
    }

    async fn invoke<T>(
        &self,
        kind: CapabilityKind,
        operation: impl Future<Output = ProvisionerResult<T>>,
    ) -> ProvisionerResult<T> {
        let result = match self.timeout {
            Some(after) => tokio::time::timeout(after, operation)
                .await
                .unwrap_or_else(|_| {
                    Err(ProvisionerError::Timeout {
                        operation: kind,
                        after,
                    })
                }),
            None => operation.await,
        };

        if let Err(err) = &result {
            warn!(
                provisioner = %self.identity,
                claim = %self.profile.claim().name,
                operation = %kind,
                error = %err,
                "capability operation failed"
            );
        }
        result
    }
}

impl std::fmt::Debug for ClaimSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimSession")
            .field("identity", &self.identity)
            .field("profile", &self.profile)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use crate::memory::InMemoryProvisioner;

    fn memory(capabilities: CapabilitySet) -> Arc<InMemoryProvisioner> {
        Arc::new(
            InMemoryProvisioner::new(ProvisionerIdentity::new("memory", "local").unwrap())
                .with_capabilities(capabilities),
        )
    }

    fn bind(provisioner: Arc<InMemoryProvisioner>, claim: &VolumeClaim) -> ClaimSession {
        ClaimSession::bind(provisioner, claim).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_capability_is_reported() {
        let session = bind(
            memory(CapabilitySet::empty().with(CapabilityKind::Reader)),
            &VolumeClaim::new("data", 10),
        );

        match session.add().await {
            Err(ProvisionerError::Unsupported { capability, .. }) => {
                assert_eq!(capability, CapabilityKind::Adder)
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
        assert!(session.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_applicable_binds_nothing() {
        let p = Arc::new(
            InMemoryProvisioner::new(ProvisionerIdentity::new("memory", "local").unwrap())
                .with_storage_classes(["fast"]),
        );
        let claim = VolumeClaim::new("data", 10).with_storage_class("slow");
        assert!(ClaimSession::bind(p, &claim).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_claim_is_an_error() {
        let err = ClaimSession::bind(memory(CapabilitySet::all()), &VolumeClaim::new("", 10))
            .unwrap_err();
        assert!(matches!(err, ProvisionerError::InvalidClaim(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let p = Arc::new(
            InMemoryProvisioner::new(ProvisionerIdentity::new("memory", "slow").unwrap())
                .with_latency(Duration::from_secs(10)),
        );
        let session = bind(p, &VolumeClaim::new("data", 10)).with_timeout(Duration::from_secs(1));

        let err = session.add().await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(
            err,
            ProvisionerError::Timeout {
                operation: CapabilityKind::Adder,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_backend_error_propagates_unchanged() {
        let p = memory(CapabilitySet::all());
        let session = bind(p.clone(), &VolumeClaim::new("data", 10));
        p.set_online(false);

        let err = session.read().await.unwrap_err();
        assert!(matches!(err, ProvisionerError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_legacy_tier_fallback() {
        let legacy = CapabilitySet::empty()
            .with(CapabilityKind::Informer)
            .with(CapabilityKind::Provisioner);
        let session = bind(memory(legacy), &VolumeClaim::new("data", 10));

        assert!(session.lookup().await.unwrap().is_empty());
        let created = session.create().await.unwrap();
        assert_eq!(created.len(), 1);

        let found = session.lookup().await.unwrap();
        assert_eq!(found.ids(), created.ids());
        assert!(matches!(
            session.read().await,
            Err(ProvisionerError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_prefers_reader() {
        let claim = VolumeClaim::new("data", 10).with_replicas(2);
        let session = bind(memory(CapabilitySet::all()), &claim);
        session.add().await.unwrap();
        assert_eq!(session.lookup().await.unwrap().len(), 2);
    }

    #[test]
    fn test_profile_mismatch() {
        struct Impostor(InMemoryProvisioner);

        impl VolumeProvisioner for Impostor {
            fn label(&self) -> &str {
                "memory"
            }
            fn name(&self) -> &str {
                "impostor"
            }
            fn profile(&self, claim: &VolumeClaim) -> ProvisionerResult<Option<Profile>> {
                self.0.profile(claim)
            }
            fn provisioner(&self) -> CapabilityHandle<'_, dyn crate::Provisioner> {
                self.0.provisioner()
            }
            fn deleter(&self) -> CapabilityHandle<'_, dyn crate::Deleter> {
                self.0.deleter()
            }
            fn informer(&self) -> CapabilityHandle<'_, dyn crate::Informer> {
                self.0.informer()
            }
            fn reader(&self) -> CapabilityHandle<'_, dyn crate::Reader> {
                self.0.reader()
            }
            fn adder(&self) -> CapabilityHandle<'_, dyn crate::Adder> {
                self.0.adder()
            }
        }

        let inner = InMemoryProvisioner::new(ProvisionerIdentity::new("memory", "local").unwrap());
        let err = ClaimSession::bind(Arc::new(Impostor(inner)), &VolumeClaim::new("data", 1))
            .unwrap_err();
        assert!(matches!(err, ProvisionerError::ProfileMismatch { .. }));
    }
}
