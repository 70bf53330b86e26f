//! Provisioner registry.
//!
//! Maps [`ProvisionerIdentity`] to a live provisioner. Registration happens
//! once at startup; afterwards the registry serves concurrent lookups from
//! any number of orchestrator tasks. Only fully constructed `Arc`s are ever
//! inserted, so a lookup can never observe a partially built provisioner.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::claim::VolumeClaim;
use crate::error::{ProvisionerError, ProvisionerResult, RegistryError};
use crate::identity::ProvisionerIdentity;
use crate::provisioner::VolumeProvisioner;
use crate::session::ClaimSession;

type Entries = FxHashMap<ProvisionerIdentity, Arc<dyn VolumeProvisioner>>;

/// Thread-safe lookup table of provisioners.
#[derive(Default)]
pub struct ProvisionerRegistry {
    entries: RwLock<Entries>,
    operation_timeout: Option<Duration>,
}

impl ProvisionerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound capability operations of sessions created by [`bind`](Self::bind)
    /// and [`bind_first`](Self::bind_first).
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Register a provisioner under its own `(label, name)`.
    pub fn register(
        &self,
        provisioner: Arc<dyn VolumeProvisioner>,
    ) -> Result<ProvisionerIdentity, RegistryError> {
        let identity = provisioner
            .identity()
            .map_err(|err| RegistryError::InvalidIdentity(err.to_string()))?;
        let capabilities = provisioner.capabilities();

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&identity) {
            return Err(RegistryError::AlreadyRegistered(identity));
        }
        entries.insert(identity.clone(), provisioner);

        info!(provisioner = %identity, %capabilities, "provisioner registered");
        Ok(identity)
    }

    /// Look up a provisioner by identity.
    pub fn get(&self, identity: &ProvisionerIdentity) -> Option<Arc<dyn VolumeProvisioner>> {
        self.read().get(identity).cloned()
    }

    /// Look up a provisioner by identity, failing when absent.
    pub fn resolve(
        &self,
        identity: &ProvisionerIdentity,
    ) -> Result<Arc<dyn VolumeProvisioner>, RegistryError> {
        self.get(identity)
            .ok_or_else(|| RegistryError::NotRegistered(identity.clone()))
    }

    /// Look up a provisioner by name alone.
    ///
    /// When several labels share the name, the alphabetically first label wins.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn VolumeProvisioner>> {
        self.read()
            .iter()
            .filter(|(id, _)| id.name() == name)
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, p)| p.clone())
    }

    /// All provisioners under `label`, ordered by name.
    pub fn with_label(&self, label: &str) -> Vec<Arc<dyn VolumeProvisioner>> {
        let entries = self.read();
        let mut matches: Vec<_> = entries
            .iter()
            .filter(|(id, _)| id.label() == label)
            .collect();
        matches.sort_by(|(a, _), (b, _)| a.cmp(b));
        matches.into_iter().map(|(_, p)| p.clone()).collect()
    }

    /// Every registered identity, sorted.
    pub fn identities(&self) -> Vec<ProvisionerIdentity> {
        let mut ids: Vec<_> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered provisioners.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Resolve `identity` and bind `claim` to it.
    ///
    /// `Ok(None)` means the provisioner exists but its profile does not apply
    /// to the claim.
    pub fn bind(
        &self,
        identity: &ProvisionerIdentity,
        claim: &VolumeClaim,
    ) -> ProvisionerResult<Option<ClaimSession>> {
        let provisioner = self.resolve(identity)?;
        Ok(ClaimSession::bind(provisioner, claim)?.map(|s| self.scoped(s)))
    }

    /// Bind `claim` to the first provisioner under `label` that accepts it.
    ///
    /// Provisioners are tried in name order. A not-applicable profile moves on
    /// to the next one; an operational failure stops the search and is
    /// returned unchanged.
    pub fn bind_first(&self, label: &str, claim: &VolumeClaim) -> ProvisionerResult<ClaimSession> {
        for provisioner in self.with_label(label) {
            if let Some(session) = ClaimSession::bind(provisioner, claim)? {
                debug!(provisioner = %session.identity(), claim = %claim.name, "claim bound");
                return Ok(self.scoped(session));
            }
        }

        warn!(label, claim = %claim.name, "no provisioner accepted claim");
        Err(ProvisionerError::NoProvisionerAvailable {
            label: label.to_string(),
            claim: claim.name.clone(),
        })
    }

    fn scoped(&self, session: ClaimSession) -> ClaimSession {
        match self.operation_timeout {
            Some(timeout) => session.with_timeout(timeout),
            None => session,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ProvisionerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionerRegistry")
            .field("identities", &self.identities())
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}
