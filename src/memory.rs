//! In-memory reference provisioner.
//!
//! [`InMemoryProvisioner`] implements the whole contract against a process
//! local volume table. It backs the `volumed up` command and doubles as a
//! configurable test backend: the capability set, accepted storage classes,
//! capacity, latency and availability can all be tuned.
//!
//! Profile rules:
//!
//! - empty claim name, zero size, zero replicas or more than
//!   [`MAX_REPLICAS`] → `InvalidClaim`
//! - storage class outside the accepted list → not applicable (`Ok(None)`)
//! - anything else → a profile carrying `storage_class` and `replicas`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::capability::{
    Adder, CapabilityHandle, CapabilityKind, CapabilitySet, Deleter, Informer, Provisioner,
    Reader,
};
use crate::claim::VolumeClaim;
use crate::error::{ProvisionerError, ProvisionerResult};
use crate::identity::ProvisionerIdentity;
use crate::profile::Profile;
use crate::provisioner::VolumeProvisioner;
use crate::volume::{Volume, VolumeList};

/// Storage class used when neither the claim nor the provisioner names one.
pub const DEFAULT_STORAGE_CLASS: &str = "standard";

/// Most volumes a single claim may request.
pub const MAX_REPLICAS: u32 = 64;

const STORAGE_CLASS_SETTING: &str = "storage_class";
const REPLICAS_SETTING: &str = "replicas";

/// Provisioner keeping its volumes in process memory.
#[derive(Debug)]
pub struct InMemoryProvisioner {
    identity: ProvisionerIdentity,
    capabilities: CapabilitySet,
    storage_classes: Vec<String>,
    capacity: Option<usize>,
    latency: Option<Duration>,
    online: AtomicBool,
    volumes: Mutex<Vec<Volume>>,
    next_id: AtomicU64,
}

impl InMemoryProvisioner {
    /// Create a provisioner supporting every capability and storage class.
    pub fn new(identity: ProvisionerIdentity) -> Self {
        Self {
            identity,
            capabilities: CapabilitySet::all(),
            storage_classes: Vec::new(),
            capacity: None,
            latency: None,
            online: AtomicBool::new(true),
            volumes: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Restrict the capabilities this provisioner reports.
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Accept only claims for these storage classes.
    ///
    /// An empty list accepts every class. The first class is used for claims
    /// that do not name one.
    pub fn with_storage_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.storage_classes = classes.into_iter().map(Into::into).collect();
        self
    }

    /// Hold at most `capacity` live volumes.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Delay every capability operation by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Simulate the backend going offline or coming back.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of live volumes held.
    pub fn volume_count(&self) -> usize {
        self.volumes().len()
    }

    fn volumes(&self) -> MutexGuard<'_, Vec<Volume>> {
        self.volumes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn round_trip(&self) -> ProvisionerResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(ProvisionerError::BackendUnavailable(format!(
                "{} is offline",
                self.identity
            )));
        }
        Ok(())
    }

    fn check_profile(&self, profile: &Profile) -> ProvisionerResult<()> {
        if profile.provisioner() != &self.identity {
            return Err(ProvisionerError::ProfileMismatch {
                expected: self.identity.clone(),
                found: profile.provisioner().clone(),
            });
        }
        Ok(())
    }

    fn accepts(&self, class: &str) -> bool {
        self.storage_classes.is_empty() || self.storage_classes.iter().any(|c| c == class)
    }

    fn new_volume(&self, profile: &Profile) -> Volume {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let claim = profile.claim();
        let id = format!(
            "pv-{}-{}-{}-{seq:04}",
            self.identity.label(),
            self.identity.name(),
            claim.name
        );
        let class = profile
            .setting(STORAGE_CLASS_SETTING)
            .unwrap_or(DEFAULT_STORAGE_CLASS);

        Volume::new(id, claim.name.clone(), claim.size, self.identity.clone())
            .with_storage_class(class)
            .with_attribute("provisioned-by", self.identity.to_string())
    }

    /// Create up to `wanted` volumes for the profile's claim.
    fn create(&self, profile: &Profile, wanted: usize) -> ProvisionerResult<VolumeList> {
        let mut volumes = self.volumes();
        let room = self
            .capacity
            .map_or(usize::MAX, |cap| cap.saturating_sub(volumes.len()));
        let count = wanted.min(room);

        if count == 0 {
            return Err(ProvisionerError::CapacityExhausted(format!(
                "{} holds {} volume(s)",
                self.identity,
                volumes.len()
            )));
        }

        let created: VolumeList = (0..count).map(|_| self.new_volume(profile)).collect();
        volumes.extend(created.iter().cloned());
        info!(
            provisioner = %self.identity,
            claim = %profile.claim().name,
            count,
            "volumes created"
        );

        if count < wanted {
            return Err(ProvisionerError::PartialAdd {
                volumes: created,
                reason: format!("created {count} of {wanted} volume(s), capacity reached"),
            });
        }
        Ok(created)
    }

    fn replicas(profile: &Profile) -> usize {
        profile
            .setting(REPLICAS_SETTING)
            .and_then(|r| r.parse().ok())
            .unwrap_or(1)
    }
}

impl VolumeProvisioner for InMemoryProvisioner {
    fn label(&self) -> &str {
        self.identity.label()
    }

    fn name(&self) -> &str {
        self.identity.name()
    }

    fn profile(&self, claim: &VolumeClaim) -> ProvisionerResult<Option<Profile>> {
        if claim.name.trim().is_empty() {
            return Err(ProvisionerError::InvalidClaim("claim name is empty".into()));
        }
        if claim.size == 0 {
            return Err(ProvisionerError::InvalidClaim(format!(
                "claim {} requests zero size",
                claim.name
            )));
        }
        if claim.replicas == 0 {
            return Err(ProvisionerError::InvalidClaim(format!(
                "claim {} requests zero replicas",
                claim.name
            )));
        }
        if claim.replicas > MAX_REPLICAS {
            return Err(ProvisionerError::InvalidClaim(format!(
                "claim {} requests {} replicas, at most {MAX_REPLICAS} allowed",
                claim.name, claim.replicas
            )));
        }

        let class = match claim.storage_class.as_deref() {
            Some(class) if !self.accepts(class) => {
                debug!(
                    provisioner = %self.identity,
                    claim = %claim.name,
                    storage_class = class,
                    "storage class not served"
                );
                return Ok(None);
            }
            Some(class) => class,
            None => self
                .storage_classes
                .first()
                .map_or(DEFAULT_STORAGE_CLASS, String::as_str),
        };

        Ok(Some(
            Profile::new(self.identity.clone(), claim.clone())
                .with_setting(STORAGE_CLASS_SETTING, class)
                .with_setting(REPLICAS_SETTING, claim.replicas.to_string()),
        ))
    }

    fn provisioner(&self) -> CapabilityHandle<'_, dyn Provisioner> {
        if self.capabilities.contains(CapabilityKind::Provisioner) {
            CapabilityHandle::Supported(self)
        } else {
            CapabilityHandle::Unsupported
        }
    }

    fn deleter(&self) -> CapabilityHandle<'_, dyn Deleter> {
        if self.capabilities.contains(CapabilityKind::Deleter) {
            CapabilityHandle::Supported(self)
        } else {
            CapabilityHandle::Unsupported
        }
    }

    fn informer(&self) -> CapabilityHandle<'_, dyn Informer> {
        if self.capabilities.contains(CapabilityKind::Informer) {
            CapabilityHandle::Supported(self)
        } else {
            CapabilityHandle::Unsupported
        }
    }

    fn reader(&self) -> CapabilityHandle<'_, dyn Reader> {
        if self.capabilities.contains(CapabilityKind::Reader) {
            CapabilityHandle::Supported(self)
        } else {
            CapabilityHandle::Unsupported
        }
    }

    fn adder(&self) -> CapabilityHandle<'_, dyn Adder> {
        if self.capabilities.contains(CapabilityKind::Adder) {
            CapabilityHandle::Supported(self)
        } else {
            CapabilityHandle::Unsupported
        }
    }
}

#[async_trait]
impl Reader for InMemoryProvisioner {
    async fn read(&self, profile: &Profile) -> ProvisionerResult<VolumeList> {
        self.check_profile(profile)?;
        self.round_trip().await?;
        let claim = &profile.claim().name;
        Ok(self
            .volumes()
            .iter()
            .filter(|v| &v.claim == claim)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Adder for InMemoryProvisioner {
    async fn add(&self, profile: &Profile) -> ProvisionerResult<VolumeList> {
        self.check_profile(profile)?;
        self.round_trip().await?;
        self.create(profile, Self::replicas(profile))
    }
}

#[async_trait]
impl Deleter for InMemoryProvisioner {
    async fn delete(&self, profile: &Profile, volume: &Volume) -> ProvisionerResult<Volume> {
        self.check_profile(profile)?;
        self.round_trip().await?;

        if volume.provisioner != self.identity {
            return Err(ProvisionerError::VolumeNotFound(format!(
                "{} belongs to {}",
                volume.id, volume.provisioner
            )));
        }

        let mut volumes = self.volumes();
        let pos = volumes
            .iter()
            .position(|v| v.id == volume.id)
            .ok_or_else(|| ProvisionerError::VolumeNotFound(volume.id.to_string()))?;
        let deleted = volumes.remove(pos).into_deleted();
        info!(provisioner = %self.identity, volume = %deleted.id, "volume deleted");
        Ok(deleted)
    }
}

#[async_trait]
impl Informer for InMemoryProvisioner {
    async fn info(&self, profile: &Profile) -> ProvisionerResult<Volume> {
        self.check_profile(profile)?;
        self.round_trip().await?;
        let claim = &profile.claim().name;
        self.volumes()
            .iter()
            .find(|v| &v.claim == claim)
            .cloned()
            .ok_or_else(|| ProvisionerError::VolumeNotFound(format!("no volume for claim {claim}")))
    }
}

#[async_trait]
impl Provisioner for InMemoryProvisioner {
    async fn provision(&self, profile: &Profile) -> ProvisionerResult<Volume> {
        self.check_profile(profile)?;
        self.round_trip().await?;
        let created = self.create(profile, 1)?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| ProvisionerError::Backend("no volume created".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use super::*;
    use crate::session::ClaimSession;
    use crate::volume::VolumeId;

    fn identity() -> ProvisionerIdentity {
        ProvisionerIdentity::new("memory", "local").unwrap()
    }

    fn id_set(list: &VolumeList) -> BTreeSet<VolumeId> {
        list.iter().map(|v| v.id.clone()).collect()
    }

    fn bound(p: &Arc<InMemoryProvisioner>, claim: &VolumeClaim) -> ClaimSession {
        ClaimSession::bind(p.clone(), claim).unwrap().unwrap()
    }

    #[test]
    fn test_identity_is_stable() {
        let p = InMemoryProvisioner::new(identity());
        for _ in 0..3 {
            assert_eq!(p.label(), "memory");
            assert_eq!(p.name(), "local");
        }
        assert!(!p.label().is_empty() && !p.name().is_empty());
    }

    #[test]
    fn test_profile_is_idempotent() {
        let p = InMemoryProvisioner::new(identity()).with_storage_classes(["fast"]);

        let claim = VolumeClaim::new("data", 10).with_storage_class("fast");
        assert_eq!(p.profile(&claim).unwrap(), p.profile(&claim).unwrap());

        let rejected = VolumeClaim::new("data", 10).with_storage_class("slow");
        assert!(p.profile(&rejected).unwrap().is_none());
        assert!(p.profile(&rejected).unwrap().is_none());

        let invalid = VolumeClaim::new("data", 0);
        assert!(p.profile(&invalid).is_err());
        assert!(p.profile(&invalid).is_err());
    }

    #[test]
    fn test_profile_rejection_has_no_side_effects() {
        let p = InMemoryProvisioner::new(identity())
            .with_storage_classes(["fast"])
            .with_capabilities(CapabilitySet::current());
        let before = p.capabilities();

        let rejected = VolumeClaim::new("data", 10).with_storage_class("slow");
        assert!(p.profile(&rejected).unwrap().is_none());

        assert_eq!(p.capabilities(), before);
        assert!(p.reader().is_supported());
        assert!(!p.informer().is_supported());
        assert_eq!(p.volume_count(), 0);
    }

    #[test]
    fn test_profile_defaults_storage_class() {
        let p = InMemoryProvisioner::new(identity()).with_storage_classes(["gold", "silver"]);
        let profile = p.profile(&VolumeClaim::new("data", 1)).unwrap().unwrap();
        assert_eq!(profile.setting("storage_class"), Some("gold"));

        let p = InMemoryProvisioner::new(identity());
        let profile = p.profile(&VolumeClaim::new("data", 1)).unwrap().unwrap();
        assert_eq!(profile.setting("storage_class"), Some(DEFAULT_STORAGE_CLASS));
    }

    #[tokio::test]
    async fn test_reader_only_backend() {
        let p = Arc::new(
            InMemoryProvisioner::new(identity())
                .with_capabilities(CapabilitySet::empty().with(CapabilityKind::Reader)),
        );
        let claim = VolumeClaim::new("data", 10);

        assert!(!p.provisioner().is_supported());
        assert!(!p.adder().is_supported());
        assert!(p.reader().is_supported());

        let session = bound(&p, &claim);
        assert!(session.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_then_read_round_trip() {
        let p = Arc::new(InMemoryProvisioner::new(identity()));
        let session = bound(&p, &VolumeClaim::new("data", 10).with_replicas(3));

        let added = session.add().await.unwrap();
        assert_eq!(added.len(), 3);

        let read = session.read().await.unwrap();
        assert_eq!(id_set(&read), id_set(&added));
    }

    #[tokio::test]
    async fn test_read_is_scoped_to_claim() {
        let p = Arc::new(InMemoryProvisioner::new(identity()));
        bound(&p, &VolumeClaim::new("logs", 1)).add().await.unwrap();

        let session = bound(&p, &VolumeClaim::new("data", 1));
        assert!(session.read().await.unwrap().is_empty());
        assert_eq!(p.volume_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_volume() {
        let p = Arc::new(InMemoryProvisioner::new(identity()));
        let session = bound(&p, &VolumeClaim::new("data", 10).with_replicas(2));

        let added = session.add().await.unwrap();
        let target = added.iter().next().unwrap();

        let deleted = session.delete(target).await.unwrap();
        assert_eq!(deleted.id, target.id);
        assert!(!deleted.phase.is_live());

        let read = session.read().await.unwrap();
        assert!(!read.contains(&target.id));
        assert_eq!(read.len(), 1);

        let err = session.delete(target).await.unwrap_err();
        assert!(matches!(err, ProvisionerError::VolumeNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_rejects_volume_of_another_provisioner() {
        let local = Arc::new(InMemoryProvisioner::new(identity()));
        let cloud = Arc::new(InMemoryProvisioner::new(
            ProvisionerIdentity::new("cloud", "local").unwrap(),
        ));
        let claim = VolumeClaim::new("data", 10);
        let on_local = bound(&local, &claim);
        let on_cloud = bound(&cloud, &claim);

        let local_volume = on_local.add().await.unwrap().into_vec().remove(0);
        let cloud_volume = on_cloud.add().await.unwrap().into_vec().remove(0);
        assert_ne!(local_volume.id, cloud_volume.id);

        let err = on_cloud.delete(&local_volume).await.unwrap_err();
        assert!(matches!(err, ProvisionerError::VolumeNotFound(_)));
        assert_eq!(local.volume_count(), 1);
        assert_eq!(cloud.volume_count(), 1);

        // Same id, wrong owner.
        let mut forged = cloud_volume.clone();
        forged.provisioner = identity();
        assert!(on_cloud.delete(&forged).await.is_err());
        assert_eq!(cloud.volume_count(), 1);
    }

    #[test]
    fn test_replicas_are_bounded() {
        let p = InMemoryProvisioner::new(identity());

        let at_limit = VolumeClaim::new("data", 1).with_replicas(MAX_REPLICAS);
        assert!(p.profile(&at_limit).unwrap().is_some());

        let over = VolumeClaim::new("data", 1).with_replicas(u32::MAX);
        assert!(matches!(
            p.profile(&over),
            Err(ProvisionerError::InvalidClaim(_))
        ));
        assert_eq!(p.volume_count(), 0);
    }

    #[tokio::test]
    async fn test_partial_add_reports_created_volumes() {
        let p = Arc::new(InMemoryProvisioner::new(identity()).with_capacity(2));
        let session = bound(&p, &VolumeClaim::new("data", 10).with_replicas(3));

        let err = session.add().await.unwrap_err();
        let partial = err.partial_volumes().expect("partial result").clone();
        assert_eq!(partial.len(), 2);
        assert_eq!(id_set(&session.read().await.unwrap()), id_set(&partial));

        let err = session.add().await.unwrap_err();
        assert!(matches!(err, ProvisionerError::CapacityExhausted(_)));
        assert!(err.partial_volumes().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_keep_their_own_profile() {
        let p = Arc::new(InMemoryProvisioner::new(identity()));

        let a = bound(&p, &VolumeClaim::new("a", 10).with_storage_class("fast"));
        let b = bound(&p, &VolumeClaim::new("b", 20).with_storage_class("slow"));

        let (added_a, added_b) = tokio::join!(a.add(), b.add());
        let (added_a, added_b) = (added_a.unwrap(), added_b.unwrap());

        for volume in &added_a {
            assert_eq!(volume.claim, "a");
            assert_eq!(volume.size, 10);
            assert_eq!(volume.storage_class.as_deref(), Some("fast"));
        }
        for volume in &added_b {
            assert_eq!(volume.claim, "b");
            assert_eq!(volume.storage_class.as_deref(), Some("slow"));
        }
        assert_eq!(id_set(&a.read().await.unwrap()), id_set(&added_a));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_instance_across_tasks() {
        let p = Arc::new(InMemoryProvisioner::new(identity()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let p = p.clone();
                tokio::spawn(async move {
                    let claim = VolumeClaim::new(format!("claim-{i}"), i + 1);
                    let session = ClaimSession::bind(p, &claim)?.expect("applicable");
                    let added = session.add().await?;
                    let read = session.read().await?;
                    Ok::<_, ProvisionerError>((claim, added, read))
                })
            })
            .collect();

        for handle in handles {
            let (claim, added, read) = handle.await.unwrap().unwrap();
            assert_eq!(id_set(&added), id_set(&read));
            assert!(read.iter().all(|v| v.claim == claim.name && v.size == claim.size));
        }
        assert_eq!(p.volume_count(), 8);
    }

    #[tokio::test]
    async fn test_offline_backend() {
        let p = Arc::new(InMemoryProvisioner::new(identity()));
        let session = bound(&p, &VolumeClaim::new("data", 10));

        p.set_online(false);
        assert!(session.add().await.unwrap_err().is_transient());
        assert_eq!(p.volume_count(), 0);

        p.set_online(true);
        assert_eq!(session.add().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_tiers() {
        let p = Arc::new(InMemoryProvisioner::new(identity()));
        let session = bound(&p, &VolumeClaim::new("data", 10));

        assert!(matches!(
            session.info().await,
            Err(ProvisionerError::VolumeNotFound(_))
        ));
        let volume = session.provision().await.unwrap();
        assert_eq!(session.info().await.unwrap().id, volume.id);
    }

    #[tokio::test]
    async fn test_foreign_profile_is_rejected() {
        let p = InMemoryProvisioner::new(identity());
        let other = ProvisionerIdentity::new("memory", "other").unwrap();
        let profile = Profile::new(other, VolumeClaim::new("data", 1));

        let err = Reader::read(&p, &profile).await.unwrap_err();
        assert!(matches!(err, ProvisionerError::ProfileMismatch { .. }));
    }
}
