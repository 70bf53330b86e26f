//! Claim-scoped provisioner profiles.
//!
//! A [`Profile`] is the configuration a provisioner derives from one claim.
//! It is returned by [`VolumeProvisioner::profile`] and passed explicitly to
//! every capability call made on behalf of that claim, so a provisioner
//! instance shared across concurrent claims never holds per-claim state.
//!
//! Binding a profile creates no volume and leaves the provisioner untouched.
//!
//! [`VolumeProvisioner::profile`]: crate::provisioner::VolumeProvisioner::profile

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::claim::VolumeClaim;
use crate::identity::ProvisionerIdentity;

/// Provisioner configuration bound to a single claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    provisioner: ProvisionerIdentity,
    claim: VolumeClaim,
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    settings: FxHashMap<String, String>,
}

impl Profile {
    /// Bind `claim` to the provisioner identified by `provisioner`.
    pub fn new(provisioner: ProvisionerIdentity, claim: VolumeClaim) -> Self {
        Self {
            provisioner,
            claim,
            settings: FxHashMap::default(),
        }
    }

    /// Add a provisioner-specific setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Identity of the provisioner that produced this profile.
    pub fn provisioner(&self) -> &ProvisionerIdentity {
        &self.provisioner
    }

    /// Claim this profile is scoped to.
    pub fn claim(&self) -> &VolumeClaim {
        &self.claim
    }

    /// Look up a setting.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Iterate over all settings.
    pub fn settings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.settings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
