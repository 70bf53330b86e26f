//! Server configuration.
//!
//! Environment variables:
//! - `VOLUMED_PROVISIONERS`: comma-separated `label/name` identities of the
//!   reference provisioners to register. Defaults to `memory/local`.
//! - `VOLUMED_OPERATION_TIMEOUT_SECS`: deadline for each capability operation.
//!   Defaults to `30`; `0` disables the deadline.
//! - `VOLUMED_STORAGE_CLASSES`: comma-separated storage classes the reference
//!   provisioners accept. Empty accepts every class.
//!
//! Command-line flags override the environment.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::error::RegistryError;
use crate::identity::ProvisionerIdentity;
use crate::memory::InMemoryProvisioner;
use crate::registry::ProvisionerRegistry;

pub const PROVISIONERS_ENV: &str = "VOLUMED_PROVISIONERS";
pub const OPERATION_TIMEOUT_ENV: &str = "VOLUMED_OPERATION_TIMEOUT_SECS";
pub const STORAGE_CLASSES_ENV: &str = "VOLUMED_STORAGE_CLASSES";

const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed.
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Runtime configuration for `volumed up`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Reference provisioners to register at startup.
    pub provisioners: Vec<ProvisionerIdentity>,
    /// Deadline for each capability operation, if any.
    pub operation_timeout: Option<Duration>,
    /// Storage classes accepted by the reference provisioners.
    pub storage_classes: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            provisioners: vec![default_provisioner()],
            operation_timeout: timeout_from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
            storage_classes: Vec::new(),
        }
    }
}

fn default_provisioner() -> ProvisionerIdentity {
    ProvisionerIdentity::new_unchecked("memory", "local")
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(PROVISIONERS_ENV) {
            let provisioners = split_list(&value)
                .map(str::parse::<ProvisionerIdentity>)
                .collect::<Result<Vec<ProvisionerIdentity>, _>>()
                .map_err(|err| ConfigError::Invalid {
                    var: PROVISIONERS_ENV,
                    reason: err.to_string(),
                })?;
            if !provisioners.is_empty() {
                config.provisioners = provisioners;
            }
        }

        if let Some(value) = lookup(OPERATION_TIMEOUT_ENV) {
            let secs = value.trim().parse::<u64>().map_err(|err| ConfigError::Invalid {
                var: OPERATION_TIMEOUT_ENV,
                reason: err.to_string(),
            })?;
            config.operation_timeout = timeout_from_secs(secs);
        }

        if let Some(value) = lookup(STORAGE_CLASSES_ENV) {
            config.storage_classes = split_list(&value).map(String::from).collect();
        }

        Ok(config)
    }

    /// Replace the provisioner list, unless `provisioners` is empty.
    pub fn with_provisioners(mut self, provisioners: Vec<ProvisionerIdentity>) -> Self {
        if !provisioners.is_empty() {
            self.provisioners = provisioners;
        }
        self
    }

    /// Override the operation deadline in seconds; `0` disables it.
    pub fn with_operation_timeout_secs(mut self, secs: u64) -> Self {
        self.operation_timeout = timeout_from_secs(secs);
        self
    }

    /// Build a registry holding one reference provisioner per identity.
    pub fn build_registry(&self) -> Result<ProvisionerRegistry, RegistryError> {
        let mut registry = ProvisionerRegistry::new();
        if let Some(timeout) = self.operation_timeout {
            registry = registry.with_operation_timeout(timeout);
        }

        for identity in &self.provisioners {
            let provisioner = InMemoryProvisioner::new(identity.clone())
                .with_storage_classes(self.storage_classes.iter().cloned());
            registry.register(Arc::new(provisioner))?;
        }
        Ok(registry)
    }
}
