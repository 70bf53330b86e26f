//! Provisioner identity.
//!
//! A provisioner is identified by a `(label, name)` pair. The label groups
//! provisioners by category (a backend family such as `memory` or `cloud`);
//! the name selects the specific backend within that family. Both parts are
//! non-empty and must not contain `/`, which separates them in the textual
//! form `label/name`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionerError, ProvisionerResult};

/// Registry key of a provisioner instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProvisionerIdentity {
    label: String,
    name: String,
}

impl ProvisionerIdentity {
    /// Create an identity, rejecting empty parts and parts containing `/`.
    pub fn new(label: impl Into<String>, name: impl Into<String>) -> ProvisionerResult<Self> {
        let label = label.into();
        let name = name.into();
        validate_part("label", &label)?;
        validate_part("name", &name)?;
        Ok(Self { label, name })
    }

    /// Build an identity from parts known to be valid.
    pub(crate) fn new_unchecked(label: &str, name: &str) -> Self {
        debug_assert!(validate_part("label", label).is_ok());
        debug_assert!(validate_part("name", name).is_ok());
        Self {
            label: label.to_string(),
            name: name.to_string(),
        }
    }

    /// Category this provisioner belongs to.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Specific backend name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn validate_part(part: &str, value: &str) -> ProvisionerResult<()> {
    if value.trim().is_empty() {
        return Err(ProvisionerError::InvalidIdentity(format!(
            "{part} must not be empty"
        )));
    }
    if value.contains('/') {
        return Err(ProvisionerError::InvalidIdentity(format!(
            "{part} {value:?} must not contain '/'"
        )));
    }
    Ok(())
}

impl fmt::Display for ProvisionerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.label, self.name)
    }
}

impl FromStr for ProvisionerIdentity {
    type Err = ProvisionerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, name) = s.trim().split_once('/').ok_or_else(|| {
            ProvisionerError::InvalidIdentity(format!("expected label/name, got {s:?}"))
        })?;
        Self::new(label, name)
    }
}

impl TryFrom<String> for ProvisionerIdentity {
    type Error = ProvisionerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProvisionerIdentity> for String {
    fn from(identity: ProvisionerIdentity) -> Self {
        identity.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display_and_parse() {
        let id = ProvisionerIdentity::new("memory", "local").unwrap();
        assert_eq!(id.to_string(), "memory/local");
        assert_eq!("memory/local".parse::<ProvisionerIdentity>().unwrap(), id);
        assert_eq!(id.label(), "memory");
        assert_eq!(id.name(), "local");
    }

    #[test]
    fn test_identity_rejects_empty_parts() {
        assert!(ProvisionerIdentity::new("", "local").is_err());
        assert!(ProvisionerIdentity::new("memory", "  ").is_err());
        assert!("memory/".parse::<ProvisionerIdentity>().is_err());
        assert!("memory".parse::<ProvisionerIdentity>().is_err());
        assert!("a/b/c".parse::<ProvisionerIdentity>().is_err());
    }

    #[test]
    fn test_identity_serializes_as_string() {
        let id = ProvisionerIdentity::new("cloud", "ebs").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"cloud/ebs\"");
        let back: ProvisionerIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ProvisionerIdentity>("\"nolabel\"").is_err());
    }
}
