//! Build version reporting for `volumed version`.
//!
//! Build-time environment variables refine the package version:
//! - `VOLUMED_GIT_DESCRIBE`: output of `git describe`; replaces the package
//!   version when present (a leading `v` is dropped, it is added back when
//!   rendering).
//! - `VOLUMED_PRERELEASE`: prerelease tag such as `dev` or `rc1`.
//! - `VOLUMED_GIT_COMMIT`: revision the binary was built from.

use std::fmt;

use serde::Serialize;

/// Version of the running binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    /// Release version without a leading `v`.
    pub version: String,
    /// Prerelease tag, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prerelease: Option<String>,
    /// Source revision, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl VersionInfo {
    /// Resolve the version from its build inputs.
    pub fn new(
        package_version: &str,
        git_describe: Option<&str>,
        prerelease: Option<&str>,
        revision: Option<&str>,
    ) -> Self {
        let version = match non_empty(git_describe) {
            Some(describe) => describe.strip_prefix('v').unwrap_or(describe),
            None => package_version,
        };

        Self {
            version: version.to_string(),
            prerelease: non_empty(prerelease).map(String::from),
            revision: non_empty(revision).map(String::from),
        }
    }

    /// Version of this build.
    pub fn current() -> Self {
        Self::new(
            env!("CARGO_PKG_VERSION"),
            option_env!("VOLUMED_GIT_DESCRIBE"),
            option_env!("VOLUMED_PRERELEASE"),
            option_env!("VOLUMED_GIT_COMMIT"),
        )
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "volumed v{}", self.version)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        if let Some(rev) = &self.revision {
            write!(f, " ({rev})")?;
        }
        Ok(())
    }
}
