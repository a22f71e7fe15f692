//! Run identity: version under test and notification metadata

use serde::Serialize;

use crate::config::IdentityConfig;
use crate::error::{ReplayError, Result};

/// Metadata attached to the completion notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    /// Host the replay ran on
    pub hostname: String,
    /// Version under test
    pub version: String,
}

impl RunMetadata {
    /// Metadata for this host
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            hostname: hostname(),
            version: version.into(),
        }
    }

    /// Compact JSON encoding, as carried in the notification attributes
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Resolve the version of the build under test.
///
/// A configured version wins. Otherwise `git describe --tags --always` is run
/// in the working directory.
///
/// # Errors
///
/// Returns [`ReplayError::Version`] if git cannot be run, exits non-zero, or
/// prints nothing.
pub async fn resolve_version(identity: &IdentityConfig) -> Result<String> {
    if let Some(version) = identity.version.as_deref().filter(|v| !v.is_empty()) {
        return Ok(version.to_string());
    }

    let output = tokio::process::Command::new("git")
        .args(["describe", "--tags", "--always"])
        .output()
        .await
        .map_err(|e| ReplayError::Version(format!("Failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(ReplayError::Version(format!(
            "git describe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if version.is_empty() {
        return Err(ReplayError::Version("git describe printed nothing".to_string()));
    }

    tracing::debug!(version = %version, "Resolved version from git");
    Ok(version)
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_version_wins() {
        let identity = IdentityConfig {
            version: Some("v2.0.1".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_version(&identity).await.unwrap(), "v2.0.1");
    }

    #[test]
    fn test_metadata_json() {
        let metadata = RunMetadata {
            hostname: "replay-0".to_string(),
            version: "abc123".to_string(),
        };
        assert_eq!(
            metadata.to_json().unwrap(),
            r#"{"hostname":"replay-0","version":"abc123"}"#
        );
        assert!(!RunMetadata::new("x").hostname.is_empty());
    }
}
