//! The address file: deployment results keyed by network.

use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{DeployError, DeploymentResult, NetworkKey};

/// Default location of the address file.
pub const DEFAULT_ADDRESS_FILE: &str = "contract-addresses.json";

/// Every recorded deployment, one entry per network.
pub type RegistryMap = BTreeMap<NetworkKey, DeploymentResult>;

/// Handle on the address file.
///
/// Only one run is expected to write a given file at a time; there is no locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRegistry {
    path: PathBuf,
}

impl Default for AddressRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS_FILE)
    }
}

impl AddressRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the recorded deployments.
    ///
    /// A missing or unreadable file is expected on a first run: it is logged and
    /// an empty registry is returned.
    pub fn load(&self) -> RegistryMap {
        match self.try_load() {
            Ok(registry) => {
                tracing::debug!(
                    path = %self.path.display(),
                    networks = registry.len(),
                    "Address registry loaded"
                );
                registry
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "Previous configuration not found at: \"{}\"",
                    self.path.display()
                );
                RegistryMap::new()
            }
        }
    }

    /// Load the recorded deployments, failing on a missing or malformed file.
    ///
    /// Entries whose key is not `<name>.<chainId>` are kept, so persisting the
    /// registry again does not drop them, but a warning is logged for each.
    pub fn try_load(&self) -> Result<RegistryMap, DeployError> {
        let load = || -> anyhow::Result<RegistryMap> {
            let content = std::fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            serde_json::from_str(&content).context("Failed to parse address file JSON")
        };

        let registry = load().map_err(|source| DeployError::RegistryLoadFailed {
            path: self.path.clone(),
            source,
        })?;

        for key in registry.keys().filter(|key| key.parts().is_none()) {
            tracing::warn!(
                key = %key,
                path = %self.path.display(),
                "Address file entry has a malformed network key, expected <name>.<chainId>"
            );
        }

        Ok(registry)
    }

    /// Return `existing` with `key` set to `result`.
    ///
    /// A previous entry for `key` is replaced as a whole; other keys are kept.
    pub fn merge(existing: &RegistryMap, key: NetworkKey, result: DeploymentResult) -> RegistryMap {
        let mut merged = existing.clone();
        merged.insert(key, result);
        merged
    }

    /// Write the whole registry to the address file.
    ///
    /// The content is written to a sibling temporary file which is then renamed
    /// over the address file, so an interrupted write leaves the previous version
    /// intact.
    pub fn persist(&self, registry: &RegistryMap) -> Result<(), DeployError> {
        self.write_atomically(registry)
            .map_err(|source| DeployError::RegistryPersistFailed {
                path: self.path.clone(),
                source,
            })?;

        tracing::info!(
            path = %self.path.display(),
            networks = registry.len(),
            "Address registry saved"
        );

        Ok(())
    }

    fn write_atomically(&self, registry: &RegistryMap) -> anyhow::Result<()> {
        let content =
            serde_json::to_string_pretty(registry).context("Failed to serialize address registry")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = self.tmp_path();
        let written = write_synced(&tmp_path, content.as_bytes()).and_then(|()| {
            std::fs::rename(&tmp_path, &self.path).with_context(|| {
                format!(
                    "Failed to move {} to {}",
                    tmp_path.display(),
                    self.path.display()
                )
            })
        });

        if written.is_err() {
            std::fs::remove_file(&tmp_path).ok();
        }

        written
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_synced(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content)
        .and_then(|_| file.sync_all())
        .with_context(|| format!("Failed to write {}", path.display()))
}
