//! Device directory backed by an Ansible inventory.
//!
//! The inventory is rendered by `ansible-inventory -i <path> --list`, or
//! read directly when the path already points at the rendered JSON. Group
//! membership is resolved over `children` with a worklist, so cyclic group
//! graphs terminate.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use tokio::process::Command;

use crate::device::Device;
use crate::error::DirectoryError;

/// A single inventory group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Group {
    /// Hosts that are direct members.
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Names of child groups.
    #[serde(default)]
    pub children: Vec<String>,
}

/// Per-host variables. Only the management address is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostVars {
    pub ansible_host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    hostvars: IndexMap<String, HostVars>,
}

/// The JSON document produced by `ansible-inventory --list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryDocument {
    #[serde(rename = "_meta", default)]
    meta: Meta,

    #[serde(flatten)]
    groups: IndexMap<String, Group>,
}

impl InventoryDocument {
    /// Parse a rendered inventory.
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Get a group by name.
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Management address for a host, falling back to the hostname.
    pub fn address_of<'a>(&'a self, host: &'a str) -> &'a str {
        self.meta
            .hostvars
            .get(host)
            .and_then(|vars| vars.ansible_host.as_deref())
            .unwrap_or(host)
    }

    /// Resolve a group (and all of its descendants) into devices sorted by name.
    ///
    /// A group reached a second time contributes nothing, which bounds the
    /// walk even when `children` form a cycle.
    pub fn resolve(&self, group: &str) -> Result<Vec<Device>, DirectoryError> {
        if !self.groups.contains_key(group) {
            return Err(DirectoryError::GroupNotFound {
                group: group.to_string(),
            });
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&str> = vec![group];
        let mut hosts: BTreeSet<&str> = BTreeSet::new();

        while let Some(name) = pending.pop() {
            if !visited.insert(name) {
                continue;
            }
            let Some(entry) = self.groups.get(name) else {
                continue;
            };
            hosts.extend(entry.hosts.iter().map(String::as_str));
            pending.extend(entry.children.iter().map(String::as_str));
        }

        debug!(
            "group '{}' resolved to {} hosts across {} groups",
            group,
            hosts.len(),
            visited.len()
        );

        Ok(hosts
            .into_iter()
            .map(|host| Device::new(host, self.address_of(host)))
            .collect())
    }
}

/// Where the inventory comes from.
#[derive(Debug, Clone)]
pub enum InventorySource {
    /// Any inventory `ansible-inventory` understands (YAML, INI, plugins).
    Ansible(PathBuf),

    /// A document already rendered with `ansible-inventory --list`.
    Json(PathBuf),
}

impl InventorySource {
    /// Pick a source from the path: `.json` files are read directly.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::Json(path),
            _ => Self::Ansible(path),
        }
    }

    /// Load and parse the inventory document.
    pub async fn load(&self) -> Result<InventoryDocument, DirectoryError> {
        match self {
            Self::Ansible(path) => render_with_ansible(path).await,
            Self::Json(path) => {
                let json = tokio::fs::read_to_string(path).await.map_err(|source| {
                    DirectoryError::Read {
                        path: path.clone(),
                        source,
                    }
                })?;
                InventoryDocument::from_json(&json)
            }
        }
    }

    /// Load the inventory and resolve a group into devices.
    pub async fn devices(&self, group: &str) -> Result<Vec<Device>, DirectoryError> {
        self.load().await?.resolve(group)
    }
}

async fn render_with_ansible(path: &Path) -> Result<InventoryDocument, DirectoryError> {
    debug!("running ansible-inventory -i {} --list", path.display());

    let output = Command::new("ansible-inventory")
        .arg("-i")
        .arg(path)
        .arg("--list")
        .output()
        .await
        .map_err(DirectoryError::Spawn)?;

    if !output.status.success() {
        return Err(DirectoryError::CommandFailed {
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    InventoryDocument::from_json(&String::from_utf8_lossy(&output.stdout))
}
