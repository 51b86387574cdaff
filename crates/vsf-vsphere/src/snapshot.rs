//! VM snapshot management via the vSphere REST API.
//!
//! Snapshots are addressed by name, the way operators think about them;
//! ids are resolved on every call since the remote tree may change. The
//! snapshot the VM currently runs from can be addressed directly.

use crate::error::{VsphereError, VsphereResult};
use crate::types::*;
use crate::vsphere::VsphereClient;

use log::{debug, info, warn};

/// Snapshot operations on one VM.
pub struct SnapshotManager<'a> {
    client: &'a VsphereClient,
    vm_id: &'a str,
    vm_name: &'a str,
}

impl<'a> SnapshotManager<'a> {
    pub fn new(client: &'a VsphereClient, vm_id: &'a str, vm_name: &'a str) -> Self {
        Self { client, vm_id, vm_name }
    }

    fn base_path(&self) -> String {
        format!("/api/vcenter/vm/{}/snapshots", self.vm_id)
    }

    /// List all snapshots for the VM as a flat list.
    pub async fn list(&self) -> VsphereResult<Vec<SnapshotSummary>> {
        // The API returns 404 when the VM has no snapshot tree at all
        match self.client.get::<Vec<SnapshotSummary>>(&self.base_path()).await {
            Ok(snaps) => Ok(snaps),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Snapshots named exactly `name`.
    pub async fn find(&self, name: &str) -> VsphereResult<Vec<SnapshotSummary>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|s| s.name == name)
            .collect())
    }

    /// The snapshot the VM is currently running from, if any.
    pub async fn current(&self) -> VsphereResult<Option<SnapshotSummary>> {
        Ok(self.list().await?.into_iter().find(|s| s.current))
    }

    /// Create a new snapshot, returning its id.
    pub async fn create(&self, spec: &CreateSnapshotSpec) -> VsphereResult<String> {
        info!("Creating snapshot \"{}\" for VM \"{}\"...", spec.name, self.vm_name);
        let resp: IdResponse = self.client.post(&self.base_path(), spec).await?;
        Ok(resp.into_id())
    }

    /// Create a named snapshot including memory, without quiescing.
    pub async fn create_named(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> VsphereResult<String> {
        let spec = CreateSnapshotSpec {
            name: name.to_string(),
            description: description.map(|s| s.to_string()),
            memory: Some(true),
            quiesce: Some(false),
        };
        self.create(&spec).await
    }

    /// Revert to the snapshot called `name`. The name must be unique.
    pub async fn revert(&self, name: &str) -> VsphereResult<()> {
        let snap = self.find_unique(name).await?;
        self.revert_to(&snap).await
    }

    /// Revert to the current snapshot, discarding changes made since.
    pub async fn revert_current(&self) -> VsphereResult<()> {
        let snap = self.require_current().await?;
        self.revert_to(&snap).await
    }

    async fn revert_to(&self, snap: &SnapshotSummary) -> VsphereResult<()> {
        info!("Reverting VM \"{}\" to snapshot \"{}\"...", self.vm_name, snap.name);
        let path = format!("{}/{}?action=revert", self.base_path(), snap.snapshot);
        self.client.post_empty(&path).await
    }

    /// Rename the snapshot called `name`, optionally replacing its
    /// description. The name must be unique.
    pub async fn rename(
        &self,
        name: &str,
        new_name: &str,
        description: Option<&str>,
    ) -> VsphereResult<()> {
        let snap = self.find_unique(name).await?;
        info!(
            "Renaming snapshot \"{}\" on VM \"{}\" to \"{new_name}\"...",
            snap.name, self.vm_name
        );
        let spec = UpdateSnapshotSpec {
            name: Some(new_name.to_string()),
            description: description.map(|s| s.to_string()),
        };
        let path = format!("{}/{}", self.base_path(), snap.snapshot);
        self.client.patch(&path, &spec).await
    }

    /// Remove every snapshot called `name`, optionally with its children.
    /// Returns the number of snapshots removed.
    pub async fn remove(&self, name: &str, children: bool) -> VsphereResult<usize> {
        let snaps = self.find(name).await?;
        if snaps.is_empty() {
            return Err(VsphereError::not_found(format!(
                "No snapshot named \"{name}\" on VM \"{}\"",
                self.vm_name
            )));
        }
        let mut removed = 0;
        for (i, snap) in snaps.iter().enumerate() {
            info!("Removing snapshot \"{}\" from VM \"{}\"...", snap.name, self.vm_name);
            match self.delete_by_id(&snap.snapshot, children).await {
                Ok(()) => removed += 1,
                // A match below an earlier one went with its ancestor
                Err(e) if i > 0 && e.is_not_found() => {
                    debug!("Snapshot {} already removed with its parent", snap.snapshot);
                    removed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    /// Remove the current snapshot, optionally with its children.
    pub async fn remove_current(&self, children: bool) -> VsphereResult<()> {
        let snap = self.require_current().await?;
        info!("Removing current snapshot \"{}\" from VM \"{}\"...", snap.name, self.vm_name);
        self.delete_by_id(&snap.snapshot, children).await
    }

    /// Remove every snapshot on the VM. Returns the number removed.
    pub async fn remove_all(&self) -> VsphereResult<usize> {
        let snaps = self.list().await?;
        let mut removed = 0;
        for snap in &snaps {
            match self.delete_by_id(&snap.snapshot, false).await {
                Ok(()) => removed += 1,
                // Already gone together with an earlier parent
                Err(e) if e.is_not_found() => {
                    warn!("Snapshot {} vanished before removal", snap.snapshot);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    async fn delete_by_id(&self, snapshot_id: &str, children: bool) -> VsphereResult<()> {
        let path = if children {
            format!("{}/{snapshot_id}?remove_children=true", self.base_path())
        } else {
            format!("{}/{snapshot_id}", self.base_path())
        };
        self.client.delete(&path).await
    }

    async fn require_current(&self) -> VsphereResult<SnapshotSummary> {
        self.current().await?.ok_or_else(|| {
            VsphereError::not_found(format!("VM \"{}\" has no current snapshot", self.vm_name))
        })
    }

    async fn find_unique(&self, name: &str) -> VsphereResult<SnapshotSummary> {
        let mut found = self.find(name).await?;
        match found.len() {
            0 => Err(VsphereError::not_found(format!(
                "No snapshot named \"{name}\" on VM \"{}\"",
                self.vm_name
            ))),
            1 => Ok(found.remove(0)),
            n => Err(VsphereError::snapshot(format!(
                "{n} snapshots named \"{name}\" on VM \"{}\"; name is ambiguous",
                self.vm_name
            ))),
        }
    }
}
