//! Virtual machine view backed by the vSphere REST API.
//!
//! A `VirtualMachine` is a transient view produced by a lookup. It borrows
//! the connection it came from; the remote system stays authoritative, so
//! `state()` is only as fresh as the last lookup or `refresh_state()`.

use crate::error::VsphereResult;
use crate::snapshot::SnapshotManager;
use crate::types::*;
use crate::vsphere::VsphereClient;

use log::info;
use std::fmt;

pub struct VirtualMachine<'a> {
    client: &'a VsphereClient,
    summary: VmSummary,
}

impl<'a> VirtualMachine<'a> {
    pub fn new(client: &'a VsphereClient, summary: VmSummary) -> Self {
        Self { client, summary }
    }

    /// Managed-object id (e.g. "vm-42").
    pub fn id(&self) -> &str {
        &self.summary.vm
    }

    pub fn name(&self) -> &str {
        &self.summary.name
    }

    /// Power state as of the last lookup or refresh.
    pub fn state(&self) -> VmPowerState {
        self.summary.power_state
    }

    pub fn summary(&self) -> &VmSummary {
        &self.summary
    }

    pub fn into_summary(self) -> VmSummary {
        self.summary
    }

    /// Re-read the power state from vCenter.
    pub async fn refresh_state(&mut self) -> VsphereResult<VmPowerState> {
        #[derive(serde::Deserialize)]
        struct PowerInfo {
            state: VmPowerState,
        }
        let path = format!("/api/vcenter/vm/{}/power", self.id());
        let info: PowerInfo = self.client.get(&path).await?;
        self.summary.power_state = info.state;
        Ok(info.state)
    }

    /// Full details (GET /api/vcenter/vm/{vm}).
    pub async fn info(&self) -> VsphereResult<VmInfo> {
        let path = format!("/api/vcenter/vm/{}", self.id());
        self.client.get::<VmInfo>(&path).await
    }

    // ── Power operations ────────────────────────────────────────────

    pub async fn power_on(&mut self) -> VsphereResult<()> {
        info!("Powering on VM \"{}\"...", self.name());
        self.power_action("start", VmPowerState::PoweredOn).await
    }

    /// Hard power off.
    pub async fn power_off(&mut self) -> VsphereResult<()> {
        info!("Powering off VM \"{}\"...", self.name());
        self.power_action("stop", VmPowerState::PoweredOff).await
    }

    pub async fn suspend(&mut self) -> VsphereResult<()> {
        info!("Suspending VM \"{}\"...", self.name());
        self.power_action("suspend", VmPowerState::Suspended).await
    }

    /// Hard reset. The VM stays powered on.
    pub async fn reset(&mut self) -> VsphereResult<()> {
        info!("Resetting VM \"{}\"...", self.name());
        self.power_action("reset", VmPowerState::PoweredOn).await
    }

    async fn power_action(&mut self, action: &str, resulting: VmPowerState) -> VsphereResult<()> {
        let path = format!("/api/vcenter/vm/{}/power?action={action}", self.id());
        self.client.post_empty(&path).await?;
        self.summary.power_state = resulting;
        Ok(())
    }

    // ── Guest operations (require VMware Tools) ─────────────────────

    /// Graceful guest OS shutdown. Returns once the request is accepted;
    /// the power state changes asynchronously.
    pub async fn shutdown_guest(&self) -> VsphereResult<()> {
        info!("Shutting down guest OS on VM \"{}\"...", self.name());
        self.guest_action("shutdown").await
    }

    pub async fn reboot_guest(&self) -> VsphereResult<()> {
        info!("Rebooting guest OS on VM \"{}\"...", self.name());
        self.guest_action("reboot").await
    }

    pub async fn standby_guest(&self) -> VsphereResult<()> {
        info!("Putting guest OS on VM \"{}\" in standby...", self.name());
        self.guest_action("standby").await
    }

    async fn guest_action(&self, action: &str) -> VsphereResult<()> {
        let path = format!("/api/vcenter/vm/{}/guest/power?action={action}", self.id());
        self.client.post_empty(&path).await
    }

    // ── Snapshots ───────────────────────────────────────────────────

    pub fn snapshots(&self) -> SnapshotManager<'_> {
        SnapshotManager::new(self.client, &self.summary.vm, &self.summary.name)
    }
}

impl fmt::Debug for VirtualMachine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("id", &self.summary.vm)
            .field("name", &self.summary.name)
            .field("state", &self.summary.power_state)
            .finish()
    }
}

impl fmt::Display for VirtualMachine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.name(), self.state())
    }
}
