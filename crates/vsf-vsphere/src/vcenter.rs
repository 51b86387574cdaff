//! The `VCenter` connection facade.
//!
//! `VCenter` holds the connection parameters, owns the `VsphereClient`
//! while a session is open, and exposes name-based lookups. Lookups return
//! views that borrow the facade, so the session cannot be closed while a
//! view is still in use.

use crate::config::{VsphereConfig, VsphereConfigSafe};
use crate::error::{VsphereError, VsphereResult};
use crate::inventory::{Inventory, InventoryObject, Scope};
use crate::types::*;
use crate::vm::VirtualMachine;
use crate::vsphere::VsphereClient;

use chrono::Utc;
use log::{debug, info, warn};

/// Connection to a vCenter / ESXi endpoint.
pub struct VCenter {
    config: VsphereConfig,
    client: Option<VsphereClient>,
    session: Option<VsphereSession>,
}

impl VCenter {
    /// Store connection parameters. No network I/O happens until
    /// [`VCenter::connect`].
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::from_config(VsphereConfig::new(host, username, password))
    }

    pub fn from_config(config: VsphereConfig) -> Self {
        Self {
            config,
            client: None,
            session: None,
        }
    }

    pub fn with_return_mode(mut self, mode: ReturnMode) -> Self {
        self.config.return_mode = mode;
        self
    }

    pub fn return_mode(&self) -> ReturnMode {
        self.config.return_mode
    }

    /// Shape of [`VCenter::get_vm`] results.
    pub fn set_return_mode(&mut self, mode: ReturnMode) {
        self.config.return_mode = mode;
    }

    /// `true` makes [`VCenter::get_vm`] yield a single VM (or none),
    /// `false` a collection.
    pub fn set_return_single(&mut self, single: bool) {
        self.set_return_mode(ReturnMode::from_single(single));
    }

    pub fn config(&self) -> &VsphereConfig {
        &self.config
    }

    /// Current config without the password.
    pub fn config_safe(&self) -> VsphereConfigSafe {
        self.config.safe()
    }

    /// Whether we have an active vSphere session.
    pub fn is_connected(&self) -> bool {
        self.client
            .as_ref()
            .map(|c| c.is_connected())
            .unwrap_or(false)
    }

    pub fn session(&self) -> Option<&VsphereSession> {
        self.session.as_ref()
    }

    fn require_client(&self) -> VsphereResult<&VsphereClient> {
        self.client
            .as_ref()
            .filter(|c| c.is_connected())
            .ok_or_else(VsphereError::not_connected)
    }

    // ── Connection ──────────────────────────────────────────────────

    /// Open a session. An existing session is closed first.
    pub async fn connect(&mut self) -> VsphereResult<VsphereSession> {
        self.config.validate()?;
        if self.is_connected() {
            self.disconnect().await?;
        }

        info!("Connecting to {} ...", self.config.endpoint());
        let mut client = VsphereClient::new(&self.config)?;
        let session_id = match client.login().await {
            Ok(sid) => sid,
            Err(e) => {
                info!("Unable to connect to {}: {e}", self.config.endpoint());
                return Err(e);
            }
        };

        let session = VsphereSession {
            host: self.config.host.clone(),
            username: self.config.username.clone(),
            session_id,
            connected_at: Utc::now(),
        };
        self.client = Some(client);
        self.session = Some(session.clone());
        info!("Connected to {}", self.config.endpoint());
        Ok(session)
    }

    /// Close the session. Calling this while disconnected does nothing.
    pub async fn disconnect(&mut self) -> VsphereResult<()> {
        self.session = None;
        if let Some(mut client) = self.client.take() {
            if client.is_connected() {
                client.logout().await?;
                info!("Disconnected from {}", self.config.endpoint());
            }
        }
        Ok(())
    }

    /// Whether the server still honours our session. `false` when
    /// disconnected.
    pub async fn check_session(&self) -> VsphereResult<bool> {
        match self.client.as_ref().filter(|c| c.is_connected()) {
            Some(client) => client.check_session().await,
            None => Ok(false),
        }
    }

    /// Raw inventory access for callers that need summaries rather than
    /// views.
    pub fn inventory(&self) -> VsphereResult<Inventory<'_>> {
        Ok(Inventory::new(self.require_client()?))
    }

    // ── Virtual machines ────────────────────────────────────────────

    /// Look up VMs named `name`, shaped by the configured return mode.
    pub async fn get_vm(&self, name: &str) -> VsphereResult<Lookup<VirtualMachine<'_>>> {
        let mode = self.return_mode();
        debug!("get_vm({name:?}) in {mode:?} mode");
        let vms = self.find_vms(&[name]).await?;
        Ok(Lookup::from_matches(mode, vms))
    }

    /// First VM named exactly `name`.
    pub async fn find_vm(&self, name: &str) -> VsphereResult<Option<VirtualMachine<'_>>> {
        Ok(self.find_vms(&[name]).await?.into_iter().next())
    }

    /// Every VM whose name is one of `names`.
    pub async fn find_vms(&self, names: &[&str]) -> VsphereResult<Vec<VirtualMachine<'_>>> {
        self.find_vms_in(names, None).await
    }

    /// Every VM whose name is one of `names`, searching only inside `scope`
    /// when one is given.
    pub async fn find_vms_in(
        &self,
        names: &[&str],
        scope: Option<&Scope>,
    ) -> VsphereResult<Vec<VirtualMachine<'_>>> {
        let client = self.require_client()?;
        let found: Vec<VmSummary> = Inventory::new(client).find_all_in(names, scope).await?;
        Ok(found
            .into_iter()
            .map(|s| VirtualMachine::new(client, s))
            .collect())
    }

    pub async fn list_vms(&self) -> VsphereResult<Vec<VirtualMachine<'_>>> {
        let client = self.require_client()?;
        let all: Vec<VmSummary> = Inventory::new(client).list_all().await?;
        Ok(all
            .into_iter()
            .map(|s| VirtualMachine::new(client, s))
            .collect())
    }

    pub async fn list_running_vms(&self) -> VsphereResult<Vec<VirtualMachine<'_>>> {
        let client = self.require_client()?;
        let running = Inventory::new(client)
            .list_vms_in_state(&[VmPowerState::PoweredOn])
            .await?;
        Ok(running
            .into_iter()
            .map(|s| VirtualMachine::new(client, s))
            .collect())
    }

    // ── Generic inventory lookups ───────────────────────────────────

    pub async fn find_one<T: InventoryObject>(&self, name: &str) -> VsphereResult<Option<T>> {
        self.inventory()?.find_one(name).await
    }

    pub async fn find_all<T: InventoryObject>(&self, names: &[&str]) -> VsphereResult<Vec<T>> {
        self.inventory()?.find_all(names).await
    }

    pub async fn find_all_in<T: InventoryObject>(
        &self,
        names: &[&str],
        scope: Option<&Scope>,
    ) -> VsphereResult<Vec<T>> {
        self.inventory()?.find_all_in(names, scope).await
    }

    pub async fn list_all<T: InventoryObject>(&self) -> VsphereResult<Vec<T>> {
        self.inventory()?.list_all().await
    }

    pub async fn find_datacenter(&self, name: &str) -> VsphereResult<Option<DatacenterSummary>> {
        self.find_one(name).await
    }

    pub async fn find_folder(&self, name: &str) -> VsphereResult<Option<FolderSummary>> {
        self.find_one(name).await
    }

    pub async fn find_network(&self, name: &str) -> VsphereResult<Option<NetworkSummary>> {
        self.find_one(name).await
    }

    pub async fn find_datastore(&self, name: &str) -> VsphereResult<Option<DatastoreSummary>> {
        self.find_one(name).await
    }

    pub async fn find_host(&self, name: &str) -> VsphereResult<Option<HostSummary>> {
        self.find_one(name).await
    }
}

impl Drop for VCenter {
    fn drop(&mut self) {
        let Some(mut client) = self.client.take() else {
            return;
        };
        if !client.is_connected() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("VCenter dropped while connected; logging out in background");
                handle.spawn(async move {
                    let _ = client.logout().await;
                });
            }
            Err(_) => warn!(
                "VCenter dropped outside a Tokio runtime; session on {} left open",
                client.base_url()
            ),
        }
    }
}
