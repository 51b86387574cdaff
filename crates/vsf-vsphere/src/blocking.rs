//! Synchronous facade.
//!
//! Wraps the async [`crate::vcenter::VCenter`] with a private
//! current-thread Tokio runtime. Do not use from inside an async context:
//! `block_on` panics when called on a runtime thread.

use crate::config::{VsphereConfig, VsphereConfigSafe};
use crate::error::{VsphereError, VsphereErrorKind, VsphereResult};
use crate::inventory::{InventoryObject, Scope};
use crate::types::*;
use crate::vcenter::VCenter as AsyncVCenter;
use crate::vm::VirtualMachine as AsyncVirtualMachine;

use log::warn;
use std::fmt;
use tokio::runtime::{Builder, Runtime};

/// Blocking connection to a vCenter / ESXi endpoint.
pub struct VCenter {
    inner: AsyncVCenter,
    rt: Runtime,
}

impl VCenter {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> VsphereResult<Self> {
        Self::from_config(VsphereConfig::new(host, username, password))
    }

    pub fn from_config(config: VsphereConfig) -> VsphereResult<Self> {
        let rt = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                VsphereError::new(VsphereErrorKind::Other, format!("Failed to start runtime: {e}"))
            })?;
        Ok(Self {
            inner: AsyncVCenter::from_config(config),
            rt,
        })
    }

    pub fn return_mode(&self) -> ReturnMode {
        self.inner.return_mode()
    }

    pub fn set_return_mode(&mut self, mode: ReturnMode) {
        self.inner.set_return_mode(mode);
    }

    pub fn set_return_single(&mut self, single: bool) {
        self.inner.set_return_single(single);
    }

    pub fn config_safe(&self) -> VsphereConfigSafe {
        self.inner.config_safe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn session(&self) -> Option<&VsphereSession> {
        self.inner.session()
    }

    pub fn connect(&mut self) -> VsphereResult<VsphereSession> {
        self.rt.block_on(self.inner.connect())
    }

    pub fn disconnect(&mut self) -> VsphereResult<()> {
        self.rt.block_on(self.inner.disconnect())
    }

    pub fn check_session(&self) -> VsphereResult<bool> {
        self.rt.block_on(self.inner.check_session())
    }

    pub fn get_vm(&self, name: &str) -> VsphereResult<Lookup<VirtualMachine<'_>>> {
        let found = self.rt.block_on(self.inner.get_vm(name))?;
        Ok(found.map(|vm| self.wrap(vm)))
    }

    pub fn find_vm(&self, name: &str) -> VsphereResult<Option<VirtualMachine<'_>>> {
        let found = self.rt.block_on(self.inner.find_vm(name))?;
        Ok(found.map(|vm| self.wrap(vm)))
    }

    pub fn find_vms(&self, names: &[&str]) -> VsphereResult<Vec<VirtualMachine<'_>>> {
        let found = self.rt.block_on(self.inner.find_vms(names))?;
        Ok(found.into_iter().map(|vm| self.wrap(vm)).collect())
    }

    pub fn find_vms_in(
        &self,
        names: &[&str],
        scope: Option<&Scope>,
    ) -> VsphereResult<Vec<VirtualMachine<'_>>> {
        let found = self.rt.block_on(self.inner.find_vms_in(names, scope))?;
        Ok(found.into_iter().map(|vm| self.wrap(vm)).collect())
    }

    pub fn list_vms(&self) -> VsphereResult<Vec<VirtualMachine<'_>>> {
        let found = self.rt.block_on(self.inner.list_vms())?;
        Ok(found.into_iter().map(|vm| self.wrap(vm)).collect())
    }

    pub fn find_one<T: InventoryObject>(&self, name: &str) -> VsphereResult<Option<T>> {
        self.rt.block_on(self.inner.find_one(name))
    }

    pub fn find_all<T: InventoryObject>(&self, names: &[&str]) -> VsphereResult<Vec<T>> {
        self.rt.block_on(self.inner.find_all(names))
    }

    pub fn find_all_in<T: InventoryObject>(
        &self,
        names: &[&str],
        scope: Option<&Scope>,
    ) -> VsphereResult<Vec<T>> {
        self.rt.block_on(self.inner.find_all_in(names, scope))
    }

    pub fn list_all<T: InventoryObject>(&self) -> VsphereResult<Vec<T>> {
        self.rt.block_on(self.inner.list_all())
    }

    fn wrap<'a>(&'a self, vm: AsyncVirtualMachine<'a>) -> VirtualMachine<'a> {
        VirtualMachine { inner: vm, rt: &self.rt }
    }
}

impl Drop for VCenter {
    fn drop(&mut self) {
        if self.inner.is_connected() {
            if let Err(e) = self.rt.block_on(self.inner.disconnect()) {
                warn!("Disconnect on drop failed: {e}");
            }
        }
    }
}

/// Blocking view of a virtual machine.
pub struct VirtualMachine<'a> {
    inner: AsyncVirtualMachine<'a>,
    rt: &'a Runtime,
}

impl VirtualMachine<'_> {
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn state(&self) -> VmPowerState {
        self.inner.state()
    }

    pub fn summary(&self) -> &VmSummary {
        self.inner.summary()
    }

    pub fn refresh_state(&mut self) -> VsphereResult<VmPowerState> {
        self.rt.block_on(self.inner.refresh_state())
    }

    pub fn info(&self) -> VsphereResult<VmInfo> {
        self.rt.block_on(self.inner.info())
    }

    pub fn power_on(&mut self) -> VsphereResult<()> {
        self.rt.block_on(self.inner.power_on())
    }

    pub fn power_off(&mut self) -> VsphereResult<()> {
        self.rt.block_on(self.inner.power_off())
    }

    pub fn suspend(&mut self) -> VsphereResult<()> {
        self.rt.block_on(self.inner.suspend())
    }

    pub fn reset(&mut self) -> VsphereResult<()> {
        self.rt.block_on(self.inner.reset())
    }

    pub fn shutdown_guest(&self) -> VsphereResult<()> {
        self.rt.block_on(self.inner.shutdown_guest())
    }

    pub fn reboot_guest(&self) -> VsphereResult<()> {
        self.rt.block_on(self.inner.reboot_guest())
    }

    pub fn standby_guest(&self) -> VsphereResult<()> {
        self.rt.block_on(self.inner.standby_guest())
    }

    pub fn list_snapshots(&self) -> VsphereResult<Vec<SnapshotSummary>> {
        self.rt.block_on(self.inner.snapshots().list())
    }

    pub fn create_snapshot(&self, name: &str, description: Option<&str>) -> VsphereResult<String> {
        self.rt.block_on(self.inner.snapshots().create_named(name, description))
    }

    pub fn revert(&self, snapshot_name: &str) -> VsphereResult<()> {
        self.rt.block_on(self.inner.snapshots().revert(snapshot_name))
    }

    pub fn current_snapshot(&self) -> VsphereResult<Option<SnapshotSummary>> {
        self.rt.block_on(self.inner.snapshots().current())
    }

    pub fn revert_current(&self) -> VsphereResult<()> {
        self.rt.block_on(self.inner.snapshots().revert_current())
    }

    pub fn rename_snapshot(
        &self,
        name: &str,
        new_name: &str,
        description: Option<&str>,
    ) -> VsphereResult<()> {
        self.rt
            .block_on(self.inner.snapshots().rename(name, new_name, description))
    }

    pub fn remove_current_snapshot(&self, children: bool) -> VsphereResult<()> {
        self.rt.block_on(self.inner.snapshots().remove_current(children))
    }

    pub fn remove_snapshot(&self, name: &str, children: bool) -> VsphereResult<usize> {
        self.rt.block_on(self.inner.snapshots().remove(name, children))
    }

    pub fn remove_all_snapshots(&self) -> VsphereResult<usize> {
        self.rt.block_on(self.inner.snapshots().remove_all())
    }
}

impl fmt::Debug for VirtualMachine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for VirtualMachine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
