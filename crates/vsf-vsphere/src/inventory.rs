//! Name-based inventory queries.
//!
//! Every list endpoint of the vSphere REST API accepts a repeated `names`
//! filter. Matching here is exact and case-sensitive on the full name;
//! results are re-checked client-side so a looser server filter never
//! leaks partial matches. A [`Scope`] narrows a lookup to one folder or
//! datacenter through the `folders`, `parent_folders` and `datacenters`
//! filters.

use crate::error::{VsphereError, VsphereErrorKind, VsphereResult};
use crate::types::*;
use crate::vsphere::VsphereClient;

use log::debug;
use serde::de::DeserializeOwned;
use std::fmt;

/// Kinds of managed objects the facade can look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    VirtualMachine,
    Datacenter,
    Folder,
    Network,
    Datastore,
    Host,
}

impl ObjectKind {
    /// REST list endpoint for this kind.
    pub fn list_path(&self) -> &'static str {
        match self {
            Self::VirtualMachine => "/api/vcenter/vm",
            Self::Datacenter => "/api/vcenter/datacenter",
            Self::Folder => "/api/vcenter/folder",
            Self::Network => "/api/vcenter/network",
            Self::Datastore => "/api/vcenter/datastore",
            Self::Host => "/api/vcenter/host",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::VirtualMachine => "virtual machine",
            Self::Datacenter => "datacenter",
            Self::Folder => "folder",
            Self::Network => "network",
            Self::Datastore => "datastore",
            Self::Host => "host",
        };
        f.write_str(label)
    }
}

/// Container that limits a lookup: objects directly inside a folder, or
/// anywhere within a datacenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Folder id, e.g. `group-v3`.
    Folder(String),
    /// Datacenter id, e.g. `datacenter-1`.
    Datacenter(String),
}

impl Scope {
    /// Query parameter restricting a `kind` list to this scope.
    fn param_for(&self, kind: ObjectKind) -> VsphereResult<(String, String)> {
        let key = match (self, kind) {
            (Self::Folder(_), ObjectKind::Folder) => "parent_folders",
            (Self::Folder(_), _) => "folders",
            (Self::Datacenter(_), ObjectKind::Datacenter) => {
                return Err(VsphereError::new(
                    VsphereErrorKind::Unsupported,
                    "Datacenters cannot be scoped to a datacenter",
                ))
            }
            (Self::Datacenter(_), _) => "datacenters",
        };
        let id = match self {
            Self::Folder(id) | Self::Datacenter(id) => id,
        };
        Ok((key.to_string(), id.clone()))
    }
}

impl From<&FolderSummary> for Scope {
    fn from(folder: &FolderSummary) -> Self {
        Self::Folder(folder.folder.clone())
    }
}

impl From<&DatacenterSummary> for Scope {
    fn from(dc: &DatacenterSummary) -> Self {
        Self::Datacenter(dc.datacenter.clone())
    }
}

/// A summary type returned by one of the inventory list endpoints.
pub trait InventoryObject: DeserializeOwned + Send + Sync + 'static {
    const KIND: ObjectKind;

    /// Managed-object id (e.g. `vm-42`, `datacenter-3`).
    fn id(&self) -> &str;

    fn name(&self) -> &str;
}

macro_rules! inventory_object {
    ($ty:ty, $kind:expr, $id:ident) => {
        impl InventoryObject for $ty {
            const KIND: ObjectKind = $kind;

            fn id(&self) -> &str {
                &self.$id
            }

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

inventory_object!(VmSummary, ObjectKind::VirtualMachine, vm);
inventory_object!(DatacenterSummary, ObjectKind::Datacenter, datacenter);
inventory_object!(FolderSummary, ObjectKind::Folder, folder);
inventory_object!(NetworkSummary, ObjectKind::Network, network);
inventory_object!(DatastoreSummary, ObjectKind::Datastore, datastore);
inventory_object!(HostSummary, ObjectKind::Host, host);

/// Inventory lookups backed by `VsphereClient`.
pub struct Inventory<'a> {
    client: &'a VsphereClient,
}

impl<'a> Inventory<'a> {
    pub fn new(client: &'a VsphereClient) -> Self {
        Self { client }
    }

    /// Every object of kind `T`.
    pub async fn list_all<T: InventoryObject>(&self) -> VsphereResult<Vec<T>> {
        let all: Vec<T> = self.client.get(T::KIND.list_path()).await?;
        debug!("Listed {} {} object(s)", all.len(), T::KIND);
        Ok(all)
    }

    /// Every object of kind `T` whose name equals one of `names`, in server
    /// order. Objects sharing a name are all returned.
    pub async fn find_all<T: InventoryObject>(&self, names: &[&str]) -> VsphereResult<Vec<T>> {
        self.find_all_in(names, None).await
    }

    /// Like [`Inventory::find_all`], limited to objects inside `scope`.
    pub async fn find_all_in<T: InventoryObject>(
        &self,
        names: &[&str],
        scope: Option<&Scope>,
    ) -> VsphereResult<Vec<T>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut params: Vec<(String, String)> = names
            .iter()
            .map(|n| ("names".to_string(), n.to_string()))
            .collect();
        if let Some(scope) = scope {
            params.push(scope.param_for(T::KIND)?);
        }

        let found: Vec<T> = self
            .client
            .get_with_params(T::KIND.list_path(), &params)
            .await?;
        let matches = retain_exact(found, names);
        debug!("Found {} {} object(s) named {names:?}", matches.len(), T::KIND);
        Ok(matches)
    }

    /// First object of kind `T` named exactly `name`.
    pub async fn find_one<T: InventoryObject>(&self, name: &str) -> VsphereResult<Option<T>> {
        Ok(self.find_all(&[name]).await?.into_iter().next())
    }

    /// VMs currently in any of `states`.
    pub async fn list_vms_in_state(
        &self,
        states: &[VmPowerState],
    ) -> VsphereResult<Vec<VmSummary>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let vms: Vec<VmSummary> = self
            .client
            .get_with_params(
                ObjectKind::VirtualMachine.list_path(),
                &power_state_params(states),
            )
            .await?;
        Ok(vms
            .into_iter()
            .filter(|vm| states.contains(&vm.power_state))
            .collect())
    }
}

/// `power_states` filter for `states`. The server has no value for
/// `Unknown`, so asking for it drops the filter and leaves the selection to
/// the caller.
fn power_state_params(states: &[VmPowerState]) -> Vec<(String, String)> {
    if states.contains(&VmPowerState::Unknown) {
        return Vec::new();
    }
    states
        .iter()
        .map(|s| ("power_states".to_string(), s.as_api_str().to_string()))
        .collect()
}

fn retain_exact<T: InventoryObject>(found: Vec<T>, names: &[&str]) -> Vec<T> {
    found
        .into_iter()
        .filter(|obj| names.iter().any(|n| *n == obj.name()))
        .collect()
}
