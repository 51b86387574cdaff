//! Shared types for the vSphere facade.
//!
//! Wire types mirror the vSphere Automation REST API: snake_case fields,
//! SCREAMING_SNAKE_CASE enum values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tracks an active vSphere API session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsphereSession {
    pub host: String,
    pub username: String,
    pub session_id: String,
    pub connected_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Return mode / lookup shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shape of the result produced by mode-dependent lookups such as
/// [`crate::vcenter::VCenter::get_vm`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReturnMode {
    /// First match, or nothing.
    Single,
    /// Every match, possibly none.
    #[default]
    Collection,
}

impl ReturnMode {
    pub fn from_single(single: bool) -> Self {
        if single {
            Self::Single
        } else {
            Self::Collection
        }
    }

    pub fn is_single(self) -> bool {
        self == Self::Single
    }
}

impl FromStr for ReturnMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "one" | "true" => Ok(Self::Single),
            "collection" | "all" | "false" => Ok(Self::Collection),
            other => Err(format!("unknown return mode '{other}'")),
        }
    }
}

/// Result of a mode-dependent lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Single(Option<T>),
    Collection(Vec<T>),
}

impl<T> Lookup<T> {
    /// Shape a list of matches according to `mode`.
    pub fn from_matches(mode: ReturnMode, matches: Vec<T>) -> Self {
        match mode {
            ReturnMode::Single => Self::Single(matches.into_iter().next()),
            ReturnMode::Collection => Self::Collection(matches),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(v) => usize::from(v.is_some()),
            Self::Collection(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first (or only) match.
    pub fn into_single(self) -> Option<T> {
        match self {
            Self::Single(v) => v,
            Self::Collection(v) => v.into_iter().next(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Single(v) => v.into_iter().collect(),
            Self::Collection(v) => v,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Lookup<U> {
        match self {
            Self::Single(v) => Lookup::Single(v.map(f)),
            Self::Collection(v) => Lookup::Collection(v.into_iter().map(f).collect()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM Power State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmPowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
    #[default]
    #[serde(other)]
    Unknown,
}

impl VmPowerState {
    /// SDK-style name (`poweredOn`, `poweredOff`, `suspended`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PoweredOn => "poweredOn",
            Self::PoweredOff => "poweredOff",
            Self::Suspended => "suspended",
            Self::Unknown => "unknown",
        }
    }

    /// Query-parameter value for the `power_states` list filter.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::PoweredOn => "POWERED_ON",
            Self::PoweredOff => "POWERED_OFF",
            Self::Suspended => "SUSPENDED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for VmPowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Concise VM summary (from GET /api/vcenter/vm).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmSummary {
    /// vSphere managed-object ID (e.g. "vm-42")
    pub vm: String,
    pub name: String,
    #[serde(default)]
    pub power_state: VmPowerState,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default, rename = "memory_size_MiB")]
    pub memory_size_mib: Option<u64>,
}

/// VM detail (from GET /api/vcenter/vm/{vm}). Only the fields the facade
/// surfaces are modelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmInfo {
    pub name: String,
    #[serde(default)]
    pub power_state: VmPowerState,
    #[serde(default, rename = "guest_OS")]
    pub guest_os: Option<String>,
    #[serde(default)]
    pub hardware: Option<VmHardware>,
    #[serde(default)]
    pub cpu: Option<VmCpu>,
    #[serde(default)]
    pub memory: Option<VmMemory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmHardware {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub upgrade_policy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmCpu {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub cores_per_socket: Option<u32>,
    #[serde(default)]
    pub hot_add_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmMemory {
    #[serde(default, rename = "size_MiB")]
    pub size_mib: Option<u64>,
    #[serde(default)]
    pub hot_add_enabled: Option<bool>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Inventory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatacenterSummary {
    pub datacenter: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FolderSummary {
    pub folder: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub folder_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSummary {
    pub network: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub network_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatastoreSummary {
    pub datastore: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub datastore_type: Option<String>,
    #[serde(default)]
    pub free_space: Option<u64>,
    #[serde(default)]
    pub capacity: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSummary {
    pub host: String,
    pub name: String,
    #[serde(default)]
    pub connection_state: Option<String>,
    #[serde(default)]
    pub power_state: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Snapshots
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotSummary {
    pub snapshot: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
    /// Power state of the VM when the snapshot was taken.
    #[serde(default)]
    pub power_state: Option<VmPowerState>,
    /// Parent snapshot id; `None` for a root of the snapshot tree.
    #[serde(default)]
    pub parent: Option<String>,
    /// Whether the VM is currently running from this snapshot.
    #[serde(default)]
    pub current: bool,
}

/// Fields changed by a snapshot rename. Unset fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSnapshotSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSnapshotSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Include guest memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<bool>,
    /// Quiesce the guest file system (requires VMware Tools).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiesce: Option<bool>,
}

/// Identifier returned by create endpoints. Newer API revisions return a
/// bare JSON string, older ones wrap it in `{"value": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdResponse {
    Bare(String),
    Wrapped { value: String },
}

impl IdResponse {
    pub(crate) fn into_id(self) -> String {
        match self {
            Self::Bare(id) | Self::Wrapped { value: id } => id,
        }
    }
}
