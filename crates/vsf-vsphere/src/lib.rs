//! # vsf-vsphere: VMware vCenter convenience facade
//!
//! A thin, typed client over the vSphere Automation REST API: open a
//! session, look managed objects up by name, and act on virtual machines.
//!
//! ## Modules
//!
//! - **types**: Wire and domain types (power state, summaries, lookups)
//! - **error**: Crate-specific error types
//! - **config**: Connection configuration (file / env / validation)
//! - **vsphere**: vSphere REST API HTTP client with session-based auth
//! - **inventory**: Exact-name inventory queries, optionally scoped to a folder or datacenter
//! - **vm**: Virtual machine view (power, guest operations, details)
//! - **snapshot**: Snapshot listing, creation, revert and removal
//! - **vcenter**: The `VCenter` connection facade
//! - **blocking**: Synchronous rendition of the facade

pub mod types;
pub mod error;
pub mod config;
pub mod vsphere;
pub mod inventory;
pub mod vm;
pub mod snapshot;
pub mod vcenter;
pub mod blocking;

pub use config::{Credential, VsphereConfig, VsphereConfigSafe};
pub use error::{VsphereError, VsphereErrorKind, VsphereResult};
pub use inventory::{InventoryObject, ObjectKind, Scope};
pub use types::{Lookup, ReturnMode, VmPowerState};
pub use vcenter::VCenter;
pub use vm::VirtualMachine;
