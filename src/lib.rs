//! Connection facade for VMware vCenter.
//!
//! Re-exports the [`vsf_vsphere`] client and adds process-wide logging
//! setup for binaries and tests that embed it.

pub mod logging;

pub use vsf_vsphere::*;
