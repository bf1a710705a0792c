//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that pmassist-infra
//! implements. The core crate never depends on any specific storage
//! technology.

pub mod checkpoint;
pub mod memory;
pub mod prd;
