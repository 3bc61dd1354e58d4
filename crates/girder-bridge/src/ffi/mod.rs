//! Foreign Function Interface infrastructure
//!
//! The unsafe half of the bridge, isolated behind safe wrappers:
//! - Artifact loading and symbol verification (loader)
//! - Boundary type declarations (types)
//! - Value marshalling (marshal)
//! - Handle lifetime and per-handle call serialization (guard)
//!
//! # Safety
//!
//! All `unsafe` code in the crate lives in this module tree and in the
//! facade's call sites over the verified binding table.

pub mod guard;
pub mod loader;
pub mod marshal;
pub mod types;

pub use guard::{HandleError, NativeHandle, ResourceGuard};
pub use loader::{load, BindingTable, LoadError};
pub use marshal::{BorrowedBytes, ContextStats, MarshalContext, MarshalError, NativeString};
pub use types::AbiType;
