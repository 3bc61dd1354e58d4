//! Girder - a safe native-interoperation bridge
//!
//! Girder loads one natively-compiled shared artifact per process,
//! verifies its exported symbol contract before any call is possible, and
//! re-establishes at the boundary the guarantees the host side normally
//! gets for free:
//! - single ownership of every native resource, with idempotent release
//! - poisoning after native faults, so an untrusted resource is never
//!   touched again
//! - explicit marshalling (exact integer widths, explicit buffer lengths,
//!   native-owned allocations freed through the artifact's own free path)
//! - per-handle call serialization for non-reentrant native state
//!
//! The entry point is [`Bridge`], built from a [`girder_config::BridgeConfig`]
//! whose `[native]` table is the capability gate.

/// Girder bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod abi;
pub mod audit;
pub mod bridge;
pub mod ffi;

// Re-export commonly used types
pub use audit::{AuditEntry, AuditLogger, BridgeEvent, MemoryAuditLogger, NullAuditLogger};
pub use bridge::{Bridge, BridgeError, CallResult, Context};
pub use ffi::guard::{HandleError, NativeHandle};
pub use ffi::loader::{BindingTable, LoadError};
pub use ffi::marshal::{ContextStats, MarshalError};
