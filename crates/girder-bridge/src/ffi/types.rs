//! Boundary type system - shapes values take when crossing into native code
//!
//! [`AbiType`] is the declarative side: the shape an argument or return
//! value is expected to have, as recorded in the symbol contract
//! (`abi::CONTRACT`). The runtime side is fully typed function pointers in
//! the binding table, so no dynamic value representation is needed; the
//! declared shapes exist so the contract can be inspected, documented, and
//! checked for internal consistency.

use serde::{Deserialize, Serialize};

/// Declared shape of a value at the native boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbiType {
    /// Unsigned 32-bit integer, passed by value
    U32,
    /// Unsigned 64-bit integer, passed by value
    U64,
    /// Status code (i32; 0 is success, nonzero is a fault)
    Status,
    /// NUL-terminated C string pointer
    ///
    /// Direction depends on position: a parameter is borrowed for the call,
    /// a return value is native-owned and must be released through the
    /// artifact's string-free entry point.
    CStr,
    /// Borrowed byte buffer: pointer plus explicit length
    ///
    /// A zero-length buffer is legal and marshals to a null pointer.
    Bytes,
    /// Opaque native resource pointer, never dereferenced by the bridge
    Handle,
    /// Out-parameter receiving a u64; written only on success
    OutU64,
    /// Out-parameter receiving a [`crate::abi::RawContextStats`] record
    OutStats,
    /// No value
    Void,
}

impl AbiType {
    /// Whether this shape is an out-parameter written by the native side
    pub fn is_out(&self) -> bool {
        matches!(self, AbiType::OutU64 | AbiType::OutStats)
    }

    /// Get a display name for this shape
    pub fn display_name(&self) -> &'static str {
        match self {
            AbiType::U32 => "u32",
            AbiType::U64 => "u64",
            AbiType::Status => "status",
            AbiType::CStr => "cstr",
            AbiType::Bytes => "bytes",
            AbiType::Handle => "handle",
            AbiType::OutU64 => "out u64",
            AbiType::OutStats => "out stats",
            AbiType::Void => "void",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_parameters() {
        assert!(AbiType::OutU64.is_out());
        assert!(AbiType::OutStats.is_out());
        assert!(!AbiType::U64.is_out());
        assert!(!AbiType::Handle.is_out());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(AbiType::U64.display_name(), "u64");
        assert_eq!(AbiType::CStr.display_name(), "cstr");
        assert_eq!(AbiType::OutStats.display_name(), "out stats");
    }

    #[test]
    fn test_serde_round_trip() {
        let shapes = vec![AbiType::U64, AbiType::Bytes, AbiType::OutU64];
        let json = serde_json::to_string(&shapes).unwrap();
        let back: Vec<AbiType> = serde_json::from_str(&json).unwrap();
        assert_eq!(shapes, back);
    }
}
