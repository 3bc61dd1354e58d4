//! Versioned symbol contract between the bridge and native artifacts
//!
//! This module is the single static declaration of what a compatible
//! artifact must export: symbol names, their boundary shapes, the status
//! code convention, and the layout of structured records. The loader
//! verifies an artifact against this declaration before any binding is
//! handed out; `girder-sample` implements it.

use crate::ffi::types::AbiType;

/// Contract revision the bridge was built against
///
/// An artifact reports its revision through `girder_abi_version()`; any
/// other value fails the load.
pub const ABI_VERSION: u32 = 1;

/// Status code: the call completed and out-parameters are valid
pub const STATUS_OK: i32 = 0;

/// Status code: the native side hit an unrecoverable fault
///
/// Any nonzero status is treated as a fault; this is the value compliant
/// artifacts return when their internal state can no longer be trusted.
pub const STATUS_FAULT: i32 = -1;

/// Layout revision of [`RawContextStats`], written by the native side
pub const STATS_LAYOUT_VERSION: u32 = 1;

// Exported symbol names
pub const SYM_ABI_VERSION: &str = "girder_abi_version";
pub const SYM_ADD: &str = "girder_add";
pub const SYM_GREETING: &str = "girder_greeting";
pub const SYM_STRING_FREE: &str = "girder_string_free";
pub const SYM_CTX_NEW: &str = "girder_ctx_new";
pub const SYM_CTX_FREE: &str = "girder_ctx_free";
pub const SYM_CTX_TOTAL: &str = "girder_ctx_total";
pub const SYM_CTX_ACCUMULATE: &str = "girder_ctx_accumulate";
pub const SYM_CTX_DIGEST: &str = "girder_ctx_digest";
pub const SYM_CTX_STATS: &str = "girder_ctx_stats";

/// Declared shape of one exported entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Exported symbol name
    pub symbol: &'static str,
    /// Parameter shapes in declaration order
    pub params: &'static [AbiType],
    /// Return shape
    pub ret: AbiType,
    /// Whether the operation mutates the handle it is called on
    pub mutates_handle: bool,
}

/// The full symbol contract, in the order artifacts document it
pub const CONTRACT: &[Signature] = &[
    Signature {
        symbol: SYM_ABI_VERSION,
        params: &[],
        ret: AbiType::U32,
        mutates_handle: false,
    },
    Signature {
        symbol: SYM_ADD,
        params: &[AbiType::U64, AbiType::U64],
        ret: AbiType::U64,
        mutates_handle: false,
    },
    Signature {
        symbol: SYM_GREETING,
        params: &[AbiType::CStr],
        ret: AbiType::CStr,
        mutates_handle: false,
    },
    Signature {
        symbol: SYM_STRING_FREE,
        params: &[AbiType::CStr],
        ret: AbiType::Void,
        mutates_handle: false,
    },
    Signature {
        symbol: SYM_CTX_NEW,
        params: &[],
        ret: AbiType::Handle,
        mutates_handle: false,
    },
    Signature {
        symbol: SYM_CTX_FREE,
        params: &[AbiType::Handle],
        ret: AbiType::Void,
        mutates_handle: true,
    },
    Signature {
        symbol: SYM_CTX_TOTAL,
        params: &[AbiType::Handle, AbiType::OutU64],
        ret: AbiType::Status,
        mutates_handle: false,
    },
    Signature {
        symbol: SYM_CTX_ACCUMULATE,
        params: &[AbiType::Handle, AbiType::U64, AbiType::OutU64],
        ret: AbiType::Status,
        mutates_handle: true,
    },
    Signature {
        symbol: SYM_CTX_DIGEST,
        params: &[AbiType::Handle, AbiType::Bytes, AbiType::OutU64],
        ret: AbiType::Status,
        mutates_handle: true,
    },
    Signature {
        symbol: SYM_CTX_STATS,
        params: &[AbiType::Handle, AbiType::OutStats],
        ret: AbiType::Status,
        mutates_handle: false,
    },
];

/// Look up the declared signature for an exported symbol
pub fn signature(symbol: &str) -> Option<&'static Signature> {
    CONTRACT.iter().find(|sig| sig.symbol == symbol)
}

/// Wire layout of the context statistics record
///
/// Written whole by the native side; the marshaller rejects any record
/// whose `layout_version` does not match [`STATS_LAYOUT_VERSION`] instead
/// of guessing at field meanings.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawContextStats {
    /// Must equal [`STATS_LAYOUT_VERSION`]
    pub layout_version: u32,
    /// Reserved; compliant artifacts write zero
    pub reserved: u32,
    /// Running accumulator total
    pub total: u64,
    /// Number of mutating operations applied
    pub operations: u64,
}

impl RawContextStats {
    /// An all-zero record for the native side to fill in
    pub fn zeroed() -> Self {
        Self {
            layout_version: 0,
            reserved: 0,
            total: 0,
            operations: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_covers_every_symbol_once() {
        let mut names: Vec<&str> = CONTRACT.iter().map(|sig| sig.symbol).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CONTRACT.len());
    }

    #[test]
    fn test_signature_lookup() {
        let sig = signature(SYM_CTX_DIGEST).unwrap();
        assert_eq!(
            sig.params,
            &[AbiType::Handle, AbiType::Bytes, AbiType::OutU64]
        );
        assert_eq!(sig.ret, AbiType::Status);
        assert!(sig.mutates_handle);

        assert!(signature("girder_unknown").is_none());
    }

    #[test]
    fn test_status_ops_return_status() {
        for sig in CONTRACT {
            if sig.params.iter().any(|p| p.is_out()) {
                assert_eq!(sig.ret, AbiType::Status, "{} must report status", sig.symbol);
            }
        }
    }

    #[test]
    fn test_raw_stats_layout_is_fixed() {
        // The record crosses the boundary by pointer; its size and field
        // order are part of the wire contract.
        assert_eq!(std::mem::size_of::<RawContextStats>(), 24);
        assert_eq!(std::mem::align_of::<RawContextStats>(), 8);
    }
}
