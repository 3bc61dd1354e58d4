//! Call marshalling - conversions at the native boundary
//!
//! Everything that changes representation on the way into or out of a
//! native call lives here:
//! - `MarshalContext`: tracks encoded C strings so they outlive the call
//! - `BorrowedBytes`: explicit-length byte buffers lent to the native side
//! - `NativeString`: native-owned strings released through the artifact's
//!   own free entry point, never the Rust allocator
//! - `ContextStats`: decoded form of the wire statistics record
//!
//! # Memory Safety
//!
//! - Encoded strings stay alive inside the `MarshalContext` for the full
//!   duration of the call they were encoded for
//! - A zero-length buffer marshals to a valid (null, 0) reference
//! - Native-owned strings are freed exactly once, on drop

use crate::abi::{RawContextStats, STATS_LAYOUT_VERSION};
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::os::raw::c_char;
use thiserror::Error;

/// Marshal error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// Record or value shape does not match the declared native shape
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Null pointer where a value was required
    #[error("null pointer from native side: {context}")]
    NullPointer { context: &'static str },

    /// Managed string cannot be represented as a C string
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// Native string is not valid UTF-8
    #[error("invalid UTF-8 in native string: {0}")]
    InvalidUtf8(String),
}

/// Marshal context for one native call
///
/// Tracks every C string encoded for the call so the backing allocations
/// remain valid and unmoved until the call returns.
///
/// # Example
///
/// ```
/// # use girder_bridge::ffi::marshal::MarshalContext;
/// let mut ctx = MarshalContext::new();
/// let ptr = ctx.encode_str("hello").unwrap();
/// assert!(!ptr.is_null());
/// // ptr stays valid until ctx is dropped
/// ```
#[derive(Default)]
pub struct MarshalContext {
    /// Encoded strings kept alive for the call duration
    cstrings: Vec<CString>,
}

impl MarshalContext {
    /// Create a new marshal context
    pub fn new() -> Self {
        Self {
            cstrings: Vec::new(),
        }
    }

    /// Encode a managed string as a borrowed, NUL-terminated C string
    ///
    /// The returned pointer is valid until the context is dropped.
    pub fn encode_str(&mut self, s: &str) -> Result<*const c_char, MarshalError> {
        let cstring = CString::new(s)
            .map_err(|e| MarshalError::InvalidString(format!("interior NUL byte: {}", e)))?;
        let ptr = cstring.as_ptr();
        self.cstrings.push(cstring);
        Ok(ptr)
    }

    /// Encode an optional string; `None` marshals to a null pointer
    pub fn encode_opt_str(&mut self, s: Option<&str>) -> Result<*const c_char, MarshalError> {
        match s {
            Some(s) => self.encode_str(s),
            None => Ok(std::ptr::null()),
        }
    }

    /// Number of strings currently kept alive
    pub fn encoded_count(&self) -> usize {
        self.cstrings.len()
    }
}

/// Borrowed byte buffer lent to the native side for one call
///
/// Carries an explicit length; the native side must never rely on a
/// terminator. A zero-length slice marshals to a null pointer with
/// length zero, which the contract defines as a valid empty reference.
pub struct BorrowedBytes<'a> {
    ptr: *const u8,
    len: usize,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> BorrowedBytes<'a> {
    /// Borrow a slice for the duration of a native call
    pub fn from_slice(data: &'a [u8]) -> Self {
        if data.is_empty() {
            Self {
                ptr: std::ptr::null(),
                len: 0,
                _marker: PhantomData,
            }
        } else {
            Self {
                ptr: data.as_ptr(),
                len: data.len(),
                _marker: PhantomData,
            }
        }
    }

    /// Pointer to pass across the boundary (null for empty buffers)
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Explicit buffer length
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Native-owned string taken across the boundary
///
/// Owns a `*mut c_char` allocated by the artifact and releases it through
/// the artifact's string-free entry point on drop. The managed side never
/// frees this allocation itself.
pub struct NativeString {
    ptr: *mut c_char,
    free: unsafe extern "C" fn(*mut c_char),
}

impl NativeString {
    /// Take ownership of a native-allocated string
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a NUL-terminated string allocated by the same
    /// artifact `free` belongs to, and must not be freed elsewhere.
    pub unsafe fn from_raw(ptr: *mut c_char, free: unsafe extern "C" fn(*mut c_char)) -> Self {
        Self { ptr, free }
    }

    /// Decode into an owned managed string, releasing the native allocation
    pub fn into_string(self) -> Result<String, MarshalError> {
        if self.ptr.is_null() {
            return Err(MarshalError::NullPointer {
                context: "native string",
            });
        }

        // Safety: the constructor contract guarantees a NUL-terminated
        // string; the copy completes before drop releases the allocation.
        let decoded = unsafe { CStr::from_ptr(self.ptr) }
            .to_str()
            .map(str::to_owned)
            .map_err(|e| MarshalError::InvalidUtf8(e.to_string()));

        decoded
    }
}

impl Drop for NativeString {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // Safety: ownership was transferred in from_raw; drop runs once.
            unsafe { (self.free)(self.ptr) };
        }
    }
}

/// Decoded context statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextStats {
    /// Running accumulator total
    pub total: u64,
    /// Number of mutating operations applied
    pub operations: u64,
}

impl TryFrom<RawContextStats> for ContextStats {
    type Error = MarshalError;

    /// Decode the wire record, rejecting unknown layouts instead of
    /// guessing at field meanings
    fn try_from(raw: RawContextStats) -> Result<Self, MarshalError> {
        if raw.layout_version != STATS_LAYOUT_VERSION {
            return Err(MarshalError::ShapeMismatch {
                expected: format!("stats layout v{}", STATS_LAYOUT_VERSION),
                got: format!("stats layout v{}", raw.layout_version),
            });
        }

        if raw.reserved != 0 {
            return Err(MarshalError::ShapeMismatch {
                expected: "zeroed reserved field".to_string(),
                got: format!("reserved = {:#x}", raw.reserved),
            });
        }

        Ok(Self {
            total: raw.total,
            operations: raw.operations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_encode_str_round_trips() {
        let mut ctx = MarshalContext::new();
        let ptr = ctx.encode_str("hello").unwrap();

        let read = unsafe { CStr::from_ptr(ptr) };
        assert_eq!(read.to_str().unwrap(), "hello");
    }

    #[test]
    fn test_encode_str_rejects_interior_nul() {
        let mut ctx = MarshalContext::new();
        let result = ctx.encode_str("hello\0world");
        assert!(matches!(result, Err(MarshalError::InvalidString(_))));
    }

    #[test]
    fn test_encode_opt_str_none_is_null() {
        let mut ctx = MarshalContext::new();
        let ptr = ctx.encode_opt_str(None).unwrap();
        assert!(ptr.is_null());
        assert_eq!(ctx.encoded_count(), 0);
    }

    #[test]
    fn test_context_keeps_strings_alive() {
        let mut ctx = MarshalContext::new();
        let first = ctx.encode_str("first").unwrap();
        let _second = ctx.encode_str("second").unwrap();

        // Pushing more strings must not invalidate earlier pointers.
        let read = unsafe { CStr::from_ptr(first) };
        assert_eq!(read.to_str().unwrap(), "first");
        assert_eq!(ctx.encoded_count(), 2);
    }

    #[test]
    fn test_borrowed_bytes_zero_length() {
        let buf = BorrowedBytes::from_slice(&[]);
        assert!(buf.as_ptr().is_null());
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_borrowed_bytes_points_at_data() {
        let data = vec![1u8, 2, 3];
        let buf = BorrowedBytes::from_slice(&data);
        assert_eq!(buf.as_ptr(), data.as_ptr());
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_empty());
    }

    #[test]
    fn test_native_string_decodes_and_frees() {
        static FREED: AtomicUsize = AtomicUsize::new(0);

        extern "C" fn record_free(ptr: *mut c_char) {
            FREED.fetch_add(1, Ordering::SeqCst);
            unsafe { drop(CString::from_raw(ptr)) };
        }

        let raw = CString::new("from native").unwrap().into_raw();
        let native = unsafe { NativeString::from_raw(raw, record_free) };

        assert_eq!(native.into_string().unwrap(), "from native");
        assert_eq!(FREED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_native_string_null_is_error_without_free() {
        static FREED: AtomicUsize = AtomicUsize::new(0);

        extern "C" fn record_free(_ptr: *mut c_char) {
            FREED.fetch_add(1, Ordering::SeqCst);
        }

        let native = unsafe { NativeString::from_raw(std::ptr::null_mut(), record_free) };
        assert!(matches!(
            native.into_string(),
            Err(MarshalError::NullPointer { .. })
        ));
        assert_eq!(FREED.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_native_string_freed_on_drop_without_decode() {
        static FREED: AtomicUsize = AtomicUsize::new(0);

        extern "C" fn record_free(ptr: *mut c_char) {
            FREED.fetch_add(1, Ordering::SeqCst);
            unsafe { drop(CString::from_raw(ptr)) };
        }

        let raw = CString::new("dropped").unwrap().into_raw();
        let native = unsafe { NativeString::from_raw(raw, record_free) };
        drop(native);

        assert_eq!(FREED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stats_decode() {
        let raw = RawContextStats {
            layout_version: STATS_LAYOUT_VERSION,
            reserved: 0,
            total: 100,
            operations: 7,
        };

        let stats = ContextStats::try_from(raw).unwrap();
        assert_eq!(stats.total, 100);
        assert_eq!(stats.operations, 7);
    }

    #[test]
    fn test_stats_rejects_unknown_layout() {
        let raw = RawContextStats {
            layout_version: STATS_LAYOUT_VERSION + 1,
            reserved: 0,
            total: 0,
            operations: 0,
        };

        assert!(matches!(
            ContextStats::try_from(raw),
            Err(MarshalError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_stats_rejects_dirty_reserved_field() {
        let raw = RawContextStats {
            layout_version: STATS_LAYOUT_VERSION,
            reserved: 0xdead,
            total: 0,
            operations: 0,
        };

        assert!(matches!(
            ContextStats::try_from(raw),
            Err(MarshalError::ShapeMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_encode_str_preserves_content(s in "[^\\x00]{0,64}") {
            let mut ctx = MarshalContext::new();
            let ptr = ctx.encode_str(&s).unwrap();
            let read = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap();
            prop_assert_eq!(read, s.as_str());
        }

        #[test]
        fn prop_borrowed_bytes_preserves_view(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let buf = BorrowedBytes::from_slice(&data);
            prop_assert_eq!(buf.len(), data.len());
            if data.is_empty() {
                prop_assert!(buf.as_ptr().is_null());
            } else {
                let view = unsafe { std::slice::from_raw_parts(buf.as_ptr(), buf.len()) };
                prop_assert_eq!(view, data.as_slice());
            }
        }
    }
}
