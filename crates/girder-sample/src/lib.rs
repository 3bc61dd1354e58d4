//! Reference native artifact for the girder bridge
//!
//! Implements the full symbol contract declared in `girder_bridge::abi`:
//! an accumulator context plus the pure `add` and `greeting` entry
//! points. Built as a `cdylib`, it is what the loader verification and
//! integration tests run against, and it documents by example what a
//! compliant artifact looks like.
//!
//! Status convention: every context operation returns `STATUS_OK` and
//! writes its out-parameter, or returns `STATUS_FAULT` and leaves the
//! out-parameter untouched. Once a context has faulted its state is
//! untrusted and every further operation on it also faults.

use girder_bridge::abi::{
    RawContextStats, ABI_VERSION, STATS_LAYOUT_VERSION, STATUS_FAULT, STATUS_OK,
};
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::sync::atomic::{AtomicIsize, Ordering};

#[cfg(not(feature = "incomplete"))]
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Count of greeting strings currently owned by callers; drops back to
/// zero when every allocation came back through `girder_string_free`.
static LIVE_STRINGS: AtomicIsize = AtomicIsize::new(0);

/// Number of native-owned strings not yet freed
pub fn live_strings() -> isize {
    LIVE_STRINGS.load(Ordering::SeqCst)
}

/// Accumulator context behind `girder_ctx_*`
struct Accumulator {
    total: u64,
    operations: u64,
    corrupt: bool,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            total: 0,
            operations: 0,
            corrupt: false,
        }
    }
}

unsafe fn ctx_ref<'a>(raw: *mut c_void) -> Option<&'a Accumulator> {
    (raw as *const Accumulator).as_ref()
}

unsafe fn ctx_mut<'a>(raw: *mut c_void) -> Option<&'a mut Accumulator> {
    (raw as *mut Accumulator).as_mut()
}

/// Contract revision implemented by this artifact
#[no_mangle]
pub extern "C" fn girder_abi_version() -> u32 {
    ABI_VERSION
}

/// Wrapping 64-bit addition
#[no_mangle]
pub extern "C" fn girder_add(left: u64, right: u64) -> u64 {
    left.wrapping_add(right)
}

/// Returns a NUL-terminated greeting the caller must release with
/// `girder_string_free`
///
/// A null or empty `name` yields the default greeting.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string valid for the call.
#[no_mangle]
pub extern "C" fn girder_greeting(name: *const c_char) -> *mut c_char {
    let text = if name.is_null() {
        "Hello, world!".to_string()
    } else {
        // Safety: non-null per the contract; lossy decoding keeps the
        // entry point total for malformed input.
        let name = unsafe { CStr::from_ptr(name) }.to_string_lossy();
        if name.is_empty() {
            "Hello, world!".to_string()
        } else {
            format!("Hello, {}!", name)
        }
    };

    match CString::new(text) {
        Ok(s) => {
            LIVE_STRINGS.fetch_add(1, Ordering::SeqCst);
            s.into_raw()
        }
        Err(_) => std::ptr::null_mut(),
    }
}

/// Frees a string previously returned by `girder_greeting`
///
/// Null is a no-op.
///
/// # Safety
///
/// `s` must be null or a pointer obtained from this artifact and not yet
/// freed.
#[no_mangle]
pub extern "C" fn girder_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    LIVE_STRINGS.fetch_sub(1, Ordering::SeqCst);
    // Safety: reconstructing the CString hands the allocation back to the
    // allocator it came from.
    unsafe { drop(CString::from_raw(s)) };
}

/// Allocates a fresh accumulator context; null on allocation failure
#[no_mangle]
pub extern "C" fn girder_ctx_new() -> *mut c_void {
    Box::into_raw(Box::new(Accumulator::new())) as *mut c_void
}

/// Releases a context previously returned by `girder_ctx_new`
///
/// Null is a no-op.
///
/// # Safety
///
/// `ctx` must be null or a live context pointer from this artifact.
#[no_mangle]
pub extern "C" fn girder_ctx_free(ctx: *mut c_void) {
    if ctx.is_null() {
        return;
    }
    // Safety: ownership returns to the Box it came from.
    unsafe { drop(Box::from_raw(ctx as *mut Accumulator)) };
}

/// Writes the running total to `out`
///
/// # Safety
///
/// `ctx` must be a live context pointer; `out` must be valid for writes.
#[no_mangle]
pub extern "C" fn girder_ctx_total(ctx: *mut c_void, out: *mut u64) -> i32 {
    let acc = match unsafe { ctx_ref(ctx) } {
        Some(acc) if !acc.corrupt => acc,
        _ => return STATUS_FAULT,
    };
    if out.is_null() {
        return STATUS_FAULT;
    }

    // Safety: out checked non-null above.
    unsafe { *out = acc.total };
    STATUS_OK
}

/// Adds `value` to the running total and writes the new total to `out`
///
/// Overflow corrupts the context: the call faults and so does every
/// later operation on the same context.
///
/// # Safety
///
/// `ctx` must be a live context pointer; `out` must be valid for writes.
#[no_mangle]
pub extern "C" fn girder_ctx_accumulate(ctx: *mut c_void, value: u64, out: *mut u64) -> i32 {
    let acc = match unsafe { ctx_mut(ctx) } {
        Some(acc) if !acc.corrupt => acc,
        _ => return STATUS_FAULT,
    };
    if out.is_null() {
        return STATUS_FAULT;
    }

    match acc.total.checked_add(value) {
        Some(total) => {
            acc.total = total;
            acc.operations += 1;
            // Safety: out checked non-null above.
            unsafe { *out = total };
            STATUS_OK
        }
        None => {
            acc.corrupt = true;
            STATUS_FAULT
        }
    }
}

/// Folds a byte buffer into the running total, FNV-1a style, and writes
/// the new total to `out`
///
/// The buffer carries an explicit length; a zero-length buffer (with a
/// possibly-null pointer) is valid and leaves the total unchanged.
///
/// # Safety
///
/// `data` must be valid for reads of `len` bytes when `len > 0`; `ctx`
/// must be a live context pointer; `out` must be valid for writes.
#[cfg(not(feature = "incomplete"))]
#[no_mangle]
pub extern "C" fn girder_ctx_digest(
    ctx: *mut c_void,
    data: *const u8,
    len: usize,
    out: *mut u64,
) -> i32 {
    let acc = match unsafe { ctx_mut(ctx) } {
        Some(acc) if !acc.corrupt => acc,
        _ => return STATUS_FAULT,
    };
    if out.is_null() {
        return STATUS_FAULT;
    }
    if len > 0 && data.is_null() {
        return STATUS_FAULT;
    }

    if len > 0 {
        // Safety: data checked non-null and valid for len bytes per the
        // contract.
        let bytes = unsafe { std::slice::from_raw_parts(data, len) };
        for byte in bytes {
            acc.total = (acc.total ^ u64::from(*byte)).wrapping_mul(FNV_PRIME);
        }
    }
    acc.operations += 1;

    // Safety: out checked non-null above.
    unsafe { *out = acc.total };
    STATUS_OK
}

/// Writes the context statistics record to `out`
///
/// # Safety
///
/// `ctx` must be a live context pointer; `out` must be valid for writes.
#[no_mangle]
pub extern "C" fn girder_ctx_stats(ctx: *mut c_void, out: *mut RawContextStats) -> i32 {
    let acc = match unsafe { ctx_ref(ctx) } {
        Some(acc) if !acc.corrupt => acc,
        _ => return STATUS_FAULT,
    };
    if out.is_null() {
        return STATUS_FAULT;
    }

    // Safety: out checked non-null above.
    unsafe {
        *out = RawContextStats {
            layout_version: STATS_LAYOUT_VERSION,
            reserved: 0,
            total: acc.total,
            operations: acc.operations,
        };
    }
    STATUS_OK
}
