//! Bridge facade - the public surface of the native bridge
//!
//! One method per contract operation. Each method validates and encodes
//! its arguments through the marshaller, invokes the verified binding,
//! decodes the response, and routes every handle-lifecycle consequence
//! through the resource guard. Raw pointers, buffers, and status codes
//! never escape this module.

use crate::abi;
use crate::audit::{AuditLogger, BridgeEvent, NullAuditLogger};
use crate::ffi::guard::{CallOutcome, HandleError, NativeHandle, ResourceGuard};
use crate::ffi::loader::{self, BindingTable, LoadError};
use crate::ffi::marshal::{
    BorrowedBytes, ContextStats, MarshalContext, MarshalError, NativeString,
};
use girder_config::BridgeConfig;
use std::ffi::c_void;
use std::sync::Arc;
use thiserror::Error;

/// Classified failure of a bridge call
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Argument or response could not be marshalled; the handle (if any)
    /// is unaffected
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// Handle lifecycle violation; no native call was made
    #[error(transparent)]
    Handle(#[from] HandleError),

    /// The native side reported an unrecoverable fault; the handle the
    /// call was made on is now poisoned
    #[error("native fault during {operation} (status {status})")]
    NativeFault { operation: &'static str, status: i32 },
}

/// Result of a bridge call
pub type CallResult<T> = Result<T, BridgeError>;

/// The bridge facade
///
/// Composes the loader-produced binding table, the resource guard, and an
/// audit logger. Safe to share across threads; calls on one context are
/// serialized by the guard, calls on distinct contexts proceed
/// concurrently.
///
/// # Example
///
/// ```no_run
/// use girder_bridge::Bridge;
/// use girder_config::BridgeConfig;
///
/// let config = BridgeConfig::discover(std::path::Path::new(".")).unwrap();
/// let bridge = Bridge::open(&config).unwrap();
///
/// let sum = bridge.add(42, 58).unwrap();
/// assert_eq!(sum, 100);
///
/// let ctx = bridge.context_new().unwrap();
/// bridge.context_accumulate(&ctx, 7).unwrap();
/// bridge.context_release(&ctx).unwrap();
/// ```
pub struct Bridge {
    table: Arc<BindingTable>,
    guard: ResourceGuard,
    audit: Arc<dyn AuditLogger>,
}

impl Bridge {
    /// Load the configured artifact and build a bridge over it
    ///
    /// Fails fast with [`LoadError::CapabilityDenied`] when the config
    /// does not grant native access.
    pub fn open(config: &BridgeConfig) -> Result<Self, LoadError> {
        Self::open_with_audit(config, Arc::new(NullAuditLogger::new()))
    }

    /// Load the configured artifact, reporting lifecycle events to `audit`
    pub fn open_with_audit(
        config: &BridgeConfig,
        audit: Arc<dyn AuditLogger>,
    ) -> Result<Self, LoadError> {
        let table = match loader::load(&config.native) {
            Ok(table) => table,
            Err(err) => {
                audit.log(BridgeEvent::LoadDenied {
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        audit.log(BridgeEvent::ArtifactLoaded {
            path: table.path().to_path_buf(),
        });

        Ok(Self {
            table,
            guard: ResourceGuard::new(),
            audit,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_table(table: Arc<BindingTable>, audit: Arc<dyn AuditLogger>) -> Self {
        Self {
            table,
            guard: ResourceGuard::new(),
            audit,
        }
    }

    /// Binding table the bridge was built over
    pub fn binding_table(&self) -> &Arc<BindingTable> {
        &self.table
    }

    /// Number of live contexts
    pub fn live_contexts(&self) -> usize {
        self.guard.live_count()
    }

    /// Add two integers on the native side (pure)
    pub fn add(&self, left: u64, right: u64) -> CallResult<u64> {
        // Safety: symbol verified at load against the declared contract.
        Ok(unsafe { (self.table.bindings().add)(left, right) })
    }

    /// Fetch a greeting from the native side (pure)
    ///
    /// `None` asks for the artifact's default greeting. The returned
    /// string is allocated natively and released through the artifact's
    /// own free entry point before this method returns.
    pub fn greeting(&self, name: Option<&str>) -> CallResult<String> {
        let mut marshal = MarshalContext::new();
        let name_ptr = marshal.encode_opt_str(name)?;

        // Safety: symbol verified at load; name_ptr stays valid for the
        // call because the marshal context outlives it.
        let raw = unsafe { (self.table.bindings().greeting)(name_ptr) };

        // Safety: ownership of the native allocation transfers here; the
        // matching free entry point comes from the same artifact.
        let native = unsafe { NativeString::from_raw(raw, self.table.bindings().string_free) };
        Ok(native.into_string()?)
    }

    /// Allocate a native accumulator context
    pub fn context_new(&self) -> CallResult<NativeHandle> {
        // Safety: symbol verified at load.
        let raw = unsafe { (self.table.bindings().ctx_new)() };
        if raw.is_null() {
            return Err(MarshalError::NullPointer {
                context: "context allocation",
            }
            .into());
        }

        // Safety: allocation success was just observed; ctx_free is the
        // matching destructor from the same artifact.
        let handle = unsafe { self.guard.register(raw, self.table.bindings().ctx_free) };
        self.audit.log(BridgeEvent::HandleAcquired { id: handle.id() });
        Ok(handle)
    }

    /// Read the running total (pure on the handle)
    pub fn context_total(&self, handle: &NativeHandle) -> CallResult<u64> {
        let bindings = self.table.bindings();
        self.status_call(handle, abi::SYM_CTX_TOTAL, |raw| {
            let mut out = 0u64;
            // Safety: symbol verified at load; out lives across the call.
            let status = unsafe { (bindings.ctx_total)(raw, &mut out) };
            (status, out)
        })
    }

    /// Add a value to the running total (mutates the handle)
    ///
    /// A native overflow fault poisons the handle.
    pub fn context_accumulate(&self, handle: &NativeHandle, value: u64) -> CallResult<u64> {
        let bindings = self.table.bindings();
        self.status_call(handle, abi::SYM_CTX_ACCUMULATE, |raw| {
            let mut out = 0u64;
            // Safety: symbol verified at load; out lives across the call.
            let status = unsafe { (bindings.ctx_accumulate)(raw, value, &mut out) };
            (status, out)
        })
    }

    /// Fold a byte buffer into the running total (mutates the handle)
    ///
    /// The buffer is borrowed for the duration of the call with an
    /// explicit length; an empty buffer is legal.
    pub fn context_digest(&self, handle: &NativeHandle, data: &[u8]) -> CallResult<u64> {
        let buffer = BorrowedBytes::from_slice(data);
        let bindings = self.table.bindings();
        self.status_call(handle, abi::SYM_CTX_DIGEST, |raw| {
            let mut out = 0u64;
            // Safety: symbol verified at load; the buffer stays valid and
            // unmoved for the call because it borrows `data`.
            let status =
                unsafe { (bindings.ctx_digest)(raw, buffer.as_ptr(), buffer.len(), &mut out) };
            (status, out)
        })
    }

    /// Read context statistics (pure on the handle)
    pub fn context_stats(&self, handle: &NativeHandle) -> CallResult<ContextStats> {
        let bindings = self.table.bindings();
        let raw_stats = self.status_call(handle, abi::SYM_CTX_STATS, |raw| {
            let mut out = abi::RawContextStats::zeroed();
            // Safety: symbol verified at load; the record lives across the
            // call and is decoded only on success.
            let status = unsafe { (bindings.ctx_stats)(raw, &mut out) };
            (status, out)
        })?;

        Ok(ContextStats::try_from(raw_stats)?)
    }

    /// Release a context's native resource
    ///
    /// Idempotent: releasing an already-released context succeeds with no
    /// further effect. A poisoned context refuses release and its native
    /// resource is leaked.
    pub fn context_release(&self, handle: &NativeHandle) -> CallResult<()> {
        let released_now = self.guard.release(handle)?;
        if released_now {
            self.audit.log(BridgeEvent::HandleReleased { id: handle.id() });
        }
        Ok(())
    }

    /// Transfer ownership of a context to a new token
    ///
    /// Any reference to the old token that escaped is invalidated and
    /// fails with [`HandleError::OwnershipConflict`] from now on.
    pub fn context_transfer(&self, handle: NativeHandle) -> CallResult<NativeHandle> {
        Ok(self.guard.transfer(handle)?)
    }

    /// Allocate a context owned by a scope guard
    ///
    /// The context is released when the guard drops, unless it is handed
    /// on with [`Context::into_handle`].
    pub fn context(&self) -> CallResult<Context<'_>> {
        let handle = self.context_new()?;
        Ok(Context {
            bridge: self,
            handle: Some(handle),
        })
    }

    /// Run a status-convention native call under the handle's lock
    fn status_call<T>(
        &self,
        handle: &NativeHandle,
        operation: &'static str,
        f: impl FnOnce(*mut c_void) -> (i32, T),
    ) -> CallResult<T> {
        let outcome = self.guard.with_handle(handle, |raw| {
            let (status, value) = f(raw);
            if status == abi::STATUS_OK {
                CallOutcome::Success(value)
            } else {
                CallOutcome::Fault(status)
            }
        })?;

        match outcome {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Fault(status) => {
                self.audit.log(BridgeEvent::HandlePoisoned {
                    id: handle.id(),
                    operation,
                    status,
                });
                Err(BridgeError::NativeFault { operation, status })
            }
        }
    }
}

/// Scope-owned native context
///
/// Releases its context when dropped; release failures in drop are
/// ignored (release is idempotent and a poisoned context deliberately
/// leaks its resource).
pub struct Context<'b> {
    bridge: &'b Bridge,
    handle: Option<NativeHandle>,
}

impl Context<'_> {
    /// Token for the underlying context
    pub fn handle(&self) -> &NativeHandle {
        match &self.handle {
            Some(handle) => handle,
            // into_handle consumes self, so a live Context always holds one
            None => unreachable!("context already consumed"),
        }
    }

    /// Read the running total
    pub fn total(&self) -> CallResult<u64> {
        self.bridge.context_total(self.handle())
    }

    /// Add a value to the running total
    pub fn accumulate(&self, value: u64) -> CallResult<u64> {
        self.bridge.context_accumulate(self.handle(), value)
    }

    /// Fold a byte buffer into the running total
    pub fn digest(&self, data: &[u8]) -> CallResult<u64> {
        self.bridge.context_digest(self.handle(), data)
    }

    /// Read context statistics
    pub fn stats(&self) -> CallResult<ContextStats> {
        self.bridge.context_stats(self.handle())
    }

    /// Release the context now, reporting any failure
    pub fn close(mut self) -> CallResult<()> {
        match self.handle.take() {
            Some(handle) => self.bridge.context_release(&handle),
            None => Ok(()),
        }
    }

    /// Take the context out of scope ownership
    ///
    /// The caller becomes responsible for releasing the returned token.
    pub fn into_handle(mut self) -> NativeHandle {
        match self.handle.take() {
            Some(handle) => handle,
            None => unreachable!("context already consumed"),
        }
    }
}

impl Drop for Context<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.bridge.context_release(&handle);
        }
    }
}
