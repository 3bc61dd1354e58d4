//! Resource guard - single-owner lifetime for native handles
//!
//! Every resource the native side allocates is tracked here as a slot with
//! a state machine (`Live -> Released | Poisoned`, both terminal) and a
//! per-slot mutex. The mutex serializes every native call made through one
//! handle, because the native resource behind it is not assumed to be
//! reentrant-safe; calls through distinct handles proceed concurrently.
//!
//! Callers never see the raw native pointer. They hold an opaque
//! [`NativeHandle`] token carrying a slot id and a generation counter;
//! transferring ownership bumps the generation, so stale tokens are
//! rejected instead of silently aliasing the resource.

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Handle lifecycle errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// Handle was already released
    #[error("handle {id} used after release")]
    UseAfterRelease { id: u64 },

    /// Handle was poisoned by a native fault
    #[error("handle {id} is poisoned after a native fault")]
    Poisoned { id: u64 },

    /// Token is stale: ownership of the handle was transferred
    #[error("stale token for handle {id}: ownership was transferred")]
    OwnershipConflict { id: u64 },

    /// Token does not belong to this guard
    #[error("unknown handle {id}")]
    Unknown { id: u64 },
}

/// Opaque token for a native resource
///
/// Deliberately neither `Clone` nor `Copy`: exactly one logical owner
/// exists at a time, and [`ResourceGuard::transfer`] is the only way to
/// hand that ownership on.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct NativeHandle {
    id: u64,
    generation: u32,
}

impl NativeHandle {
    /// Stable identifier, usable for logging and diagnostics
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Native destructor invoked exactly once when a live handle is released
pub type Destructor = unsafe extern "C" fn(*mut c_void);

/// Result of a native call made under a handle's lock
#[derive(Debug)]
pub enum CallOutcome<T> {
    /// The call completed; the handle stays live
    Success(T),
    /// The native side reported an unrecoverable fault (carries the raw
    /// status); the guard has already poisoned the handle
    Fault(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Live,
    Released,
    Poisoned,
}

struct Slot {
    state: SlotState,
    raw: *mut c_void,
    generation: u32,
    destructor: Destructor,
}

// Safety: the raw pointer is only ever dereferenced by the native side,
// and only while the slot mutex is held.
unsafe impl Send for Slot {}

/// Tracks every native handle issued by one bridge instance
pub struct ResourceGuard {
    slots: Mutex<HashMap<u64, Arc<Mutex<Slot>>>>,
    next_id: AtomicU64,
}

impl ResourceGuard {
    /// Create an empty guard
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a freshly allocated native resource
    ///
    /// The caller must have observed a successful allocation; the guard
    /// never issues a token for a resource that was not actually created.
    ///
    /// # Safety
    ///
    /// `raw` must be a live resource owned by this guard from now on, and
    /// `destructor` must be the matching native release entry point.
    pub unsafe fn register(&self, raw: *mut c_void, destructor: Destructor) -> NativeHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Slot {
            state: SlotState::Live,
            raw,
            generation: 0,
            destructor,
        };

        self.slots
            .lock()
            .unwrap()
            .insert(id, Arc::new(Mutex::new(slot)));

        NativeHandle { id, generation: 0 }
    }

    /// Run a native call against a live handle
    ///
    /// The slot mutex is held for the whole call, so two threads can never
    /// enter the native side through the same handle at once. `f` receives
    /// the raw resource pointer and reports the outcome; a fault outcome
    /// poisons the handle before this method returns.
    pub fn with_handle<T>(
        &self,
        handle: &NativeHandle,
        f: impl FnOnce(*mut c_void) -> CallOutcome<T>,
    ) -> Result<CallOutcome<T>, HandleError> {
        let slot = self.slot(handle.id)?;
        let mut slot = slot.lock().unwrap();

        self.check_usable(handle, &slot)?;

        let outcome = f(slot.raw);
        if let CallOutcome::Fault(_) = outcome {
            slot.state = SlotState::Poisoned;
        }

        Ok(outcome)
    }

    /// Release a handle's native resource
    ///
    /// Returns `true` when this call performed the release and `false`
    /// when the handle was already released (idempotent no-op). Poisoned
    /// handles refuse release: after an unrecoverable fault not even the
    /// native free path can be trusted, so the resource is leaked.
    pub fn release(&self, handle: &NativeHandle) -> Result<bool, HandleError> {
        let slot = self.slot(handle.id)?;
        let mut slot = slot.lock().unwrap();

        if slot.generation != handle.generation {
            return Err(HandleError::OwnershipConflict { id: handle.id });
        }

        match slot.state {
            SlotState::Live => {
                // Safety: the slot is live, so the resource exists and the
                // destructor came from the same artifact; the slot mutex
                // serializes this with any in-flight call.
                unsafe { (slot.destructor)(slot.raw) };
                slot.state = SlotState::Released;
                slot.raw = std::ptr::null_mut();
                Ok(true)
            }
            SlotState::Released => Ok(false),
            SlotState::Poisoned => Err(HandleError::Poisoned { id: handle.id }),
        }
    }

    /// Transfer ownership of a live handle to a new token
    ///
    /// Consumes the current token and invalidates any copy of it that
    /// escaped: the slot generation is bumped, so the old generation fails
    /// with `OwnershipConflict` from then on.
    pub fn transfer(&self, handle: NativeHandle) -> Result<NativeHandle, HandleError> {
        let slot = self.slot(handle.id)?;
        let mut slot = slot.lock().unwrap();

        self.check_usable(&handle, &slot)?;

        slot.generation = slot.generation.wrapping_add(1);
        Ok(NativeHandle {
            id: handle.id,
            generation: slot.generation,
        })
    }

    /// Number of handles currently live
    pub fn live_count(&self) -> usize {
        let slots = self.slots.lock().unwrap();
        slots
            .values()
            .filter(|slot| slot.lock().unwrap().state == SlotState::Live)
            .count()
    }

    fn slot(&self, id: u64) -> Result<Arc<Mutex<Slot>>, HandleError> {
        self.slots
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(HandleError::Unknown { id })
    }

    fn check_usable(&self, handle: &NativeHandle, slot: &Slot) -> Result<(), HandleError> {
        if slot.generation != handle.generation {
            return Err(HandleError::OwnershipConflict { id: handle.id });
        }

        match slot.state {
            SlotState::Live => Ok(()),
            SlotState::Released => Err(HandleError::UseAfterRelease { id: handle.id }),
            SlotState::Poisoned => Err(HandleError::Poisoned { id: handle.id }),
        }
    }
}

impl Default for ResourceGuard {
    fn default() -> Self {
        Self::new()
    }
}
