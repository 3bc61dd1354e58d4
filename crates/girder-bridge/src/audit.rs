//! Bridge audit logging
//!
//! Structured logging of bridge lifecycle events (artifact loads, handle
//! acquisition and release, poisoning) for monitoring and post-mortem
//! analysis of native faults.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Bridge lifecycle event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Native artifact loaded and verified
    ArtifactLoaded { path: PathBuf },
    /// Artifact load refused or failed
    LoadDenied { reason: String },
    /// Native resource acquired and registered with the guard
    HandleAcquired { id: u64 },
    /// Native resource released through the native free path
    HandleReleased { id: u64 },
    /// Handle poisoned by a native fault
    HandlePoisoned {
        id: u64,
        operation: &'static str,
        status: i32,
    },
}

impl fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeEvent::ArtifactLoaded { path } => {
                write!(f, "Artifact loaded: {}", path.display())
            }
            BridgeEvent::LoadDenied { reason } => {
                write!(f, "Artifact load denied: {}", reason)
            }
            BridgeEvent::HandleAcquired { id } => {
                write!(f, "Handle acquired: {}", id)
            }
            BridgeEvent::HandleReleased { id } => {
                write!(f, "Handle released: {}", id)
            }
            BridgeEvent::HandlePoisoned {
                id,
                operation,
                status,
            } => {
                write!(
                    f,
                    "Handle poisoned: {} ({} returned status {})",
                    id, operation, status
                )
            }
        }
    }
}

/// Audit log entry with timestamp
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Event timestamp (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// Bridge event
    pub event: BridgeEvent,
}

impl AuditEntry {
    /// Create a new audit entry with current timestamp
    pub fn new(event: BridgeEvent) -> Self {
        Self {
            timestamp: current_timestamp_ms(),
            event,
        }
    }

    /// Format as log line
    pub fn to_log_line(&self) -> String {
        format!("[{}] {}", self.timestamp, self.event)
    }
}

/// Get current Unix timestamp in milliseconds
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time before Unix epoch")
        .as_millis() as u64
}

/// Audit logger trait for customizable logging backends
pub trait AuditLogger: Send + Sync {
    /// Log a bridge event
    fn log(&self, event: BridgeEvent);

    /// Get all logged entries (for testing)
    fn entries(&self) -> Vec<AuditEntry>;

    /// Clear all logged entries (for testing)
    fn clear(&self);
}

/// In-memory audit logger
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLogger {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditLogger {
    /// Create a new in-memory audit logger
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl AuditLogger for MemoryAuditLogger {
    fn log(&self, event: BridgeEvent) {
        let entry = AuditEntry::new(event);
        self.entries.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Null audit logger (no-op, default)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditLogger;

impl NullAuditLogger {
    /// Create a new null audit logger
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for NullAuditLogger {
    fn log(&self, _event: BridgeEvent) {
        // No-op
    }

    fn entries(&self) -> Vec<AuditEntry> {
        Vec::new()
    }

    fn clear(&self) {
        // No-op
    }
}
