//! Artifact loading and symbol verification
//!
//! Loads the native shared artifact with `libloading`, verifies the full
//! symbol contract before any binding escapes, and enforces the
//! once-per-process load discipline: one artifact per process, mapped for
//! the process lifetime, never reloaded and never unloaded (unloading
//! while live handles reference the artifact is unsafe).

use crate::abi::{self, RawContextStats, ABI_VERSION};
use girder_config::NativeConfig;
use libloading::Library;
use std::ffi::c_void;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

/// Errors that can occur during artifact loading
#[derive(Debug, Error)]
pub enum LoadError {
    /// The native-access capability gate is closed
    #[error(
        "native access is not enabled; set [native] access = true in girder.toml \
         or GIRDER_NATIVE_ACCESS=1"
    )]
    CapabilityDenied,

    /// No artifact could be resolved from the configuration
    #[error("native artifact not found: {0}")]
    ArtifactNotFound(String),

    /// The artifact exists but could not be mapped
    #[error("failed to load native artifact {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    /// A contract symbol is missing from the artifact's exports
    #[error("exported symbol missing or unusable: {symbol}")]
    SymbolMismatch { symbol: &'static str },

    /// The artifact implements a different contract revision
    #[error("ABI version mismatch: bridge expects {expected}, artifact reports {found}")]
    AbiMismatch { expected: u32, found: u32 },

    /// A different artifact is already loaded in this process
    #[error("a different artifact is already loaded: {loaded} (requested {requested})")]
    AlreadyLoaded { loaded: PathBuf, requested: PathBuf },
}

/// Typed entry points resolved from the artifact
///
/// Shapes mirror `abi::CONTRACT` exactly; this struct is the static
/// declaration the artifact is verified against.
pub(crate) struct Bindings {
    pub(crate) abi_version: unsafe extern "C" fn() -> u32,
    pub(crate) add: unsafe extern "C" fn(u64, u64) -> u64,
    pub(crate) greeting: unsafe extern "C" fn(*const c_char) -> *mut c_char,
    pub(crate) string_free: unsafe extern "C" fn(*mut c_char),
    pub(crate) ctx_new: unsafe extern "C" fn() -> *mut c_void,
    pub(crate) ctx_free: unsafe extern "C" fn(*mut c_void),
    pub(crate) ctx_total: unsafe extern "C" fn(*mut c_void, *mut u64) -> i32,
    pub(crate) ctx_accumulate: unsafe extern "C" fn(*mut c_void, u64, *mut u64) -> i32,
    pub(crate) ctx_digest: unsafe extern "C" fn(*mut c_void, *const u8, usize, *mut u64) -> i32,
    pub(crate) ctx_stats: unsafe extern "C" fn(*mut c_void, *mut RawContextStats) -> i32,
}

/// Immutable binding table for the loaded artifact
///
/// Built once, shared read-only by every caller; requires no locking. The
/// underlying library mapping lives inside and is kept alive for the
/// process lifetime by the load gate.
pub struct BindingTable {
    path: PathBuf,
    bindings: Bindings,
    _library: Option<Library>,
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTable")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl BindingTable {
    /// Path the artifact was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Contract revision the artifact reported at load time
    pub fn artifact_abi_version(&self) -> u32 {
        // Safety: the symbol was verified at load against the declared
        // contract and the mapping outlives self.
        unsafe { (self.bindings.abi_version)() }
    }

    /// Declared signature for one of the artifact's entry points
    pub fn signature(&self, symbol: &str) -> Option<&'static abi::Signature> {
        abi::signature(symbol)
    }

    pub(crate) fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Map the artifact and resolve the full contract, all-or-nothing
    fn open(path: &Path) -> Result<Self, LoadError> {
        // Safety: loading a shared artifact runs its initializers. The
        // capability gate has been checked, which is the embedder's
        // declaration that the artifact is trusted.
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::LoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        macro_rules! bind {
            ($symbol:expr, $ty:ty) => {{
                // Safety: the shape is the statically declared contract
                // shape; the ABI version probe below confirms the artifact
                // implements that contract revision.
                let symbol = unsafe { library.get::<$ty>($symbol.as_bytes()) }
                    .map_err(|_| LoadError::SymbolMismatch { symbol: $symbol })?;
                *symbol
            }};
        }

        let bindings = Bindings {
            abi_version: bind!(abi::SYM_ABI_VERSION, unsafe extern "C" fn() -> u32),
            add: bind!(abi::SYM_ADD, unsafe extern "C" fn(u64, u64) -> u64),
            greeting: bind!(
                abi::SYM_GREETING,
                unsafe extern "C" fn(*const c_char) -> *mut c_char
            ),
            string_free: bind!(abi::SYM_STRING_FREE, unsafe extern "C" fn(*mut c_char)),
            ctx_new: bind!(abi::SYM_CTX_NEW, unsafe extern "C" fn() -> *mut c_void),
            ctx_free: bind!(abi::SYM_CTX_FREE, unsafe extern "C" fn(*mut c_void)),
            ctx_total: bind!(
                abi::SYM_CTX_TOTAL,
                unsafe extern "C" fn(*mut c_void, *mut u64) -> i32
            ),
            ctx_accumulate: bind!(
                abi::SYM_CTX_ACCUMULATE,
                unsafe extern "C" fn(*mut c_void, u64, *mut u64) -> i32
            ),
            ctx_digest: bind!(
                abi::SYM_CTX_DIGEST,
                unsafe extern "C" fn(*mut c_void, *const u8, usize, *mut u64) -> i32
            ),
            ctx_stats: bind!(
                abi::SYM_CTX_STATS,
                unsafe extern "C" fn(*mut c_void, *mut RawContextStats) -> i32
            ),
        };

        // Safety: just resolved against the artifact's exports.
        let found = unsafe { (bindings.abi_version)() };
        if found != ABI_VERSION {
            return Err(LoadError::AbiMismatch {
                expected: ABI_VERSION,
                found,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            bindings,
            _library: Some(library),
        })
    }

    /// Build a table over in-process entry points, bypassing the artifact
    /// and the load gate entirely
    #[cfg(test)]
    pub(crate) fn in_process(bindings: Bindings) -> Arc<Self> {
        Arc::new(Self {
            path: PathBuf::from("<in-process>"),
            bindings,
            _library: None,
        })
    }
}

/// Process-wide load gate: at most one artifact per process
static GATE: OnceLock<Mutex<Option<Arc<BindingTable>>>> = OnceLock::new();

fn gate() -> &'static Mutex<Option<Arc<BindingTable>>> {
    GATE.get_or_init(|| Mutex::new(None))
}

/// Load the configured artifact and verify the symbol contract
///
/// Idempotent per process: loading the same resolved path again returns
/// the already-built table (pointer-identical `Arc`); a different path
/// while one is loaded fails with [`LoadError::AlreadyLoaded`]. A failed
/// load leaves the gate empty, so a later load may still succeed.
pub fn load(config: &NativeConfig) -> Result<Arc<BindingTable>, LoadError> {
    if !config.access_granted() {
        return Err(LoadError::CapabilityDenied);
    }

    let path = resolve_artifact(config)?;

    let mut gate = gate().lock().unwrap();
    if let Some(table) = gate.as_ref() {
        if table.path() == path {
            return Ok(Arc::clone(table));
        }
        return Err(LoadError::AlreadyLoaded {
            loaded: table.path().to_path_buf(),
            requested: path,
        });
    }

    let table = Arc::new(BindingTable::open(&path)?);
    *gate = Some(Arc::clone(&table));
    Ok(table)
}

/// Resolve the artifact path from the configuration
///
/// An explicit `artifact` path wins; otherwise `name` is expanded with
/// platform naming conventions and searched for in the configured search
/// paths followed by the current directory.
fn resolve_artifact(config: &NativeConfig) -> Result<PathBuf, LoadError> {
    if let Some(artifact) = &config.artifact {
        return canonicalize(artifact)
            .ok_or_else(|| LoadError::ArtifactNotFound(artifact.display().to_string()));
    }

    if let Some(name) = &config.name {
        let mut search_paths = config.search_paths.clone();
        if let Ok(cwd) = std::env::current_dir() {
            search_paths.push(cwd);
        }

        for dir in &search_paths {
            for file_name in platform_file_names(name) {
                if let Some(path) = canonicalize(&dir.join(file_name)) {
                    return Ok(path);
                }
            }
        }

        return Err(LoadError::ArtifactNotFound(name.clone()));
    }

    Err(LoadError::ArtifactNotFound(
        "no artifact path or name configured".to_string(),
    ))
}

fn canonicalize(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        std::fs::canonicalize(path).ok()
    } else {
        None
    }
}

/// Expand a bare library name with platform naming conventions
///
/// - Linux: lib{name}.so
/// - macOS: lib{name}.dylib, lib{name}.so
/// - Windows: {name}.dll
fn platform_file_names(name: &str) -> Vec<String> {
    let extensions: &[&str] = if cfg!(target_os = "windows") {
        &["dll"]
    } else if cfg!(target_os = "macos") {
        &["dylib", "so"]
    } else {
        &["so"]
    };

    let prefixes: &[&str] = if cfg!(target_os = "windows") {
        &["", "lib"]
    } else {
        &["lib", ""]
    };

    let mut names = Vec::new();
    for prefix in prefixes {
        for ext in extensions {
            names.push(format!("{}{}.{}", prefix, name, ext));
        }
    }
    names
}
