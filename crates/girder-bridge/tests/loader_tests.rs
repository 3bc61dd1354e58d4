//! Loader verification failures against real artifacts
//!
//! These scenarios must observe the load gate before any successful load,
//! so they live in their own test process, separate from the happy-path
//! suite in bridge_tests.rs.

mod common;

use girder_bridge::abi;
use girder_bridge::ffi::loader::{self, LoadError};
use girder_config::NativeConfig;
use std::sync::Arc;

#[test]
fn test_artifact_not_found() {
    let config = NativeConfig::trusted("/nonexistent/libgirder_missing.so");
    assert!(matches!(
        loader::load(&config),
        Err(LoadError::ArtifactNotFound(_))
    ));
}

#[test]
fn test_incomplete_artifact_rejected_then_good_load_recovers() {
    // Variant built without girder_ctx_digest, in a scratch target dir so
    // it cannot clobber the canonical artifact.
    let scratch = tempfile::tempdir().unwrap();
    let incomplete = common::build_sample_artifact(true, Some(scratch.path()));

    match loader::load(&NativeConfig::trusted(&incomplete)) {
        Err(LoadError::SymbolMismatch { symbol }) => {
            assert_eq!(symbol, abi::SYM_CTX_DIGEST);
        }
        other => panic!("expected SymbolMismatch, got {:?}", other),
    }

    // The failed load produced no partial binding table: the gate is
    // still empty, so a compliant artifact loads fine afterwards.
    let good = common::build_sample_artifact(false, None);
    let table = loader::load(&NativeConfig::trusted(&good)).unwrap();
    assert_eq!(table.artifact_abi_version(), abi::ABI_VERSION);

    // Loading the same resolved path again returns the identical table.
    let again = loader::load(&NativeConfig::trusted(&good)).unwrap();
    assert!(Arc::ptr_eq(&table, &again));

    // With an artifact committed, a different path is refused outright.
    match loader::load(&NativeConfig::trusted(&incomplete)) {
        Err(LoadError::AlreadyLoaded { loaded, .. }) => {
            assert_eq!(loaded, table.path());
        }
        other => panic!("expected AlreadyLoaded, got {:?}", other),
    }
}
