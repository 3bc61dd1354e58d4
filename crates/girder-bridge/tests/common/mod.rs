//! Shared fixture helpers for integration tests
//!
//! The sample artifact is built on demand by invoking the same cargo that
//! runs the tests; the produced cdylib path is parsed out of cargo's JSON
//! messages rather than guessed from target-dir layout.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Build the sample artifact and return the path to the produced cdylib
///
/// `incomplete` builds the variant missing `girder_ctx_digest`; pass a
/// scratch `target_dir` for it so the two variants never overwrite each
/// other.
pub fn build_sample_artifact(incomplete: bool, target_dir: Option<&Path>) -> PathBuf {
    let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());

    let mut cmd = Command::new(cargo);
    cmd.args(["build", "-p", "girder-sample", "--message-format=json"]);
    if incomplete {
        cmd.args(["--features", "girder-sample/incomplete"]);
    }
    if let Some(dir) = target_dir {
        cmd.arg("--target-dir").arg(dir);
    }

    let output = cmd.output().expect("failed to invoke cargo");
    assert!(
        output.status.success(),
        "sample artifact build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    artifact_from_messages(&String::from_utf8_lossy(&output.stdout))
        .expect("cargo produced no cdylib for girder-sample")
}

/// Find the girder-sample cdylib among cargo's compiler-artifact messages
fn artifact_from_messages(stdout: &str) -> Option<PathBuf> {
    let mut artifact = None;

    for line in stdout.lines() {
        let message: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => continue,
        };
        if message["reason"] != "compiler-artifact" {
            continue;
        }

        if let Some(filenames) = message["filenames"].as_array() {
            for file in filenames {
                if let Some(path) = file.as_str() {
                    let is_cdylib = path.ends_with(".so")
                        || path.ends_with(".dylib")
                        || path.ends_with(".dll");
                    if is_cdylib && path.contains("girder_sample") {
                        artifact = Some(PathBuf::from(path));
                    }
                }
            }
        }
    }

    artifact
}
