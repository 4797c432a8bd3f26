// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_CAPTURE_VERSION");

    // Packagers can pin the version string
    let version = match std::env::var("CAMERA_CAPTURE_VERSION") {
        Ok(v) => v,
        Err(_) => git_version().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `git describe` output normalised to `<version>[-<commits>-<hash>]`.
///
/// Returns `None` outside of a git checkout (e.g. a crates.io tarball).
fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if described.is_empty() {
        return None;
    }

    // A bare commit hash means there is no release tag yet
    if !described.starts_with('v') {
        return Some(format!("{}-{}", env!("CARGO_PKG_VERSION"), described));
    }

    Some(described.trim_start_matches('v').to_string())
}
