//! Build script for prtriage: embeds a human-readable version string.
//!
//! `BUILD_INFO_HUMAN` is `<crate version> (<git version>) <rustc version>`.
//! The git version is `git describe --tags --dirty` when a tag is
//! reachable, otherwise `v<crate version>-<timestamp>-<sha>[+dirty]`.
//! Clean trees use the commit time so that rebuilding the same commit gives
//! the same string; dirty trees use the build time.

use std::{env, process::Command};

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock"] {
        println!("cargo:rerun-if-changed={path}");
    }

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", build_info());
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `None` outside a git checkout. `.cargo-ok`, left behind by
/// `cargo install --git`, does not count as a change.
fn is_dirty() -> Option<bool> {
    run("git", &["status", "--porcelain"]).map(|status| {
        status
            .lines()
            .any(|line| line.get(3..).is_some_and(|path| path != ".cargo-ok"))
    })
    .or_else(|| run("git", &["rev-parse", "HEAD"]).map(|_| false))
}

fn pseudo_version() -> String {
    let sha = run("git", &["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let dirty = is_dirty();

    let commit_time = || {
        run("git", &["log", "-1", "--format=%ct"])
            .and_then(|secs| secs.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    };
    let timestamp = match dirty {
        Some(false) => commit_time().unwrap_or_else(Utc::now),
        _ => Utc::now(),
    }
    .format(TIMESTAMP_FORMAT);

    let suffix = if dirty == Some(true) { "+dirty" } else { "" };
    format!("v{}-{timestamp}-{sha}{suffix}", env!("CARGO_PKG_VERSION"))
}

fn git_version() -> String {
    match run("git", &["describe", "--tags", "--always", "--dirty"]) {
        // Without tags, describe falls back to a bare commit hash.
        Some(desc) if desc.contains('v') || desc.contains("-g") => desc,
        _ => pseudo_version(),
    }
}

fn build_info() -> String {
    let mut parts = vec![env::var("CARGO_PKG_VERSION").unwrap_or_default()];
    parts.push(format!("({})", git_version()));
    if let Some(rustc) = run("rustc", &["--version"]) {
        parts.push(rustc);
    }
    parts.join(" ")
}
