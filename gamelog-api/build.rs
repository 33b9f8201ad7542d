//! Stamps the binary with the identifiers logged at startup

use std::process::Command;

const UNKNOWN: &str = "unknown";

/// Short commit of the checkout, with a `-dirty` suffix for local changes
fn git_revision() -> Option<String> {
    let run = |args: &[&str]| {
        Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|out| out.status.success())
            .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
    };

    let hash = run(&["rev-parse", "--short=8", "HEAD"]).filter(|h| !h.is_empty())?;
    let dirty = run(&["status", "--porcelain", "--untracked-files=no"]).is_some_and(|s| !s.is_empty());
    Some(if dirty { format!("{}-dirty", hash) } else { hash })
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn main() {
    emit("GIT_HASH", git_revision().as_deref().unwrap_or(UNKNOWN));
    emit(
        "BUILD_TIMESTAMP",
        &chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    );
    emit("BUILD_PROFILE", &std::env::var("PROFILE").unwrap_or_else(|_| UNKNOWN.to_string()));
}
