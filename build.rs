use std::process::Command;

const HASH_OVERRIDE_VAR: &str = "PROGRAM_DIRECTOR_GIT_HASH";

/// Short commit of the checkout, when building from one.
fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_owned()).filter(|h| !h.is_empty())
}

fn main() {
    // Container builds have no .git; they pass the hash in instead.
    let hash = std::env::var(HASH_OVERRIDE_VAR)
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(git_short_hash)
        .unwrap_or_else(|| "unknown".to_owned());
    println!("cargo:rustc-env=GIT_HASH={hash}");

    println!("cargo:rerun-if-env-changed={HASH_OVERRIDE_VAR}");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}
