use std::process::Command;

/// `<crate version>+<short commit>[-dirty]`, or just the crate version
/// outside a git checkout
fn build_version() -> String {
    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();

    let commit = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    match commit {
        Some(commit) => {
            let dirty = Command::new("git")
                .args(["diff", "--quiet"])
                .output()
                .map(|o| !o.status.success())
                .unwrap_or(false);
            if dirty {
                format!("{version}+{commit}-dirty")
            } else {
                format!("{version}+{commit}")
            }
        }
        None => version,
    }
}

fn main() {
    println!("cargo:rustc-env=BUILD_VERSION={}", build_version());
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
}
