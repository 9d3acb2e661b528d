use std::env;
use std::process::Command;
use time::OffsetDateTime;

fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");

    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    println!("cargo:rustc-env=APP_BUILD_YEAR={}", build_year());
    println!("cargo:rustc-env=APP_VERSION_DISPLAY={}", display_version(&version));
    println!("cargo:rustc-env=APP_VERSION_SEMVER={version}");
}

/// Reproducible builds pin the year through SOURCE_DATE_EPOCH
fn build_year() -> i32 {
    env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch).ok())
        .map(|dt| dt.year())
        .unwrap_or_else(|| OffsetDateTime::now_utc().year())
}

/// `X.Y.Z` on release builds or an exact `vX.Y.Z` tag, `X.Y.Z-dev` otherwise.
fn display_version(version: &str) -> String {
    if env::var("PROFILE").is_ok_and(|p| p == "release") {
        return version.to_string();
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");

    let tag = Command::new("git")
        .args(["describe", "--tags", "--exact-match"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string());

    if tag.as_deref() == Some(format!("v{version}").as_str()) {
        version.to_string()
    } else {
        format!("{version}-dev")
    }
}
