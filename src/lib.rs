pub mod app;
pub mod barrier;
pub mod core;

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Version line shown by `--version`, with build metadata
pub fn long_version() -> String {
    format!(
        "{} (git {}, built {})",
        env!("CARGO_PKG_VERSION"),
        GIT_HASH,
        BUILD_TIME
    )
}
