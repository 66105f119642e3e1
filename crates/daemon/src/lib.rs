// Program modules around the mount lifecycle in `common`
#[cfg(feature = "fuse")]
pub mod fuse;
pub mod logging;
pub mod runtime;
pub mod signals;

// App state (configuration, paths)
pub mod state;
pub mod version;

pub use state::{AppConfig, AppState, CacheSettings, StateError};
pub use version::BuildInfo;

/// Build info for this binary.
///
/// Reads BUILD_FEATURES from the daemon's own build script, so the feature
/// list reflects what the `rmount` binary was compiled with.
pub fn build_info() -> BuildInfo {
    BuildInfo::new()
}
