use std::fmt;

use serde::Serialize;

/// Version and build metadata baked in at compile time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub name: String,
    pub version: String,
    pub build_features: String,
    pub build_profile: String,
    pub target_os: String,
}

impl BuildInfo {
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_features: option_env!("BUILD_FEATURES").unwrap_or("none").to_string(),
            build_profile: option_env!("BUILD_PROFILE").unwrap_or("unknown").to_string(),
            target_os: std::env::consts::OS.to_string(),
        }
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.build_features.split(',').any(|f| f == feature)
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, {}, features: {})",
            self.name, self.version, self.target_os, self.build_profile, self.build_features
        )
    }
}
