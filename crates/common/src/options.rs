//! Translation of mount configuration into transport option tokens
//!
//! [`MountConfig`] is what the operator asks for; [`MountOptions`] is the
//! ordered token list handed to the transport. Building is pure: the only
//! side effect is a warning when an option cannot be honoured.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Filesystem subtype reported to the kernel
pub const SUBTYPE: &str = "rmount";

/// Default kernel read-ahead, in bytes
pub const DEFAULT_MAX_READ_AHEAD: u32 = 128 * 1024;

/// Operator-facing mount configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MountConfig {
    /// Kernel read-ahead in bytes
    pub max_read_ahead: u32,
    /// Allow mounting over a non-empty directory
    pub allow_non_empty: bool,
    /// Allow access to other users
    pub allow_other: bool,
    /// Allow access to root
    pub allow_root: bool,
    /// Let the kernel enforce permission bits
    pub default_permissions: bool,
    /// Mount read-only
    pub read_only: bool,
    /// Let the kernel buffer writes
    pub writeback_cache: bool,
    /// Log every transport request
    pub debug_transport: bool,
    /// Raw `-o` options; not supported by this transport
    pub extra_transport_options: Vec<String>,
    /// Raw transport flags; not supported by this transport
    pub extra_transport_flags: Vec<String>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            max_read_ahead: DEFAULT_MAX_READ_AHEAD,
            allow_non_empty: false,
            allow_other: false,
            allow_root: false,
            default_permissions: false,
            read_only: false,
            writeback_cache: false,
            debug_transport: false,
            extra_transport_options: Vec::new(),
            extra_transport_flags: Vec::new(),
        }
    }
}

/// A single transport-level mount option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "option", content = "value", rename_all = "snake_case")]
pub enum MountOption {
    MaxReadAhead(u32),
    Subtype(String),
    FsName(String),
    VolumeName(String),
    NoAppleDouble,
    NoAppleXattr,
    AllowNonEmpty,
    AllowOther,
    AllowRoot,
    DefaultPermissions,
    ReadOnly,
    WritebackCache,
}

impl fmt::Display for MountOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountOption::MaxReadAhead(bytes) => write!(f, "max_readahead={}", bytes),
            MountOption::Subtype(name) => write!(f, "subtype={}", name),
            MountOption::FsName(name) => write!(f, "fsname={}", name),
            MountOption::VolumeName(name) => write!(f, "volname={}", name),
            MountOption::NoAppleDouble => write!(f, "noappledouble"),
            MountOption::NoAppleXattr => write!(f, "noapplexattr"),
            MountOption::AllowNonEmpty => write!(f, "nonempty"),
            MountOption::AllowOther => write!(f, "allow_other"),
            MountOption::AllowRoot => write!(f, "allow_root"),
            MountOption::DefaultPermissions => write!(f, "default_permissions"),
            MountOption::ReadOnly => write!(f, "ro"),
            MountOption::WritebackCache => write!(f, "writeback_cache"),
        }
    }
}

/// Ordered transport options derived from a [`MountConfig`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOptions {
    options: Vec<MountOption>,
    debug: bool,
}

impl MountOptions {
    /// Build the option list for mounting `device`
    ///
    /// Fixed options come first, then one token per enabled flag in
    /// declaration order. Extra raw options are dropped with a warning.
    pub fn build(config: &MountConfig, device: &str) -> Self {
        let mut options = vec![
            MountOption::MaxReadAhead(config.max_read_ahead),
            MountOption::Subtype(SUBTYPE.to_string()),
            MountOption::FsName(device.to_string()),
            MountOption::VolumeName(device.to_string()),
            MountOption::NoAppleDouble,
            MountOption::NoAppleXattr,
        ];

        let flags = [
            (config.allow_non_empty, MountOption::AllowNonEmpty),
            (config.allow_other, MountOption::AllowOther),
            (config.allow_root, MountOption::AllowRoot),
            (config.default_permissions, MountOption::DefaultPermissions),
            (config.read_only, MountOption::ReadOnly),
            (config.writeback_cache, MountOption::WritebackCache),
        ];
        options.extend(
            flags
                .into_iter()
                .filter_map(|(enabled, option)| enabled.then_some(option)),
        );

        if !config.extra_transport_options.is_empty() {
            tracing::warn!(
                ignored = ?config.extra_transport_options,
                "-o/--option not supported with this transport"
            );
        }
        if !config.extra_transport_flags.is_empty() {
            tracing::warn!(
                ignored = ?config.extra_transport_flags,
                "--fuse-flag not supported with this transport"
            );
        }

        Self {
            options,
            debug: config.debug_transport,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MountOption> {
        self.options.iter()
    }

    pub fn contains(&self, option: &MountOption) -> bool {
        self.options.contains(option)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Whether the transport should log every request it serves
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Option tokens in order, as they would appear after `-o`
    pub fn tokens(&self) -> Vec<String> {
        self.options.iter().map(ToString::to_string).collect()
    }
}

impl<'a> IntoIterator for &'a MountOptions {
    type Item = &'a MountOption;
    type IntoIter = std::slice::Iter<'a, MountOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.options.iter()
    }
}

impl fmt::Display for MountOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens().join(","))
    }
}
