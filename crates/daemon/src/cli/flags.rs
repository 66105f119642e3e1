use clap::Args;

use rmount_daemon::state::AppConfig;

/// Mount flags layered over the config file
///
/// Switches can only turn a setting on; leave them off to keep the file's
/// value.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct MountFlags {
    /// Kernel read-ahead in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_read_ahead: Option<u32>,

    /// Allow mounting over a non-empty directory
    #[arg(long)]
    pub allow_non_empty: bool,

    /// Allow access to other users
    #[arg(long)]
    pub allow_other: bool,

    /// Allow access to root
    #[arg(long)]
    pub allow_root: bool,

    /// Let the kernel enforce permission bits
    #[arg(long)]
    pub default_permissions: bool,

    /// Mount read-only
    #[arg(long)]
    pub read_only: bool,

    /// Let the kernel buffer writes
    #[arg(long)]
    pub writeback_cache: bool,

    /// Log every FUSE request
    #[arg(long)]
    pub debug_fuse: bool,

    /// Raw mount option (not supported, ignored with a warning)
    #[arg(short = 'o', long = "option", value_name = "OPT")]
    pub options: Vec<String>,

    /// Raw FUSE flag (not supported, ignored with a warning)
    #[arg(long = "fuse-flag", value_name = "FLAG", allow_hyphen_values = true)]
    pub fuse_flags: Vec<String>,

    /// Cache TTL for attributes and listings, in seconds
    #[arg(long, value_name = "SECS")]
    pub cache_ttl: Option<u32>,

    /// Seconds to wait for the serve loop after unmounting
    #[arg(long, value_name = "SECS")]
    pub unmount_grace: Option<u64>,
}

impl MountFlags {
    /// Override `config` with whatever was given on the command line
    pub fn apply_to(&self, config: &mut AppConfig) {
        let mount = &mut config.mount;
        if let Some(bytes) = self.max_read_ahead {
            mount.max_read_ahead = bytes;
        }
        mount.allow_non_empty |= self.allow_non_empty;
        mount.allow_other |= self.allow_other;
        mount.allow_root |= self.allow_root;
        mount.default_permissions |= self.default_permissions;
        mount.read_only |= self.read_only;
        mount.writeback_cache |= self.writeback_cache;
        mount.debug_transport |= self.debug_fuse;
        mount
            .extra_transport_options
            .extend(self.options.iter().cloned());
        mount
            .extra_transport_flags
            .extend(self.fuse_flags.iter().cloned());

        if let Some(ttl) = self.cache_ttl {
            config.cache.ttl_secs = ttl;
        }
        if let Some(grace) = self.unmount_grace {
            config.unmount_grace_secs = grace;
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        flags: MountFlags,
    }

    fn parse(args: &[&str]) -> MountFlags {
        Cli::parse_from(std::iter::once("rmount").chain(args.iter().copied())).flags
    }

    #[test]
    fn test_no_flags_keep_config() {
        let mut config = AppConfig::default();
        config.mount.read_only = true;
        config.cache.ttl_secs = 9;

        parse(&[]).apply_to(&mut config);

        assert!(config.mount.read_only);
        assert_eq!(config.cache.ttl_secs, 9);
        assert_eq!(config.mount.extra_transport_options, Vec::<String>::new());
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = AppConfig::default();
        parse(&[
            "--read-only",
            "--allow-other",
            "--max-read-ahead",
            "65536",
            "--debug-fuse",
            "-o",
            "uid=1000",
            "--option",
            "gid=1000",
            "--fuse-flag",
            "-d",
            "--cache-ttl",
            "5",
            "--unmount-grace",
            "2",
        ])
        .apply_to(&mut config);

        assert!(config.mount.read_only);
        assert!(config.mount.allow_other);
        assert!(!config.mount.allow_root);
        assert!(config.mount.debug_transport);
        assert_eq!(config.mount.max_read_ahead, 65536);
        assert_eq!(config.mount.extra_transport_options, ["uid=1000", "gid=1000"]);
        assert_eq!(config.mount.extra_transport_flags, ["-d"]);
        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.unmount_grace_secs, 2);
    }
}
