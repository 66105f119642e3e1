pub mod flags;
pub mod op;
pub mod ops;

use std::path::PathBuf;

use clap::Parser;

use self::ops::*;

crate::command_enum! {
    /// Mirror a directory at a mount point until interrupted
    #[cfg(feature = "fuse")]
    (Mount, Mount),
    /// Show the mount options the given flags produce
    (Options, Options),
    /// Write a default config file
    (Init, Init),
    /// Print version and build information
    (Version, Version),
}

#[derive(Parser, Debug)]
#[command(name = "rmount", version, about = "Mount a directory through FUSE and keep it served")]
pub struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "RMOUNT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}
