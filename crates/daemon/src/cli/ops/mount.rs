use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use owo_colors::OwoColorize;

use common::{events, LifecycleError, MountLifecycle, VfsError};
use rmount_daemon::fuse::{FileCacheConfig, FuseTransport, MirrorFs};
use rmount_daemon::signals;
use rmount_daemon::state::{AppState, StateError};

use crate::cli::flags::MountFlags;
use crate::cli::op::{Op, OpContext};

#[derive(Args, Debug, Clone)]
pub struct Mount {
    /// Directory to mirror
    pub source: PathBuf,

    /// Where to mount it
    pub mount_point: PathBuf,

    #[command(flatten)]
    pub flags: MountFlags,
}

#[derive(Debug)]
pub struct MountOutput {
    pub source: PathBuf,
    pub mount_point: PathBuf,
}

impl fmt::Display for MountOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} from {}",
            "Unmounted".green().bold(),
            self.mount_point.display().to_string().bold(),
            self.source.display()
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("config error: {0}")]
    State(#[from] StateError),
    #[error("cannot mirror source: {0}")]
    Source(#[from] VfsError),
    #[error("failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

#[async_trait::async_trait]
impl Op for Mount {
    type Error = MountError;
    type Output = MountOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let mut state = AppState::load(ctx.config_path.clone())?;
        self.flags.apply_to(&mut state.config);
        let config = state.config;

        let vfs = Arc::new(MirrorFs::new(
            &self.source,
            FileCacheConfig::from(&config.cache),
        )?);
        let controller = MountLifecycle::new(
            FuseTransport::new(),
            vfs,
            self.mount_point.clone(),
            config.mount.clone(),
        )
        .with_unmount_grace(config.unmount_grace());

        let (sender, events) = events::channel(config.event_buffer);
        let forwarder = signals::forward(sender)?;

        tracing::info!(
            source = %self.source.display(),
            mount_point = %self.mount_point.display(),
            "serving until interrupted (SIGHUP clears the cache)"
        );
        let result = controller.run(events).await;
        forwarder.abort();
        result?;

        Ok(MountOutput {
            source: self.source.clone(),
            mount_point: self.mount_point.clone(),
        })
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mount {} {}",
            self.source.display(),
            self.mount_point.display()
        )
    }
}
