use std::fmt;
use std::path::PathBuf;

use clap::Args;
use owo_colors::OwoColorize;

use rmount_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug)]
pub struct InitOutput {
    pub config_path: PathBuf,
    pub config: AppConfig,
}

impl fmt::Display for InitOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} config at {}",
            "Initialized".green().bold(),
            self.config_path.display().to_string().bold()
        )?;
        writeln!(f, "  {} {}", "Log level:".dimmed(), self.config.log_level)?;
        writeln!(
            f,
            "  {} {}s",
            "Unmount grace:".dimmed(),
            self.config.unmount_grace_secs
        )?;
        writeln!(
            f,
            "  {} {} bytes",
            "Read-ahead:".dimmed(),
            self.config.mount.max_read_ahead
        )?;
        write!(
            f,
            "  {} {} MB, {}s TTL",
            "Cache:".dimmed(),
            self.config.cache.max_size_mb,
            self.config.cache.ttl_secs
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = InitOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::init(ctx.config_path.clone(), self.force)?;

        Ok(InitOutput {
            config_path: state.config_path,
            config: state.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::op::{Op, OpContext};

    use super::*;

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::new(Some(dir.path().join("config.toml")));

        let output = Init { force: false }.execute(&ctx).await.unwrap();
        assert!(output.config_path.exists());
        assert!(output.to_string().contains("Initialized"));

        let err = Init { force: false }.execute(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            InitError::StateFailed(StateError::AlreadyExists(_))
        ));

        assert!(Init { force: true }.execute(&ctx).await.is_ok());
    }
}
