use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use common::MountOptions;
use rmount_daemon::state::{AppState, StateError};

use crate::cli::flags::MountFlags;
use crate::cli::op::{Op, OpContext};

/// Print the mount options a `mount` with these flags would use
#[derive(Args, Debug, Clone)]
pub struct Options {
    /// Device name to report (defaults to the source path when mounting)
    #[arg(long, default_value = "rmount")]
    pub device: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub flags: MountFlags,
}

#[derive(Debug)]
pub struct OptionsOutput {
    pub options: MountOptions,
    pub json: bool,
}

impl fmt::Display for OptionsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.json {
            let tokens = serde_json::to_string_pretty(&self.options.tokens())
                .map_err(|_| fmt::Error)?;
            return write!(f, "{}", tokens);
        }

        writeln!(f, "{} {}", "-o".dimmed(), self.options)?;
        if self.options.debug() {
            writeln!(f, "  {} {}", "debug:".dimmed(), "on".yellow())?;
        }
        for (i, token) in self.options.tokens().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}", token)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("config error: {0}")]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl Op for Options {
    type Error = OptionsError;
    type Output = OptionsOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let mut state = AppState::load(ctx.config_path.clone())?;
        self.flags.apply_to(&mut state.config);

        Ok(OptionsOutput {
            options: MountOptions::build(&state.config.mount, &self.device),
            json: self.json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(flags: MountFlags, json: bool) -> Options {
        Options {
            device: "dev".to_string(),
            json,
            flags,
        }
    }

    #[tokio::test]
    async fn test_options_reflect_flags() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::new(Some(dir.path().join("config.toml")));
        let flags = MountFlags {
            read_only: true,
            ..Default::default()
        };

        let output = options(flags, false).execute(&ctx).await.unwrap();
        let tokens = output.options.tokens();
        assert_eq!(tokens.last().map(String::as_str), Some("ro"));
        assert!(tokens.contains(&"fsname=dev".to_string()));
    }

    #[tokio::test]
    async fn test_json_output_is_a_token_list() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::new(Some(dir.path().join("config.toml")));

        let output = options(MountFlags::default(), true)
            .execute(&ctx)
            .await
            .unwrap();
        let parsed: Vec<String> = serde_json::from_str(&output.to_string()).unwrap();
        assert_eq!(parsed, output.options.tokens());
        assert_eq!(parsed[1], "subtype=rmount");
    }
}
