use std::path::PathBuf;

/// Shared state handed to every command
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    /// `--config` override; `None` means the platform default location
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }
}

/// A CLI command
#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Output: std::fmt::Display + std::fmt::Debug + Send;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

/// Declare a command table
///
/// Each `(Variant, Type)` pair becomes a `Command` subcommand whose output
/// and error are wrapped in the generated `OpOutput` / `OpError` enums.
/// `Command` itself implements [`Op`] by dispatching to the variant.
/// Attributes such as `#[cfg(...)]` on a pair apply to everything
/// generated for it.
#[macro_export]
macro_rules! command_enum {
    ($($(#[$meta:meta])* ($variant:ident, $ty:ty)),* $(,)?) => {
        #[derive(clap::Subcommand, Debug, Clone)]
        pub enum Command {
            $($(#[$meta])* $variant($ty),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($(#[$meta])* $variant(<$ty as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                $(#[$meta])*
                #[error(transparent)]
                $variant(<$ty as $crate::cli::op::Op>::Error),
            )*
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($(#[$meta])* OpOutput::$variant(output) => write!(f, "{}", output),)*
                }
            }
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Error = OpError;
            type Output = OpOutput;

            async fn execute(
                &self,
                ctx: &$crate::cli::op::OpContext,
            ) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        $(#[$meta])*
                        Command::$variant(op) => op
                            .execute(ctx)
                            .await
                            .map(OpOutput::$variant)
                            .map_err(OpError::$variant),
                    )*
                }
            }
        }
    };
}
