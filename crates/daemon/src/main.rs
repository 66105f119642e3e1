use clap::Parser;
use owo_colors::OwoColorize;

use rmount_daemon::{logging, runtime};
use rmount_daemon::state::AppState;

mod cli;

use cli::op::{Op, OpContext};
use cli::Args;

fn main() {
    let result = runtime::block_on(run()).map_err(anyhow::Error::from);
    if let Err(e) = result.and_then(|ran| ran) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    // a broken config file is reported by the command itself
    let (level, log_dir) = match AppState::load(args.config.clone()) {
        Ok(state) => (state.config.log_level, state.config.log_dir),
        Err(_) => ("info".to_string(), None),
    };
    let _guard = logging::init(&level, log_dir.as_deref())?;

    let ctx = OpContext::new(args.config);
    let output = args.command.execute(&ctx).await?;
    println!("{}", output);
    Ok(())
}
