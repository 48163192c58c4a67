mod api;
mod cli;
mod fleet;
mod router;
mod startup;
mod state;

use clap::Parser;

use crate::cli::{CliArgs, Command};

fn load_config() -> anyhow::Result<hashctl_core::Config> {
    hashctl_core::config::load_dotenv();
    let config = hashctl_core::Config::from_env();
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = load_config()?;
    config.log_summary();

    match args.command {
        Command::Import { path } => startup::import(&config, &path).await?,
        Command::RunOnce => {
            let store = startup::build_store(&config, args.fleet.as_deref()).await?;
            let controller = startup::build_controller(&config, store)?;
            startup::run_once(&controller).await?;
        }
        Command::Serve => {
            let store = startup::build_store(&config, args.fleet.as_deref()).await?;
            let controller = startup::build_controller(&config, store)?;
            startup::serve(&config, controller).await?;
        }
    }

    Ok(())
}
