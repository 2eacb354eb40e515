mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use report_lookup::{api, config::Config, observability};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let config = match args.config {
                Some(path) => Config::load_with_path(path)?,
                None => Config::load()?,
            };
            observability::init_tracing(&config.telemetry);

            api::run(config, args.address).await?
        }
    }

    Ok(())
}
