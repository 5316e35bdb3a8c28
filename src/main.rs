use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use telescope::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    match args.get_command() {
        cli::Commands::Start { port } => {
            // Tracing is initialized from the loaded configuration
            commands::start::execute(&args.config, port).await?;
        }
        cli::Commands::Config { action } => {
            init_tracing("warn", "text");
            match action {
                cli::ConfigCommands::Show => commands::config::show(&args.config)?,
                cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
            }
        }
        cli::Commands::Version => {
            println!("Telescope v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
