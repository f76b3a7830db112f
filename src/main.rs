use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use multimutect::command::Commands;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Call(mut cmd) => cmd.try_execute(),
        Commands::Catenate(mut cmd) => cmd.try_execute(),
        Commands::Combine(mut cmd) => cmd.try_execute(),
        Commands::AddGroups(mut cmd) => cmd.try_execute(),
        Commands::Reorder(mut cmd) => cmd.try_execute(),
        Commands::Reindex(mut cmd) => cmd.try_execute(),
        Commands::MapqToZero(mut cmd) => cmd.try_execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }
    return ExitCode::SUCCESS;
}
