//! Milky command-line interface
//!
//! Loads a list of items (proxies, accounts, ...) into a shared library and
//! either prints how the library grows or runs concurrent workers against it.

mod commands;
mod config;
mod items;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::error;

use commands::inspect::InspectArgs;
use commands::simulate::SimulateArgs;

/// Milky resource pool driver
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grow a library from an item file and print its slots
    Inspect(InspectArgs),

    /// Run worker threads that borrow and return slots
    Simulate(SimulateArgs),
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn run(cli: &Cli) -> Result<String> {
    match &cli.command {
        Commands::Inspect(args) => commands::inspect::execute(args),
        Commands::Simulate(args) => commands::simulate::execute(args),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
