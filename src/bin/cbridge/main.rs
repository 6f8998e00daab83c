//! cbridge CLI - bridge generation and link planning for C interop

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cbridge::util::diagnostic;
use cbridge::util::errors::BridgeError;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color;

    if let Err(e) = run(cli) {
        match e.downcast_ref::<BridgeError>() {
            Some(err) => diagnostic::emit(&err.to_diagnostic(), color),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("cbridge=debug")
    } else {
        EnvFilter::new("cbridge=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args),
        Commands::BuildAll(args) => commands::build_all::execute(args),
        Commands::Dynimport(args) => commands::dynimport::execute(args),
        Commands::Linkplan(args) => commands::linkplan::execute(args),
        Commands::Link(args) => commands::link::execute(args),
        Commands::Flags(args) => commands::flags::execute(args),
    }
}
