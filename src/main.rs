//! gpiblpt - GPIB controller on a PC parallel port
//!
//! Drives an IEEE-488 bus wired straight to a parallel port (no GPIB chip)
//! by bit-banging the data, status and control registers.
//!
//! # Architecture
//!
//! - `gpiblpt-core` implements the bus: register access, the three-wire
//!   handshake, interface commands and the controller operations
//! - providers supply raw port I/O: `lpt` (the real port through
//!   `/dev/port`) or `sim` (a simulated bus with instruments)
//!
//! Every subcommand opens the selected provider, runs one operation and
//! exits; `run` executes a whole script on one open bus.

mod cli;
mod commands;
mod providers;

use clap::Parser;
use cli::{Cli, Commands};
use std::time::Duration;

/// Log level forced by `-v`/`-vv`; `None` leaves `RUST_LOG` in charge
fn log_level(verbose: u8) -> Option<log::LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

fn main() {
    let cli = Cli::parse();

    // The filter is fixed once the logger is built
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = log_level(cli.verbose) {
        logger.filter_level(level);
    }
    logger.init();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<gpiblpt_core::Error>() {
            Some(err) => eprintln!("{}: {}", err.id(), err),
            None => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let timeout = Duration::from_millis(u64::from(cli.timeout));

    match &cli.command {
        Commands::ListProviders => {
            commands::list_providers();
            return Ok(());
        }
        Commands::ListOperations => {
            commands::list_operations();
            return Ok(());
        }
        _ => {}
    }

    // Validate arguments before touching the bus
    let operation = commands::operation(&cli.command)?;
    let mut bus = providers::open_bus(&cli.provider)?;

    match (cli.command, operation) {
        (_, Some(operation)) => commands::run_operation(&mut bus, operation, timeout),
        (Commands::Poll { addresses }, None) => commands::run_poll(&mut bus, &addresses, timeout),
        (Commands::Run { script, keep_going }, None) => {
            commands::run::cmd_run(&mut bus, script.as_deref(), keep_going)
        }
        _ => Ok(()),
    }
}
