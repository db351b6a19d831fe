//! `repcrec` — drives a command script through a [`TransactionCoordinator`]
//! and prints the textual trace described in the external interface.

mod reporter;
mod script;

use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use clap::Parser;
use repcrec_core::SimulatorConfig;
use repcrec_engine::TransactionCoordinator;
use script::Line;
use tracing_subscriber::EnvFilter;

/// Run a RepCRec command script against a simulated replicated store.
#[derive(Debug, Parser)]
#[command(name = "repcrec", version, about)]
struct Cli {
    /// Path to a command script. Reads stdin if omitted.
    script: Option<std::path::PathBuf>,

    /// Raise the default log level to debug.
    #[arg(short, long)]
    verbose: bool,

    /// Number of sites in the simulated cluster.
    #[arg(long, default_value_t = 10)]
    sites: u8,

    /// Number of variables in the simulated cluster.
    #[arg(long, default_value_t = 20)]
    variables: u32,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    install_logging(cli.verbose);

    let text = match read_input(cli.script.as_deref()) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("repcrec: {err}");
            return ExitCode::FAILURE;
        }
    };

    let config = SimulatorConfig::new(cli.sites, cli.variables);
    let mut coordinator = TransactionCoordinator::new(config);

    for (line_no, raw) in text.lines().enumerate() {
        let line_no = line_no + 1;
        match script::parse_line(raw, line_no) {
            Ok(Line::Halt) => break,
            Ok(Line::Command(command)) => {
                for event in coordinator.step(command) {
                    for rendered in reporter::render(&event) {
                        println!("{rendered}");
                    }
                }
            }
            Err(err) => {
                eprintln!("repcrec: {err}");
                if !err.is_recoverable() {
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}

fn read_input(path: Option<&std::path::Path>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn install_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
