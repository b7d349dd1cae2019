#![deny(unsafe_code)]
pub mod commands;
mod version;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches};
use clap::builder::styling::{AnsiColor, Effects, Styles};
use commands::command::Command;
use commands::verify::Verify;
use env_logger::Env;
use log::info;

/// Custom styles for CLI help output
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Capture full command line BEFORE clap parsing for @PG records
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");

    let parsed = Verify::command()
        .styles(STYLES)
        .try_get_matches()
        .and_then(|matches| Verify::from_arg_matches(&matches));
    let command = match parsed {
        Ok(command) => command,
        Err(e) => {
            use clap::error::ErrorKind;
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                e.exit();
            }
            // Usage errors exit with status 1 like every other fatal error
            let _ = e.print();
            std::process::exit(1);
        }
    };

    info!("Running bamverify version {}", version::VERSION.as_str());
    command.execute(&command_line)
}
