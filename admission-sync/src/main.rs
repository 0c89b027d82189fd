mod api;
mod cli;
mod config;
mod errors;
mod export;
mod ingest;
mod services;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use colored::*;

use cli::{Cli, Commands};
use config::Config;

const EXIT_PASS: u8 = 0;
const EXIT_FAIL: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(true) => ExitCode::from(EXIT_PASS),
        Ok(false) => ExitCode::from(EXIT_FAIL),
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("{} {}", "Error:".red().bold(), e);
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {}", cause);
            }
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

async fn run(cli: Cli) -> Result<bool> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect(args) => cli::commands::inspect::handle_inspect_command(args, config).await,
        Commands::Verify(args) => cli::commands::verify::handle_verify_command(args, config).await,
        Commands::Update(args) => cli::commands::update::handle_update_command(args, config).await,
    }
}
