mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Diagnostics go to stderr so stdout stays parseable
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Command::Notebook { cmd } => commands::notebook::run(&cli, cmd.clone()),
        Command::Note { cmd } => commands::note::run(&cli, cmd.clone()),
        Command::History { cmd } => commands::history::run(&cli, cmd.clone()),
        Command::Trash { cmd } => commands::trash::run(&cli, cmd.clone()),
        Command::Remote { cmd } => commands::remote::run(&cli, cmd.clone()),
        Command::Config { cmd } => commands::config::run(&cli, cmd.clone()),
    };

    if let Err(e) = result {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}
