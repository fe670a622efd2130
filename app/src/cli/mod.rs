use clap::{Parser, Subcommand};

use crate::GlobalSettings;

mod check;
mod compile;
mod options;
mod terminal;

pub fn exec(settings: &GlobalSettings) -> miette::Result<()> {
    use Command::*;
    let cli = Cli::parse();
    match cli.command {
        Compile(args) => compile::exec(args, settings),
        Check(args) => check::exec(args, settings),
    }
}

#[derive(Parser)]
#[clap(version, author, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lower a program and print its IR
    Compile(compile::Args),
    /// Lower a program and only report diagnostics
    Check(check::Args),
}
