use std::path::PathBuf;

use miette::IntoDiagnostic;

use corvid_lang_driver::{Session, write_ir};
use corvid_lang_printer::DEFAULT_WIDTH;

use super::options::{BackendArgs, run_backend};
use super::terminal;
use crate::GlobalSettings;

#[derive(clap::Args)]
pub struct Args {
    /// Type-checked program in JSON
    #[clap(value_parser, value_name = "FILE")]
    filepath: PathBuf,
    #[clap(flatten)]
    backend: BackendArgs,
    /// Write the IR to a file instead of stdout
    #[clap(long, short, value_name = "FILE")]
    output: Option<PathBuf>,
}

pub fn exec(cmd: Args, settings: &GlobalSettings) -> miette::Result<()> {
    let session = Session::open(&cmd.filepath)?;
    let bin = run_backend(&session, &cmd.backend, settings)?.into_binary()?;
    log::info!("Compiled {} procedures and {} vtables", bin.procs.len(), bin.vtables.len());
    match &cmd.output {
        Some(path) => write_ir(&bin, path, DEFAULT_WIDTH)?,
        None => terminal::print_binary(&bin, settings).into_diagnostic()?,
    }
    Ok(())
}
