use std::path::PathBuf;

use corvid_lang_driver::Session;

use super::options::{BackendArgs, run_backend};
use crate::GlobalSettings;

#[derive(clap::Args)]
pub struct Args {
    #[clap(value_parser, value_name = "FILE")]
    filepath: PathBuf,
    #[clap(flatten)]
    backend: BackendArgs,
}

pub fn exec(cmd: Args, settings: &GlobalSettings) -> miette::Result<()> {
    let session = Session::open(&cmd.filepath)?;
    run_backend(&session, &cmd.backend, settings)?.into_binary()?;
    println!("{} compiled successfully!", cmd.filepath.display());
    Ok(())
}
