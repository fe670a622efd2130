use std::path::PathBuf;

use corvid_lang_backend::{CompileOptions, CompileTarget};
use corvid_lang_driver::{Compilation, Session, load_target, render_reports_io};

use crate::GlobalSettings;

/// Flags shared by every command that runs the backend.
#[derive(clap::Args)]
pub struct BackendArgs {
    /// Target description in TOML; defaults to a native target with tagged integers
    #[clap(long, value_name = "FILE")]
    target: Option<PathBuf>,
    /// Compile every declaration of the program's own files, reachable or not
    #[clap(long)]
    test_mode: bool,
    /// Record a breakpoint for every statement
    #[clap(long)]
    breakpoints: bool,
    /// Do not record breakpoints in library files
    #[clap(long, requires = "breakpoints")]
    just_my_code: bool,
    /// List the declarations reached by the final pass
    #[clap(long)]
    used_symbols: bool,
}

impl BackendArgs {
    pub fn options(&self) -> miette::Result<CompileOptions> {
        let target = match &self.target {
            Some(path) => load_target(path)?,
            None => CompileTarget::default(),
        };
        Ok(CompileOptions {
            target,
            test_mode: self.test_mode,
            breakpoints: self.breakpoints,
            just_my_code: self.just_my_code,
            compute_used_symbols: self.used_symbols,
        })
    }
}

/// Runs the backend and prints its diagnostics to stderr.
pub fn run_backend(
    session: &Session,
    args: &BackendArgs,
    settings: &GlobalSettings,
) -> miette::Result<Compilation> {
    let opts = args.options()?;
    let res = session.compile(&opts);
    if !res.diagnostics.is_empty() {
        let reports = session.reports(&res.diagnostics);
        render_reports_io(&mut std::io::stderr(), &reports, settings.colorize)
            .map_err(|_| miette::miette!("Failed to print diagnostics"))?;
    }
    Ok(res)
}
