//! One compilation of one program.

use std::fs;
use std::path::{Path, PathBuf};

use miette::{NamedSource, Report};

use corvid_lang_ast::Program;
use corvid_lang_backend::{CompileOptions, Diagnostic, compile};
use corvid_lang_ir::Binary;
use corvid_lang_printer::{PrintCfg, PrintToString};

use crate::load::load_program;
use crate::result::{DriverError, DriverResult};

pub struct Session {
    path: PathBuf,
    program: Program,
}

/// The outcome of running the backend once.
#[derive(Debug)]
pub struct Compilation {
    pub binary: Option<Binary>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn into_binary(self) -> DriverResult<Binary> {
        let count = self.error_count();
        self.binary.ok_or(DriverError::Compilation { count })
    }
}

impl Session {
    pub fn open(path: &Path) -> DriverResult<Self> {
        let program = load_program(path)?;
        Ok(Session { path: path.to_path_buf(), program })
    }

    pub fn from_program(path: &Path, program: Program) -> Self {
        Session { path: path.to_path_buf(), program }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn compile(&self, opts: &CompileOptions) -> Compilation {
        log::debug!("Compiling {} for {:?}", self.path.display(), opts.target);
        let res = compile(&self.program, opts);
        Compilation { binary: res.binary, diagnostics: res.diagnostics }
    }

    /// Turns diagnostics into reports, with the source text of their file attached
    /// when the program carries it.
    pub fn reports(&self, diagnostics: &[Diagnostic]) -> Vec<Report> {
        diagnostics.iter().map(|diag| self.report(diag)).collect()
    }

    fn report(&self, diag: &Diagnostic) -> Report {
        let report = Report::new(diag.clone());
        let Some(file) = diag.file.and_then(|f| self.program.files.get(f.index())) else {
            return report;
        };
        match &file.source {
            Some(source) => report.with_source_code(NamedSource::new(&file.name, source.clone())),
            None => report,
        }
    }
}

/// Renders procedures, vtables and the global layout.
pub fn ir_to_string(bin: &Binary, width: usize) -> String {
    let cfg = PrintCfg { width, ..Default::default() };
    bin.print_to_string(Some(&cfg))
}

pub fn write_ir(bin: &Binary, path: &Path, width: usize) -> DriverResult {
    fs::write(path, ir_to_string(bin, width))
        .map_err(|err| DriverError::Write { path: path.to_path_buf(), source: err.into() })
}

#[cfg(test)]
mod test {
    use corvid_lang_ast::{ExprKind, ProgramBuilder};
    use corvid_lang_miette_util::Span;

    use super::*;

    fn failing_program() -> Program {
        let mut b = ProgramBuilder::new();
        b.set_source("let x = typeof 1;\n");
        let string = b.string();
        let one = b.num(1.0);
        let bad = b.expr(ExprKind::TypeOf { expr: one }, string);
        let stmt = b.expr_stmt(bad);
        b.set_stmt_span(stmt, Span::new(8, 16));
        b.push_top_level(stmt);
        b.finish()
    }

    #[test]
    fn failed_compilation_has_no_binary() {
        let session = Session::from_program(Path::new("bad.json"), failing_program());
        let res = session.compile(&CompileOptions::default());
        assert_eq!(res.error_count(), 1);
        let err = res.into_binary().unwrap_err();
        assert!(matches!(err, DriverError::Compilation { count: 1 }));
    }

    #[test]
    fn reports_carry_source_code() {
        let session = Session::from_program(Path::new("bad.json"), failing_program());
        let res = session.compile(&CompileOptions::default());
        let reports = session.reports(&res.diagnostics);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].source_code().is_some());
        let out = crate::render_reports_to_string(&reports, corvid_lang_printer::ColorChoice::Never);
        assert!(out.contains("E9202"), "{out}");
        assert!(out.contains("typeof"), "{out}");
    }

    #[test]
    fn empty_program_compiles() {
        let session = Session::from_program(Path::new("empty.json"), ProgramBuilder::new().finish());
        let bin = session.compile(&CompileOptions::default()).into_binary().unwrap();
        let ir = ir_to_string(&bin, 80);
        assert!(ir.starts_with("proc _main"), "{ir}");
        assert!(ir.contains("; globals: 1 words"), "{ir}");
    }
}
