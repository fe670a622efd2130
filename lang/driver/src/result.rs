use std::path::PathBuf;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use corvid_lang_backend::BackendError;

pub type DriverResult<T = ()> = Result<T, DriverError>;

/// Everything that stops a compilation before or after the backend ran.
#[derive(Error, Diagnostic, Debug)]
pub enum DriverError {
    #[error("Could not read {}", path.display())]
    #[diagnostic(code("D-001"))]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("Could not write {}", path.display())]
    #[diagnostic(code("D-002"))]
    Write {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("Malformed program {}: {message}", path.display())]
    #[diagnostic(code("D-003"), help("programs are the JSON serialization of a type-checked program"))]
    Program { path: PathBuf, message: String },
    #[error("Malformed target description {}: {message}", path.display())]
    #[diagnostic(code("D-004"))]
    Target { path: PathBuf, message: String },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] Box<BackendError>),
    #[error("Compilation failed with {count} error(s)")]
    #[diagnostic(code("D-005"))]
    Compilation { count: usize },
}

impl DriverError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        DriverError::Io { path: path.into(), source: Arc::new(err) }
    }
}
