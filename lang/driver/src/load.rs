use std::fs;
use std::path::Path;

use corvid_lang_ast::Program;
use corvid_lang_backend::CompileTarget;

use crate::result::{DriverError, DriverResult};

/// Reads a type-checked program from its JSON serialization.
pub fn load_program(path: &Path) -> DriverResult<Program> {
    let text = fs::read_to_string(path).map_err(|err| DriverError::io(path, err))?;
    let prg = parse_program(&text)
        .map_err(|message| DriverError::Program { path: path.to_path_buf(), message })?;
    log::debug!(
        "Loaded {} with {} files and {} declarations",
        path.display(),
        prg.files.len(),
        prg.decls.len()
    );
    Ok(prg)
}

fn parse_program(text: &str) -> Result<Program, String> {
    let prg: Program = serde_json::from_str(text).map_err(|err| err.to_string())?;
    prg.validate()?;
    Ok(prg)
}

/// Reads a target description. Every key is optional.
pub fn load_target(path: &Path) -> DriverResult<CompileTarget> {
    let text = fs::read_to_string(path).map_err(|err| DriverError::io(path, err))?;
    let target: CompileTarget = toml::from_str(&text)
        .map_err(|err| DriverError::Target { path: path.to_path_buf(), message: err.to_string() })?;
    target.validate()?;
    Ok(target)
}
