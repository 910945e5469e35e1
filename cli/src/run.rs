use std::path::{Path, PathBuf};

use ink::{
    common::{source::Source, value::Value},
    config::Config,
    engine::Engine,
};

use crate::status::Status;

/// Loads the config file, if any, with command line flags taking precedence.
pub fn config(path: Option<&Path>, fold: bool) -> Result<Config, String> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.fold |= fold;
    Ok(config)
}

/// Runs a file to completion, returning the process exit code.
/// An error value left uncaught at the top level is reported and fails the run.
pub fn run(mut config: Config, path: PathBuf, args: Vec<String>) -> Result<i32, String> {
    config.args = std::iter::once(path.display().to_string())
        .chain(args)
        .collect();

    let mut engine = Engine::new(config);
    let value = engine.run_file(&path).map_err(|e| e.to_string())?;

    if let Some(code) = engine.exit_code() {
        return Ok(code);
    }

    match value {
        Value::Error(error) => {
            Status::fatal().log(&error.report());
            Ok(1)
        },
        _ => Ok(0),
    }
}

pub fn eval(config: Config, expression: String) -> Result<i32, String> {
    let source = Source::command_line(&expression)
        .map_err(|e| format!("Could not locate the working directory: {}", e))?;
    let mut engine = Engine::new(config);
    let value = engine.eval(source).map_err(|e| e.to_string())?;
    engine.drain().map_err(|e| e.to_string())?;

    if let Some(code) = engine.exit_code() {
        return Ok(code);
    }

    println!("{}", value);
    Ok(if value.is_error() { 1 } else { 0 })
}

pub fn dump(config: Config, path: PathBuf) -> Result<i32, String> {
    let source = Source::path(&path)
        .map_err(|e| format!("Could not read '{}': {}", path.display(), e))?;

    let engine = Engine::new(config);
    let program = engine.compile(&source).map_err(|e| e.to_string())?;

    print!("{}", program.dump());
    Status::success().log(&format!("compiled {} functions", program.functions.len()));
    Ok(0)
}
