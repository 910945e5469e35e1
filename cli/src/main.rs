use structopt::StructOpt;

// argument parser and logging
pub mod cli;
pub mod status;

// command implementations
pub mod run;

use crate::{
    cli::{Command, Ink},
    status::{Logger, Status},
};

fn main() {
    let ink = Ink::from_args();

    let result = Logger::install(ink.verbose)
        .and_then(|_| run::config(ink.config.as_deref(), ink.fold))
        .and_then(|config| match ink.command {
            Command::Run { path, args } => run::run(config, path, args),
            Command::Eval { expression } => run::eval(config, expression),
            Command::Dump { path } => run::dump(config, path),
        });

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            Status::fatal().log(&e);
            std::process::exit(1);
        },
    }
}
