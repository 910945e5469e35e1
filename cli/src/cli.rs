use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "Ink", bin_name = "ink", about)]
pub struct Ink {
    /// A TOML file to load engine options from
    #[structopt(long, parse(from_os_str))]
    pub config: Option<PathBuf>,
    /// Fold constant expressions before running
    #[structopt(long)]
    pub fold: bool,
    /// Log more; repeat for more detail
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,
    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Runs a file, then every callback it schedules
    Run {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
        /// Passed to the program through `args()`
        args: Vec<String>,
    },
    /// Evaluates an expression and prints its value
    Eval { expression: String },
    /// Prints the bytecode a file compiles to
    Dump {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },
}
