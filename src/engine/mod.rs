//! The engine ties the pipeline together:
//! it owns everything a running program can reach through natives,
//! compiles and runs source units against it,
//! and drains the callbacks left behind by background tasks.

pub mod tasks;

use std::{
    cell::RefCell,
    collections::HashMap,
    io::{self, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use thiserror::Error;

use crate::{
    common::{lambda::Program, source::Source, value::Value},
    compiler::{self, syntax::Syntax},
    config::Config,
    core::ffi_core,
    vm::{scope::Scope, trace::Trace, vm::VM},
};
use tasks::Tasks;

/// Everything that can stop an engine from finishing a program.
/// Error values raised by programs are not among them;
/// those are ordinary values.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Syntax(#[from] Syntax),
    #[error("{0}")]
    Trace(#[from] Trace),
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// A source of uniformly distributed numbers in `[0, 1)`, for `rand()` and `urand()`.
pub trait Entropy {
    fn next_f64(&mut self) -> f64;

    fn random_bytes(&mut self, count: usize) -> Vec<u8> {
        (0..count).map(|_| (self.next_f64() * 256.0) as u8).collect()
    }
}

impl Entropy for attorand::Rng {
    fn next_f64(&mut self) -> f64 {
        // 53 bits, the precision of an f64 mantissa.
        const RESOLUTION: u64 = (1 << 53) - 1;
        self.next_u64_max(RESOLUTION) as f64 / (RESOLUTION as f64 + 1.0)
    }
}

/// An in-memory sink for program output.
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The state natives act upon.
/// Each engine has exactly one, threaded through every VM it spawns.
pub struct Context {
    pub config:    Config,
    pub out:       Box<dyn Write>,
    pub entropy:   Box<dyn Entropy>,
    pub tasks:     Tasks,
    /// Imported files by canonical path.
    /// `None` while a file is still being evaluated.
    pub imports:   HashMap<PathBuf, Option<Value>>,
    /// The scope holding the natives, parent of every program's scope.
    pub root:      Rc<Scope>,
    /// Names of the natives in `root`, in slot order.
    pub globals:   Vec<String>,
    pub args:      Vec<String>,
    /// Set once the program asks to stop.
    pub exit:      Option<i32>,
    /// A fatal error raised inside a native, such as a failed import,
    /// to be raised again by the VM that called it.
    pub fault:     Option<Trace>,
}

pub struct Engine {
    context: Context,
}

impl Engine {
    /// An engine writing to standard output.
    pub fn new(config: Config) -> Engine {
        Engine::with(
            config,
            Box::new(io::stdout()),
            Box::new(attorand::Rng::new_default()),
        )
    }

    pub fn with(config: Config, out: Box<dyn Write>, entropy: Box<dyn Entropy>) -> Engine {
        let ffi = ffi_core();
        let globals = ffi.names();
        let root = Scope::root(ffi.natives().iter().cloned().map(Value::Native).collect());
        log::info!("engine started with {} natives", globals.len());

        let args = config.args.clone();

        Engine {
            context: Context {
                config,
                out,
                entropy,
                tasks: Tasks::new(),
                imports: HashMap::new(),
                root,
                globals,
                args,
                exit: None,
                fault: None,
            },
        }
    }

    /// An engine whose output is kept in memory.
    pub fn captured(config: Config) -> (Engine, Captured) {
        let output = Captured::default();
        let engine = Engine::with(
            config,
            Box::new(output.clone()),
            Box::new(attorand::Rng::new_default()),
        );
        (engine, output)
    }

    pub fn context(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.context.exit
    }

    /// Compiles a source unit against this engine's natives.
    pub fn compile(&self, source: &Rc<Source>) -> Result<Program, Syntax> {
        let program = compiler::compile(source, &self.context.globals, self.context.config.fold)?;
        if self.context.config.dump {
            log::debug!("disassembly of {}:\n{}", source.path.display(), program.dump());
        }
        Ok(program)
    }

    /// Compiles and runs a source unit to completion,
    /// returning the value of its last expression.
    /// Background tasks it started are left outstanding; see [`Engine::drain`].
    pub fn eval(&mut self, source: Rc<Source>) -> Result<Value, EngineError> {
        let program = Rc::new(self.compile(&source)?);
        log::info!("running {}", source.path.display());

        Ok(VM::new(self.context.config.max_frames).run(&mut self.context, &program)?)
    }

    pub fn eval_str(&mut self, source: &str) -> Result<Value, EngineError> {
        self.eval(Source::source(source))
    }

    /// Runs a file, then every callback it scheduled, until nothing is outstanding.
    pub fn run_file(&mut self, path: &Path) -> Result<Value, EngineError> {
        let path = path.canonicalize()?;
        let source = Source::path(&path)?;

        self.context.imports.insert(path.clone(), None);
        let value = self.eval(source)?;
        self.context.imports.insert(path, Some(value.clone()));

        self.drain()?;
        Ok(value)
    }

    /// Runs callbacks as their tasks complete, one at a time,
    /// until none are outstanding or the program exits.
    /// A stream whose callback returns `false` is stopped.
    pub fn drain(&mut self) -> Result<(), EngineError> {
        while self.context.exit.is_none() {
            let ready = match self.context.tasks.next() {
                Some(ready) => ready,
                None => break,
            };

            let mut vm = VM::new(self.context.config.max_frames);
            let result = vm.call(&mut self.context, ready.callback, ready.args, &ready.span)?;
            match result {
                Value::Error(error) => {
                    log::warn!("callback returned an error:\n{}", error.report());
                },
                Value::Boolean(false) if self.context.tasks.cancel(ready.id) => {
                    log::debug!("stream {} stopped by its callback", ready.id);
                },
                _ => (),
            }
        }

        log::info!("all tasks finished");
        Ok(())
    }
}
