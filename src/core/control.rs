use std::{rc::Rc, thread, time::Duration};

use crate::{
    common::{source::Source, span::Span, value::Value},
    compiler,
    core::ffi::{arity, function_arg, number_arg, string_arg, Args, Native},
    engine::{tasks::Payload, Context},
    vm::vm::VM,
};

/// Asks the engine to stop, reporting `code`.
/// The VM unwinds as soon as the native returns.
pub fn exit(context: &mut Context, _: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    let code = number_arg(&args, 0)?;
    log::info!("program requested exit with code {}", code);
    context.exit = Some(code as i32);
    Ok(Value::Null)
}

/// A native that cancels the background task `id`.
/// Cancelling twice, or after the task has run, does nothing.
pub fn cancel(id: usize) -> Value {
    Value::Native(Native::new("cancel", move |context, _, _| {
        if context.tasks.cancel(id) {
            log::debug!("cancelled task {}", id);
        }
        Value::Null
    }))
}

/// Calls `callback()` after `seconds`, without blocking the program.
/// Returns a function that cancels the call.
pub fn wait(context: &mut Context, span: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 2)?;
    let seconds = number_arg(&args, 0)?;
    let callback = function_arg(&args, 1)?;
    let delay = Duration::try_from_secs_f64(seconds.max(0.0))
        .map_err(|_| format!("cannot wait for {} seconds", seconds))?;

    let ticket = context.tasks.schedule(callback, span.clone());
    let id = ticket.id();

    thread::spawn(move || {
        thread::sleep(delay);
        ticket.send(Payload::Ready);
    });

    Ok(cancel(id))
}

/// Evaluates another source file, once per engine.
/// Relative paths are resolved against the directory of the file the call appears in,
/// whenever the call happens to run.
/// A file that is imported while it is still loading sees `()`.
pub fn import(context: &mut Context, span: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    let relative = String::from_utf8_lossy(&string_arg(&args, 0)?).into_owned();
    let joined = span.source().directory().join(&relative);
    let path = joined
        .canonicalize()
        .map_err(|e| format!("error importing file {}, {}", joined.display(), e))?;

    match context.imports.get(&path) {
        Some(Some(value)) => {
            log::debug!("import cache hit for {}", path.display());
            return Ok(value.clone());
        },
        Some(None) => {
            log::debug!("cyclic import of {}", path.display());
            return Ok(Value::Null);
        },
        None => (),
    }

    let source = Source::path(&path)
        .map_err(|e| format!("error importing file {}, {}", path.display(), e))?;
    let program = compiler::compile(&source, &context.globals, context.config.fold)
        .map_err(|e| format!("error evaluating importing file {}\n{}", path.display(), e))?;
    let program = Rc::new(program);

    context.imports.insert(path.clone(), None);
    let result = VM::new(context.config.max_frames).run(context, &program);

    match result {
        Ok(value) => {
            context.imports.insert(path, Some(value.clone()));
            Ok(value)
        },
        Err(trace) => {
            context.imports.remove(&path);
            context.fault = Some(trace);
            Ok(Value::Null)
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::Config, engine::Engine};

    fn span() -> Span {
        Span::point(&Source::source(""), 0)
    }

    #[test]
    fn cancel_is_idempotent() {
        let (mut engine, _) = Engine::captured(Config::default());
        let context = engine.context();
        let callback = Value::Native(Native::new("noop", |_, _, _| Value::Null));
        let handle = wait(context, &span(), vec![Value::Number(60.0), callback]).unwrap();
        assert_eq!(context.tasks.outstanding(), 1);

        let cancel = match handle {
            Value::Native(native) => native,
            other => panic!("expected a native, got {}", other),
        };
        cancel.call(context, &span(), vec![]);
        cancel.call(context, &span(), vec![]);
        assert_eq!(context.tasks.outstanding(), 0);
    }

    #[test]
    fn wait_validates() {
        let (mut engine, _) = Engine::captured(Config::default());
        let context = engine.context();
        assert!(wait(context, &span(), vec![Value::Number(1.0)]).is_err());
        assert!(wait(context, &span(), vec![Value::Number(1.0), Value::Null]).is_err());
        assert!(wait(context, &span(), vec![Value::Number(f64::INFINITY), cancel(0)]).is_err());
        assert_eq!(context.tasks.outstanding(), 0);
    }

    #[test]
    fn exit_records_code() {
        let (mut engine, _) = Engine::captured(Config::default());
        exit(engine.context(), &span(), vec![Value::Number(3.0)]).unwrap();
        assert_eq!(engine.exit_code(), Some(3));
    }

    #[test]
    fn missing_import() {
        let (mut engine, _) = Engine::captured(Config::default());
        let args = vec![Value::string("./definitely/not/here.ink")];
        assert!(import(engine.context(), &span(), args).is_err());
    }
}
