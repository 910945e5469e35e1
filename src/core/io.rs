use std::{
    fs::{self, OpenOptions},
    io::{self, BufRead, Read, Seek, SeekFrom, Write},
    path::Path,
    process::{Child, Command, Stdio},
    sync::{Arc, Mutex},
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    common::{number, span::Span, value::Value},
    core::{
        control::cancel,
        ffi::{arity, function_arg, number_arg, string_arg, string_list_arg, Args, Native},
    },
    engine::{
        tasks::{FileInfo, Payload, Ticket},
        Context,
    },
};

/// Writes the raw bytes of a string to the engine's output.
pub fn out(context: &mut Context, _: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    let bytes = string_arg(&args, 0)?;
    context.out
        .write_all(&bytes)
        .and_then(|_| context.out.flush())
        .map_err(|e| format!("error writing output in out(), {}", e))?;
    Ok(Value::Null)
}

pub fn args(context: &mut Context, _: &Span, _: Args) -> Result<Value, String> {
    Ok(Value::list(context.args.iter().map(|a| Value::string(a)).collect()))
}

pub fn env(_: &mut Context, _: &Span, _: Args) -> Result<Value, String> {
    let vars = std::env::vars_os()
        .map(|(k, v)| {
            let key = k.to_string_lossy().into_owned().into_bytes();
            (key, Value::string(&v.to_string_lossy()))
        })
        .collect();
    Ok(Value::composite(vars))
}

/// Seconds since the Unix epoch, with a fractional part.
pub fn time(_: &mut Context, _: &Span, _: Args) -> Result<Value, String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("system clock is before the Unix epoch, {}", e))?;
    Ok(Value::Number(now.as_secs_f64()))
}

pub fn rand(context: &mut Context, _: &Span, _: Args) -> Result<Value, String> {
    Ok(Value::Number(context.entropy.next_f64()))
}

/// A string of `count` random bytes.
pub fn urand(context: &mut Context, _: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    let count = number_arg(&args, 0)?;
    if !(count >= 0.0 && count.is_finite()) {
        Err(format!("cannot generate {} random bytes", number::format(count)))?
    }
    Ok(Value::bytes(context.entropy.random_bytes(count as usize)))
}

fn path_arg(args: &[Value], index: usize) -> Result<String, String> {
    Ok(String::from_utf8_lossy(&string_arg(args, index)?).into_owned())
}

fn failure(native: &str, doing: &str, error: io::Error) -> Payload {
    log::error!("{}() failed: {}", native, error);
    Payload::Failure(format!("error {} in {}(), {}", doing, native, error))
}

/// Runs `work` on a background thread unless it is cancelled before it starts,
/// then calls `callback` with what it produced.
/// Returns the function that cancels it.
fn background(
    context: &mut Context,
    span: &Span,
    callback: Value,
    work: impl FnOnce() -> Payload + Send + 'static,
) -> Value {
    let ticket = context.tasks.schedule(callback, span.clone());
    let id = ticket.id();

    thread::spawn(move || {
        if ticket.is_cancelled() {
            return;
        }
        ticket.send(work());
    });

    cancel(id)
}

/// Reads a whole file on a background thread,
/// then calls back with `{type: 'data', data}` or `{type: 'error', message}`.
/// Returns a function that cancels the read if it has not happened yet.
pub fn read(context: &mut Context, span: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 2)?;
    let path = path_arg(&args, 0)?;
    let callback = function_arg(&args, 1)?;

    Ok(background(context, span, callback, move || match fs::read(&path) {
        Ok(data) => Payload::Data(data),
        Err(e) => failure("read", "reading requested file", e),
    }))
}

/// Writes `data` at byte `offset`, creating the file if needed.
/// An offset of `-1` appends.
fn write_at(path: &Path, offset: f64, data: &[u8]) -> io::Result<()> {
    let append = offset == -1.0;
    let mut file = OpenOptions::new()
        .create(true)
        .append(append)
        .write(!append)
        .open(path)?;
    if !append {
        file.seek(SeekFrom::Start(offset as u64))?;
    }
    file.write_all(data)
}

/// `write(path, offset, data, callback)` calls back with `{type: 'end'}` once written.
pub fn write(context: &mut Context, span: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 4)?;
    let path = path_arg(&args, 0)?;
    let offset = number_arg(&args, 1)?;
    let data = string_arg(&args, 2)?;
    let callback = function_arg(&args, 3)?;
    if offset < 0.0 && offset != -1.0 {
        Err(format!("cannot write at negative offset {}", number::format(offset)))?
    }

    Ok(background(context, span, callback, move || {
        match write_at(Path::new(&path), offset, &data) {
            Ok(()) => Payload::End,
            Err(e) => failure("write", "writing to requested file", e),
        }
    }))
}

/// Removes a file or a whole directory tree.
/// Removing something that does not exist succeeds.
fn remove(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn delete(context: &mut Context, span: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 2)?;
    let path = path_arg(&args, 0)?;
    let callback = function_arg(&args, 1)?;

    Ok(background(context, span, callback, move || match remove(Path::new(&path)) {
        Ok(()) => Payload::End,
        Err(e) => failure("delete", "removing requested file", e),
    }))
}

fn info(name: String, meta: &fs::Metadata) -> FileInfo {
    let modified = meta.modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0.0, |since| since.as_secs() as f64);
    FileInfo { name, len: meta.len(), dir: meta.is_dir(), modified }
}

/// The entries of a directory, sorted by name.
fn list(path: &Path) -> io::Result<Vec<FileInfo>> {
    let mut files = fs::read_dir(path)?
        .map(|entry| -> io::Result<FileInfo> {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            Ok(info(name, &entry.metadata()?))
        })
        .collect::<io::Result<Vec<_>>>()?;
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Calls back with `{type: 'data', data}`,
/// where `data` lists `{name, len, dir, mod}` for each entry.
pub fn dir(context: &mut Context, span: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 2)?;
    let path = path_arg(&args, 0)?;
    let callback = function_arg(&args, 1)?;

    Ok(background(context, span, callback, move || match list(Path::new(&path)) {
        Ok(files) => Payload::Listing(files),
        Err(e) => failure("dir", "listing directory contents", e),
    }))
}

/// Calls back with `{type: 'data', data}`,
/// where `data` is `{name, len, dir, mod}`, or `()` if there is no such file.
pub fn stat(context: &mut Context, span: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 2)?;
    let path = path_arg(&args, 0)?;
    let callback = function_arg(&args, 1)?;

    Ok(background(context, span, callback, move || {
        let path = Path::new(&path);
        match fs::metadata(path) {
            Ok(meta) => {
                let name = path.file_name()
                    .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
                Payload::Stat(Some(info(name, &meta)))
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Payload::Stat(None),
            Err(e) => failure("stat", "getting file data", e),
        }
    }))
}

/// Creates a directory and any missing parents.
pub fn make(context: &mut Context, span: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 2)?;
    let path = path_arg(&args, 0)?;
    let callback = function_arg(&args, 1)?;

    Ok(background(context, span, callback, move || match fs::create_dir_all(&path) {
        Ok(()) => Payload::End,
        Err(e) => failure("make", "making a new directory", e),
    }))
}

/// Sends `reader` line by line, newlines included, then its end.
/// Stops early once the stream is cancelled.
pub fn lines(mut reader: impl BufRead, ticket: &Ticket) {
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if !ticket.emit(Payload::Data(line)) {
                    return;
                }
            },
            Err(e) => {
                ticket.emit(failure("in", "reading standard input", e));
                return;
            },
        }
    }
    ticket.emit(Payload::End);
}

/// Calls back with `{type: 'data', data}` for each line of standard input,
/// then with `{type: 'end'}`.
/// A callback that returns `false` stops the stream.
pub fn stdin(context: &mut Context, span: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    let callback = function_arg(&args, 0)?;

    let ticket = context.tasks.stream(callback, span.clone());
    let id = ticket.id();
    thread::spawn(move || lines(io::stdin().lock(), &ticket));

    Ok(cancel(id))
}

/// Starts a program unless its task is already cancelled,
/// parking the process in `slot` so it can be killed while it runs.
/// Returns everything it wrote to standard output.
fn run(
    program: &str,
    arguments: &[String],
    input: Vec<u8>,
    slot: &Mutex<Option<Child>>,
    ticket: &Ticket,
) -> io::Result<Option<Vec<u8>>> {
    let poisoned = || io::Error::new(io::ErrorKind::Other, "process handle poisoned");

    let (stdin, stdout) = {
        let mut slot = slot.lock().map_err(|_| poisoned())?;
        if ticket.is_cancelled() {
            return Ok(None);
        }
        let mut process = Command::new(program)
            .args(arguments)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let pipes = (process.stdin.take(), process.stdout.take());
        *slot = Some(process);
        pipes
    };

    if let Some(mut stdin) = stdin {
        // Dropping the pipe closes it, so the program sees the end of its input.
        thread::spawn(move || stdin.write_all(&input));
    }

    let mut output = Vec::new();
    if let Some(mut stdout) = stdout {
        stdout.read_to_end(&mut output)?;
    }

    let process = slot.lock().map_err(|_| poisoned())?.take();
    if let Some(mut process) = process {
        // A non-zero exit status is still a finished run.
        process.wait()?;
    }
    Ok(Some(output))
}

/// `exec(path, args, stdin, callback)` runs a program on a background thread
/// and calls back with `{type: 'data', data}` holding its standard output.
/// Returns a function that kills the program, or keeps it from ever starting.
pub fn exec(context: &mut Context, span: &Span, args: Args) -> Result<Value, String> {
    arity(&args, 4)?;
    let program = path_arg(&args, 0)?;
    let arguments = string_list_arg(&args, 1)?
        .iter()
        .map(|a| String::from_utf8_lossy(a).into_owned())
        .collect::<Vec<_>>();
    let input = string_arg(&args, 2)?;
    let callback = function_arg(&args, 3)?;

    let ticket = context.tasks.schedule(callback, span.clone());
    let id = ticket.id();
    let process: Arc<Mutex<Option<Child>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&process);

    thread::spawn(move || {
        let payload = match run(&program, &arguments, input, &slot, &ticket) {
            Ok(Some(output)) => Payload::Data(output),
            Ok(None) => return,
            Err(e) => failure("exec", "running command", e),
        };
        ticket.send(payload);
    });

    Ok(Value::Native(Native::new("close", move |context, _, _| {
        if context.tasks.cancel(id) {
            if let Ok(mut slot) = process.lock() {
                if let Some(child) = slot.as_mut() {
                    // It may have exited on its own already.
                    let _ = child.kill();
                }
            }
            log::debug!("closed command of task {}", id);
        }
        Value::Null
    })))
}
