//! Background work started by natives.
//!
//! Natives hand slow work (timers, file system calls, subprocesses) to a thread,
//! but callbacks are values bound to the VM's thread and can not travel with it.
//! So each task keeps its callback here, under an id,
//! and the thread only ever sends back an [`Event`] naming that id.
//! The engine drains those events one at a time,
//! so at most one callback runs the VM at once.
//! Most tasks call back once; a stream calls back for every event
//! until it reports its end.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver, Sender},
        Arc,
    },
};

use crate::common::{span::Span, value::Value};

/// Metadata about one file, as reported by `stat()` and `dir()`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub name:     String,
    pub len:      u64,
    pub dir:      bool,
    /// Last modification, in seconds since the Unix epoch.
    pub modified: f64,
}

impl FileInfo {
    fn into_value(self) -> Value {
        Value::record(vec![
            ("name", Value::string(&self.name)),
            ("len", Value::Number(self.len as f64)),
            ("dir", Value::Boolean(self.dir)),
            ("mod", Value::Number(self.modified)),
        ])
    }
}

/// What a background task produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Nothing but the fact that it finished.
    Ready,
    Data(Vec<u8>),
    Listing(Vec<FileInfo>),
    /// `None` if there was no such file.
    Stat(Option<FileInfo>),
    /// Done, with nothing to report.
    End,
    Failure(String),
}

fn event(kind: &str, field: Option<(&str, Value)>) -> Value {
    let mut entries = vec![("type", Value::string(kind))];
    entries.extend(field);
    Value::record(entries)
}

impl Payload {
    /// The arguments the task's callback is called with.
    pub fn into_args(self) -> Vec<Value> {
        let event = match self {
            Payload::Ready => return vec![],
            Payload::Data(data) => event("data", Some(("data", Value::bytes(data)))),
            Payload::Listing(files) => {
                let files = files.into_iter().map(FileInfo::into_value).collect();
                event("data", Some(("data", Value::list(files))))
            },
            Payload::Stat(info) => {
                let info = info.map_or(Value::Null, FileInfo::into_value);
                event("data", Some(("data", info)))
            },
            Payload::End => event("end", None),
            Payload::Failure(message) => {
                event("error", Some(("message", Value::string(&message))))
            },
        };
        vec![event]
    }

    /// Whether a stream has nothing left to say after this.
    fn is_last(&self) -> bool {
        matches!(self, Payload::End | Payload::Failure(_))
    }
}

#[derive(Debug)]
pub struct Event {
    pub id:      usize,
    pub payload: Payload,
}

/// The half of a task that moves to the background thread.
#[derive(Debug)]
pub struct Ticket {
    id:        usize,
    sender:    Sender<Event>,
    cancelled: Arc<AtomicBool>,
}

impl Ticket {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Reports the result, unless the task was cancelled in the meantime.
    pub fn send(self, payload: Payload) {
        self.emit(payload);
    }

    /// Reports one event of a stream.
    /// Returns `false` once nobody is listening any more.
    pub fn emit(&self, payload: Payload) -> bool {
        if self.is_cancelled() {
            return false;
        }
        // The engine may already be gone; nobody is left to call back.
        self.sender.send(Event { id: self.id, payload }).is_ok()
    }
}

#[derive(Debug)]
struct Task {
    callback:  Value,
    span:      Span,
    cancelled: Arc<AtomicBool>,
    stream:    bool,
}

/// A callback ready to be run, with the span of the call that scheduled it.
#[derive(Debug)]
pub struct Ready {
    pub id:       usize,
    pub callback: Value,
    pub span:     Span,
    pub args:     Vec<Value>,
}

/// The table of outstanding tasks and the queue their results arrive on.
#[derive(Debug)]
pub struct Tasks {
    pending:  BTreeMap<usize, Task>,
    next_id:  usize,
    sender:   Sender<Event>,
    receiver: Receiver<Event>,
}

impl Default for Tasks {
    fn default() -> Tasks {
        Tasks::new()
    }
}

impl Tasks {
    pub fn new() -> Tasks {
        let (sender, receiver) = channel();
        Tasks { pending: BTreeMap::new(), next_id: 0, sender, receiver }
    }

    /// Registers a callback to be run when a background task finishes.
    /// The returned ticket goes to the thread doing the work.
    pub fn schedule(&mut self, callback: Value, span: Span) -> Ticket {
        self.register(callback, span, false)
    }

    /// Like [`Tasks::schedule`], but the callback runs for every event
    /// until an end or a failure arrives.
    pub fn stream(&mut self, callback: Value, span: Span) -> Ticket {
        self.register(callback, span, true)
    }

    fn register(&mut self, callback: Value, span: Span, stream: bool) -> Ticket {
        let id = self.next_id;
        self.next_id += 1;

        let cancelled = Arc::new(AtomicBool::new(false));
        let task = Task { callback, span, cancelled: Arc::clone(&cancelled), stream };
        self.pending.insert(id, task);
        log::debug!("scheduled task {}, {} outstanding", id, self.pending.len());

        Ticket { id, sender: self.sender.clone(), cancelled }
    }

    /// Returns `true` if the task was still outstanding.
    pub fn cancel(&mut self, id: usize) -> bool {
        match self.pending.remove(&id) {
            Some(task) => {
                task.cancelled.store(true, Ordering::SeqCst);
                true
            },
            None => false,
        }
    }

    /// The number of tasks that have neither finished nor been cancelled.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Blocks until some outstanding task finishes, returning its callback.
    /// Returns `None` once nothing is outstanding.
    pub fn next(&mut self) -> Option<Ready> {
        while !self.pending.is_empty() {
            // We hold a sender ourselves, so this only fails if every thread is gone.
            let event = self.receiver.recv().ok()?;
            let (callback, span) = match self.pending.get(&event.id) {
                Some(task) if task.stream && !event.payload.is_last() => {
                    (task.callback.clone(), task.span.clone())
                },
                Some(_) => match self.pending.remove(&event.id) {
                    Some(task) => (task.callback, task.span),
                    None => continue,
                },
                // Cancelled after the event was sent.
                None => continue,
            };

            return Some(Ready {
                id: event.id,
                callback,
                span,
                args: event.payload.into_args(),
            });
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::source::Source;
    use std::thread;

    fn span() -> Span {
        Span::point(&Source::source(""), 0)
    }

    #[test]
    fn drained_in_completion_order() {
        let mut tasks = Tasks::new();
        let first = tasks.schedule(Value::Number(1.0), span());
        let second = tasks.schedule(Value::Number(2.0), span());
        assert_eq!(tasks.outstanding(), 2);

        thread::spawn(move || second.send(Payload::Ready)).join().unwrap();
        thread::spawn(move || first.send(Payload::Data(b"hi".to_vec()))).join().unwrap();

        let ready = tasks.next().unwrap();
        assert!(ready.callback.equals(&Value::Number(2.0)));
        assert!(ready.args.is_empty());

        let ready = tasks.next().unwrap();
        assert!(ready.callback.equals(&Value::Number(1.0)));
        assert_eq!(ready.args[0].to_string(), "{data: 'hi', type: 'data'}");

        assert!(tasks.next().is_none());
    }

    #[test]
    fn cancelled_tasks_never_run() {
        let mut tasks = Tasks::new();
        let ticket = tasks.schedule(Value::Null, span());
        assert!(tasks.cancel(ticket.id()));
        assert!(!tasks.cancel(ticket.id()));
        assert!(ticket.is_cancelled());

        ticket.send(Payload::Ready);
        assert_eq!(tasks.outstanding(), 0);
        assert!(tasks.next().is_none());
    }

    #[test]
    fn streams_stay_until_their_end() {
        let mut tasks = Tasks::new();
        let ticket = tasks.stream(Value::Null, span());
        assert!(ticket.emit(Payload::Data(b"one".to_vec())));
        assert!(ticket.emit(Payload::Data(b"two".to_vec())));
        assert!(ticket.emit(Payload::End));

        let first = tasks.next().unwrap();
        assert_eq!(first.args[0].to_string(), "{data: 'one', type: 'data'}");
        assert_eq!(tasks.outstanding(), 1);
        tasks.next().unwrap();
        let last = tasks.next().unwrap();
        assert_eq!(last.args[0].to_string(), "{type: 'end'}");
        assert_eq!(tasks.outstanding(), 0);

        ticket.emit(Payload::End);
        assert!(tasks.next().is_none());
    }

    #[test]
    fn file_events() {
        let info = FileInfo { name: "a.txt".to_string(), len: 3, dir: false, modified: 10.0 };
        let listing = Payload::Listing(vec![info.clone()]).into_args();
        assert_eq!(
            listing[0].to_string(),
            "{data: [{dir: false, len: 3, mod: 10, name: 'a.txt'}], type: 'data'}",
        );
        assert_eq!(Payload::Stat(None).into_args()[0].to_string(), "{data: (), type: 'data'}");
        assert_eq!(
            Payload::Failure("nope".to_string()).into_args()[0].to_string(),
            "{message: 'nope', type: 'error'}",
        );
    }
}
