use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

pub enum Kind {
    Debug,
    Info,
    Success,
    Warn,
    Fatal,
}

pub struct Status(pub Kind, pub &'static str);

impl Status {
    pub fn debug() -> Status {
        Status(Kind::Debug, "Debug")
    }
    pub fn info() -> Status {
        Status(Kind::Info, "Info")
    }
    pub fn success() -> Status {
        Status(Kind::Success, "Success")
    }
    pub fn warn() -> Status {
        Status(Kind::Warn, "Warning")
    }
    pub fn fatal() -> Status {
        Status(Kind::Fatal, "Fatal")
    }

    pub fn from_level(level: Level) -> Status {
        match level {
            Level::Error => Status(Kind::Fatal, "Error"),
            Level::Warn => Status::warn(),
            Level::Info => Status::info(),
            Level::Debug => Status::debug(),
            Level::Trace => Status(Kind::Debug, "Trace"),
        }
    }

    fn tag(&self) -> ColoredString {
        match self.0 {
            Kind::Debug => self.1.dimmed(),
            Kind::Info => self.1.blue(),
            Kind::Success => self.1.green(),
            Kind::Warn => self.1.yellow(),
            Kind::Fatal => self.1.red(),
        }
        .bold()
    }

    fn multiline(&self, lines: Vec<&str>) {
        eprint!("\n{} ", self.tag());
        for line in lines {
            eprintln!("{}", line);
        }
        eprintln!()
    }

    pub fn log(&self, message: &str) {
        let lines = message.lines().collect::<Vec<&str>>();

        if lines.len() > 1 {
            self.multiline(lines);
        } else {
            eprintln!("{:>12} {}", self.tag(), message);
        }
    }
}

/// Prints log records from the interpreter as status lines on stderr.
pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    /// Installs the logger; each `-v` lowers the threshold by one level.
    pub fn install(verbosity: u8) -> Result<(), String> {
        let level = match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        log::set_boxed_logger(Box::new(Logger { level }))
            .map_err(|e| format!("Could not install logger: {}", e))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            Status::from_level(record.level()).log(&record.args().to_string());
        }
    }

    fn flush(&self) {}
}
