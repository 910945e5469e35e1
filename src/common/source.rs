use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

/// `Source` is one named unit of program text:
/// a file on disk, an `eval` string, or a test snippet.
/// The path doubles as the unit's name in diagnostics,
/// and as the base for resolving relative imports.
/// Sources built from bare strings point to `./source`.
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub contents: String,
    pub path: PathBuf,
}

impl Source {
    /// Creates a new `Source` from its contents and a path.
    /// The contents are not checked against the file at `path`;
    /// use `Source::path` to actually read a file.
    pub fn new(source: &str, path: &Path) -> Rc<Source> {
        Rc::new(Source {
            contents: source.to_string(),
            path: path.to_owned(),
        })
    }

    /// Reads the file at `path` into a new `Source`.
    pub fn path(path: &Path) -> std::io::Result<Rc<Source>> {
        let contents = fs::read_to_string(path)?;
        Ok(Source::new(&contents, path))
    }

    /// Build a `Source` containing just a string.
    pub fn source(source: &str) -> Rc<Source> {
        Source::new(source, &PathBuf::from("./source"))
    }

    /// A `Source` typed at the command line,
    /// anchored in the working directory so relative imports start there.
    pub fn command_line(source: &str) -> std::io::Result<Rc<Source>> {
        let directory = std::env::current_dir()?;
        Ok(Source::new(source, &directory.join("eval")))
    }

    /// The directory imports made from this source are resolved against.
    pub fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
            _ => PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn directory_of_bare_source() {
        assert_eq!(Source::source("1").directory(), PathBuf::from("."));
        let nested = Source::new("1", Path::new("lib/util/str.ink"));
        assert_eq!(nested.directory(), PathBuf::from("lib/util"));
    }

    #[test]
    fn command_line_starts_in_working_directory() {
        let source = Source::command_line("1").unwrap();
        assert_eq!(source.directory(), std::env::current_dir().unwrap());
        assert!(source.path.is_absolute());
    }
}
