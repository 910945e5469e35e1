use std::fmt;

use crate::common::span::Span;

/// Represents a note attached to a Syntax error,
/// i.e. a location in source code with an optional
/// specific hint or tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub span: Span,
    pub hint: Option<String>,
}

impl Note {
    pub fn new(span: Span) -> Note {
        Note { span, hint: None }
    }

    pub fn new_with_hint(hint: &str, span: &Span) -> Note {
        Note { span: span.clone(), hint: Some(hint.to_string()) }
    }
}

/// Represents a static error (syntax, semantics, etc.) found at compile time.
/// Ideally, each note included should have a distinct `Span` and hint.
/// Usually, one `Note` for an error is enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    pub reason: String,
    pub notes:  Vec<Note>,
}

impl Syntax {
    /// Creates a new static error, pointing at a span.
    pub fn error(reason: &str, span: &Span) -> Syntax {
        Syntax::error_with_note(reason, Note::new(span.clone()))
    }

    /// Creates a new static error, but with an added hint.
    pub fn error_with_note(reason: &str, note: Note) -> Syntax {
        Syntax {
            reason: reason.to_string(),
            notes:  vec![note],
        }
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for note in self.notes.iter() {
            let formatted = note.span.format();
            let gutter = formatted.gutter_padding();

            match (&note.hint, formatted.carets()) {
                (Some(hint), Some(carets)) => {
                    writeln!(f, "In {}", formatted.position)?;
                    writeln!(f, "{} |", " ".repeat(gutter))?;
                    writeln!(f, "{:>gutter$} | {}", formatted.start + 1, formatted.lines[0])?;
                    writeln!(f, "{} | {}{} note: {}",
                        " ".repeat(gutter),
                        " ".repeat(formatted.start_col),
                        "^".repeat(carets),
                        hint,
                    )?;
                },
                (Some(hint), None) => {
                    write!(f, "{}", formatted)?;
                    writeln!(f, "{} = note: {}", " ".repeat(gutter), hint)?;
                },
                (None, _) => write!(f, "{}", formatted)?,
            }
            writeln!(f, "{} |", " ".repeat(gutter))?;
        }
        write!(f, "Syntax Error: {}", self.reason)
    }
}

impl std::error::Error for Syntax {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::source::Source;

    #[test]
    fn error() {
        // This is just a demo to check formatting
        // might not coincide with an actual error
        let source = Source::source("x := 'Hello, world' -> y + 1");
        let error = Syntax::error(
            "Unexpected a case arrow `->` following an expression",
            &Span::new(&source, 20, 2),
        );

        let target = "\
In ./source:1:21
  |
1 | x := 'Hello, world' -> y + 1
  |                     ^^
  |
Syntax Error: Unexpected a case arrow `->` following an expression";

        assert_eq!(format!("{}", error), target);
    }

    #[test]
    fn hint() {
        let source = Source::source("'\\q'");
        let error = Syntax::error_with_note(
            "Unknown escape code `\\q` in string literal",
            Note::new_with_hint("escape it first", &Span::new(&source, 1, 2)),
        );

        let target = "\
In ./source:1:2
  |
1 | '\\q'
  |  ^^ note: escape it first
  |
Syntax Error: Unknown escape code `\\q` in string literal";

        assert_eq!(format!("{}", error), target);
    }
}
