use std::{
    fmt::{self, Debug, Display, Formatter},
    rc::Rc,
};

use crate::common::source::Source;

/// A `Span` refers to a section of a source,
/// much like a `&str`, but with a reference to a `Source` rather than a `String`.
/// Tokens, syntax nodes and instructions all carry one,
/// so that errors can point back at the text that caused them.
#[derive(Clone, Eq, PartialEq)]
pub struct Span {
    source: Rc<Source>,
    offset: usize,
    length: usize,
}

impl Span {
    /// Create a new `Span` from an offset with a length.
    pub fn new(source: &Rc<Source>, offset: usize, length: usize) -> Span {
        Span { source: Rc::clone(source), offset, length }
    }

    /// A `Span` that points at a specific point in the source.
    /// Has a length of `0`.
    pub fn point(source: &Rc<Source>, offset: usize) -> Span {
        Span::new(source, offset, 0)
    }

    pub fn source(&self) -> &Rc<Source> {
        &self.source
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Return the index of the end of the `Span`.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Creates a new `Span` which spans the space of the previous two.
    /// ```plain
    /// hello this is cool
    /// ^^^^^              | Span a
    ///            ^^      | Span b
    /// ^^^^^^^^^^^^^      | combined
    /// ```
    /// Both spans must come from the same source.
    pub fn combine(a: &Span, b: &Span) -> Span {
        debug_assert!(
            Rc::ptr_eq(&a.source, &b.source) || a.source == b.source,
            "Can't combine two Spans with separate sources"
        );

        let offset = a.offset.min(b.offset);
        let end = a.end().max(b.end());
        Span::new(&a.source, offset, end - offset)
    }

    /// Returns the text a `Span` covers.
    pub fn contents(&self) -> &str {
        &self.source.contents[self.offset..self.end()]
    }

    pub fn path(&self) -> String {
        self.source.path.to_string_lossy().to_string()
    }

    /// Zero-based line of a byte index in this span's source.
    pub fn line(&self, index: usize) -> usize {
        self.source.contents[..index].matches('\n').count()
    }

    /// Zero-based column, in characters, of a byte index in this span's source.
    pub fn col(&self, index: usize) -> usize {
        let before = &self.source.contents[..index];
        match before.rfind('\n') {
            Some(newline) => before[newline + 1..].chars().count(),
            None => before.chars().count(),
        }
    }

    /// The one-based file/line/column position of the start of this span.
    pub fn position(&self) -> Position {
        Position {
            path: self.path(),
            line: self.line(self.offset) + 1,
            col: self.col(self.offset) + 1,
        }
    }

    /// The full source lines this span touches.
    pub fn lines(&self) -> Vec<String> {
        let start = self.line(self.offset);
        let end = self.line(self.end());
        self.source
            .contents
            .split('\n')
            .skip(start)
            .take(end - start + 1)
            .map(|l| l.to_string())
            .collect()
    }

    pub fn format(&self) -> FormattedSpan {
        FormattedSpan {
            position: self.position(),
            start: self.line(self.offset),
            lines: self.lines(),
            start_col: self.col(self.offset),
            end_col: self.col(self.end()),
        }
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("contents", &self.contents())
            .field("start", &self.offset)
            .field("end", &self.end())
            .finish()
    }
}

impl Display for Span {
    /// Given a `Span`, `fmt` will print out where the `Span` occurs in its source.
    /// Single-line `Span`s:
    /// ```plain
    /// 12 | x := blatant { error }
    ///    |      ^^^^^^^^^^^^^^^^^
    /// ```
    /// Multi-line `Span`s:
    /// ```plain
    /// 12 > x := y => (
    /// 13 >    another { error }
    /// 14 > )
    /// ```
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// A one-based location in a named source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub path: String,
    pub line: usize,
    pub col: usize,
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.col)
    }
}

/// Represents a formatted span, ready to be displayed.
pub struct FormattedSpan {
    pub position: Position,
    pub start: usize,
    pub lines: Vec<String>,
    pub start_col: usize,
    pub end_col: usize,
}

impl FormattedSpan {
    pub fn is_multiline(&self) -> bool {
        self.lines.len() != 1
    }

    pub fn gutter_padding(&self) -> usize {
        (self.start + self.lines.len()).to_string().len()
    }

    /// If a single line span, returns the number of carets between cols.
    pub fn carets(&self) -> Option<usize> {
        if self.is_multiline() {
            None
        } else {
            Some((self.end_col - self.start_col).max(1))
        }
    }
}

impl Display for FormattedSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let gutter = self.gutter_padding();
        writeln!(f, "In {}", self.position)?;
        writeln!(f, "{} |", " ".repeat(gutter))?;

        match self.carets() {
            Some(carets) => {
                writeln!(f, "{:>gutter$} | {}", self.start + 1, self.lines[0])?;
                writeln!(
                    f,
                    "{} | {}{}",
                    " ".repeat(gutter),
                    " ".repeat(self.start_col),
                    "^".repeat(carets),
                )?;
            },
            None => {
                for (index, line) in self.lines.iter().enumerate() {
                    writeln!(f, "{:>gutter$} > {}", self.start + index + 1, line)?;
                }
            },
        }

        Ok(())
    }
}

/// A wrapper for spanning types.
/// For example, a token, such as
/// ```ignore
/// pub enum Token {
///     Number(f64),
///     ParenLeft,
///     ParenRight,
/// }
/// ```
/// can be spanned to indicate where it was lexed from (a `Spanned<Token>`).
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub item: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    /// Takes a generic item, and wraps in in a `Span` to make it `Spanned`.
    pub fn new(item: T, span: Span) -> Spanned<T> {
        Spanned { item, span }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn combination() {
        let source = Source::source("heck, that's awesome");
        let a = Span::new(&source, 0, 5);
        let b = Span::new(&source, 11, 2);

        assert_eq!(Span::combine(&a, &b), Span::new(&source, 0, 13));
    }

    #[test]
    fn positions() {
        let source = Source::source("a := 1\nb := a + 2\n");
        let span = Span::new(&source, 12, 1);
        assert_eq!(span.contents(), "a");
        assert_eq!(span.position(), Position { path: "./source".into(), line: 2, col: 6 });
        assert_eq!(span.lines(), vec!["b := a + 2".to_string()]);
    }

    #[test]
    fn single_line_format() {
        let source = Source::source("x := 'hi' + 1");
        let span = Span::new(&source, 5, 8);
        let target = "\
In ./source:1:6
  |
1 | x := 'hi' + 1
  |      ^^^^^^^^
";
        assert_eq!(format!("{}", span), target);
    }

    #[test]
    fn empty() {
        let source = Source::source("");
        let span = Span::point(&source, 0);
        assert_eq!(span.position().line, 1);
        format!("{}", span);
    }
}
