use std::fmt;

use crate::common::span::Span;

/// Represents a fatal error inside the VM, i.e. a traceback.
/// Programs never see a `Trace`;
/// it means the VM reached a state the compiler should have ruled out,
/// or a hard limit like the call depth was exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    kind:    String,
    message: String,
    spans:   Vec<Span>,
}

impl Trace {
    pub fn error(kind: &str, message: &str, spans: Vec<Span>) -> Trace {
        Trace {
            kind: kind.to_string(),
            message: message.to_string(),
            spans,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Used to build a trace as the call stack is unwound, innermost first.
    pub fn add_context(&mut self, span: Span) {
        self.spans.push(span);
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Traceback, most recent call last:")?;

        for span in self.spans.iter().rev() {
            fmt::Display::fmt(span, f)?;
        }

        writeln!(f, "Fatal {}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Trace {}
