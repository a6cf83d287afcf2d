use std::fmt::Write;

use thiserror::Error;

use crate::location::Location;

/// Supporting context attached to a [`GrammarError`].
#[derive(Clone, PartialEq, Debug)]
pub struct Diagnostic {
    pub message: String,
    pub location: Location,
}

/// A semantic defect in the grammar, or a generator invariant that did not hold.
#[derive(Clone, PartialEq, Debug, Error)]
#[error("{message}")]
pub struct GrammarError {
    pub message: String,
    pub location: Location,
    pub diagnostics: Vec<Diagnostic>,
}

impl GrammarError {
    pub fn new(message: impl Into<String>, location: Location) -> GrammarError {
        Self {
            message: message.into(),
            location,
            diagnostics: Vec::new(),
        }
    }
    pub fn with_diagnostic(
        mut self,
        message: impl Into<String>,
        location: Location,
    ) -> GrammarError {
        self.diagnostics.push(Diagnostic {
            message: message.into(),
            location,
        });
        self
    }
    /// Plain multi-line rendering, one note per diagnostic.
    pub fn report(&self) -> String {
        let mut buf = String::new();
        _ = writeln!(buf, "error: {}", self.message);
        _ = writeln!(buf, " --> {}", self.location);
        for diagnostic in &self.diagnostics {
            _ = writeln!(buf, "note: {} ({})", diagnostic.message, diagnostic.location);
        }
        buf
    }
}

#[derive(Clone, PartialEq, Debug, Error)]
pub enum OptionsError {
    #[error("Grammar has no rules")]
    NoRules,
    #[error("Must have at least one start rule")]
    NoStartRules,
    #[error("Unknown start rule \"{0}\"")]
    UnknownStartRule(String),
}

#[derive(Clone, PartialEq, Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
}
