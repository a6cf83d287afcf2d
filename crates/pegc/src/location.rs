use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::RcString;

/// A position in the grammar source, lines and columns are 1-based.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct Cursor {
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

impl Cursor {
    pub fn new(offset: u32, line: u32, column: u32) -> Cursor {
        Self {
            offset,
            line,
            column,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub source: Option<RcString>,
    pub start: Cursor,
    pub end: Cursor,
}

impl Location {
    pub fn new(start: Cursor, end: Cursor) -> Location {
        Self {
            source: None,
            start,
            end,
        }
    }
    pub fn at(pos: Cursor) -> Location {
        Self::new(pos, pos)
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{source}:")?;
        }
        write!(f, "{}:{}", self.start.line, self.start.column)
    }
}
