//! Source positions shared by every compiler stage.
use std::{fmt::Display, rc::Rc};

use serde::Serialize;

/// A 1-based line/column position within a source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub file: Rc<str>,
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(file: Rc<str>, line: usize, col: usize) -> Self {
        Self { file, line, col }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}
