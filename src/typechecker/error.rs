//! `TypeError`, in the teacher's manual `Display`/`Error` style (no `thiserror`).
use std::{error::Error, fmt::Display};

use crate::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    pub message: String,
    pub pos: Option<Position>,
}

impl TypeError {
    pub fn new(message: impl Into<String>, pos: Position) -> Self {
        Self {
            message: message.into(),
            pos: Some(pos),
        }
    }

    /// For whole-program violations that have no single source location (duplicate entry, …).
    pub fn global(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            pos: None,
        }
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pos {
            Some(pos) => write!(f, "{pos}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for TypeError {}

pub type TResult<T> = Result<T, TypeError>;
