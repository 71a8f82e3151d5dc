//! Top-level error type for the CLI boundary (§7): unifies every stage's error into one enum
//! with a manual `Display`/`Error` impl, in the teacher's hand-rolled style (no `thiserror`).
use std::{error::Error as StdError, fmt::Display};

use crate::{lexer::LexError, loader::LoadError, parser::ParseError, typechecker::error::TypeError};

#[derive(Debug)]
pub enum Error {
    Lex(LexError),
    Parse(ParseError),
    Load(LoadError),
    Type(TypeError),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Lex(e) => write!(f, "{e}"),
            Error::Parse(e) => write!(f, "{e}"),
            Error::Load(e) => write!(f, "{e}"),
            Error::Type(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for Error {}

impl From<LexError> for Error {
    fn from(e: LexError) -> Self {
        Error::Lex(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<LoadError> for Error {
    fn from(e: LoadError) -> Self {
        Error::Load(e)
    }
}

impl From<TypeError> for Error {
    fn from(e: TypeError) -> Self {
        Error::Type(e)
    }
}
