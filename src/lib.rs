//! Ergo: a whole-program, ahead-of-time compiler that lexes, parses, lowers, loads, type-checks
//! and finally emits portable C11 from a small statically-typed scripting language.
pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod loader;
pub mod lower;
pub mod parser;
pub mod position;
pub mod token;
pub mod typechecker;
