//! A small interactive command interpreter built around real OS pipelines.
//!
//! Lines are tokenized on whitespace, split into pipeline stages at `|`,
//! and executed as child processes connected by anonymous pipes, with
//! `<`, `>` and `>>` attaching the pipeline's boundary streams to files
//! and a trailing `&` detaching the whole pipeline to the background.
//! A handful of commands (`cd`, `exit`, `help`, `pwd`) are builtins that
//! run inside the interpreter's own process.
//!
//! The main entry point is [`Interpreter`], whose `repl` method drives the
//! read-eval loop. The public modules [`command`], [`env`] and [`parser`]
//! expose the pieces the loop is assembled from.

mod builtin;
pub mod command;
pub mod env;
mod executor;
mod interpreter;
mod jobs;
mod lexer;
pub mod parser;

/// Just a convenient re-export of the interactive loop.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;
