//! Interpreter-level view of ambient process state.

use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, interpreter-level view of the process environment.
///
/// The working directory is OS process state, not something this struct
/// controls exclusively: `cd` mutates it with no rollback, and
/// `current_dir` only caches the last known value for the prompt and
/// `pwd`. `None` means the directory could not be resolved.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Last known working directory, refreshed after every `cd`.
    pub current_dir: Option<PathBuf>,
}

impl Environment {
    /// Capture the current process state into a new `Environment`.
    pub fn new() -> Self {
        Self {
            current_dir: stdenv::current_dir().ok(),
        }
    }

    /// Re-read the working directory after the process changed it.
    pub fn refresh_current_dir(&mut self) {
        self.current_dir = stdenv::current_dir().ok();
    }

    /// The home directory from `$HOME`, the conventional fallback for a
    /// bare `cd`.
    pub fn home_dir(&self) -> Option<PathBuf> {
        stdenv::var_os("HOME").map(PathBuf::from)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
