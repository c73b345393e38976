use crate::builtin;
use crate::env::Environment;
use crate::parser::PipelineSpec;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line
/// tools.
pub type ExitCode = i32;

/// Object-safe trait for any command the interpreter runs in its own
/// process, without spawning a child.
pub trait ExecutableCommand {
    /// Executes the command against the provided output stream and
    /// environment.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// A resolved input line.
///
/// The builtin-versus-external decision is made exactly once, here, so
/// the executor never re-derives it per stage: only a single-stage
/// pipeline whose program name matches a builtin runs in-process. A
/// builtin name buried inside a multi-stage pipeline falls through to
/// ordinary program lookup.
pub enum Command {
    /// A builtin, executed inside the interpreter's own process.
    Builtin(Box<dyn ExecutableCommand>),
    /// Anything else: a pipeline of external programs.
    Pipeline(PipelineSpec),
}

impl Command {
    /// Resolve a parsed pipeline into its execution path.
    pub(crate) fn resolve(spec: PipelineSpec) -> Command {
        if let [stage] = spec.stages.as_slice() {
            let args: Vec<&str> = stage[1..].iter().map(String::as_str).collect();
            if let Some(cmd) = builtin::resolve(&stage[0], &args) {
                return Command::Builtin(cmd);
            }
        }
        Command::Pipeline(spec)
    }
}
