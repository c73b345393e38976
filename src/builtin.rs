use crate::command::{ExecutableCommand, ExitCode};
use crate::env::Environment;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child process. This is why the
/// dispatcher is consulted before the pipeline executor ever runs.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "pwd" or "cd".
    fn name() -> &'static str;

    /// Executes the command using the provided output stream and environment.
    ///
    /// Return value follows shell conventions: 0 for success, non-zero for
    /// error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match T::execute(*self, stdout, env) {
            Ok(code) => Ok(code),
            Err(e) => {
                // A failed builtin is normal shell behavior: report it and
                // carry on with a non-zero code.
                writeln!(stdout, "{e:#}")?;
                Ok(1)
            }
        }
    }
}

/// Stand-in command for a builtin whose arguments argh rejected; prints
/// argh's usage or error text instead of running anything.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.output.trim_end())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

fn create<T: BuiltinCommand + 'static>(name: &str, args: &[&str]) -> Box<dyn ExecutableCommand> {
    match T::from_args(&[name], args) {
        Ok(cmd) => Box::new(cmd),
        Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
            output,
            is_error: status.is_err(),
        }),
    }
}

/// Look up a builtin by its exact, case-sensitive name.
///
/// Returns `None` for anything that should go through ordinary program
/// lookup instead.
pub(crate) fn resolve(name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
    match name {
        "cd" => Some(create::<Cd>(name, args)),
        "exit" => Some(create::<Exit>(name, args)),
        "help" => Some(create::<Help>(name, args)),
        "pwd" => Some(create::<Pwd>(name, args)),
        _ => None,
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        match &env.current_dir {
            Some(dir) => {
                writeln!(stdout, "{}", dir.display())?;
                Ok(0)
            }
            None => Err(anyhow::anyhow!("pwd: cannot resolve the current directory")),
        }
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// With no target, changes to the directory named by $HOME.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => env
                .home_dir()
                .ok_or_else(|| anyhow::anyhow!("cd: HOME not set"))?,
        };

        env::set_current_dir(&target).with_context(|| format!("cd: {}", target.display()))?;
        env.refresh_current_dir();
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Terminate the interpreter.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        std::process::exit(0)
    }
}

#[derive(FromArgs)]
/// Print a summary of the interpreter's builtin commands and operators.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "MiniShell - builtin commands:")?;
        writeln!(stdout, "  cd [dir]  - change the working directory (defaults to $HOME)")?;
        writeln!(stdout, "  pwd       - print the working directory")?;
        writeln!(stdout, "  help      - print this summary")?;
        writeln!(stdout, "  exit      - leave the shell")?;
        writeln!(
            stdout,
            "Pipes (|), redirection (<, >, >>) and background jobs (&) are supported."
        )?;
        Ok(0)
    }
}
