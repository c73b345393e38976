use crate::command::Command;
use crate::env::Environment;
use crate::executor;
use crate::jobs::JobSet;
use crate::lexer;
use crate::parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};

/// The interactive read-eval loop.
///
/// Each iteration polls the background job tracker, draws the prompt,
/// reads one line with [`rustyline`], and runs it: builtins in-process,
/// everything else through the process pipeline executor.
///
/// Example
/// ```no_run
/// use minishell::Interpreter;
/// let mut sh = Interpreter::new();
/// sh.repl().unwrap();
/// ```
pub struct Interpreter {
    env: Environment,
    jobs: JobSet,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
            jobs: JobSet::new(),
        }
    }

    /// Run until end of input or the `exit` builtin.
    ///
    /// Ctrl-C never terminates the loop and never touches the console from
    /// a signal-handling context: rustyline surfaces it as
    /// [`ReadlineError::Interrupted`] and the next prompt is drawn from
    /// ordinary loop context. End of input prints a trailing newline and
    /// returns success.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;
        loop {
            for done in self.jobs.reap_completed() {
                println!("[{}] Done {}", done.label, done.pid);
            }

            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    self.eval_line(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    println!();
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn prompt(&self) -> String {
        match &self.env.current_dir {
            Some(dir) => format!("MiniShell:{}$ ", dir.display()),
            None => "MiniShell$ ".to_string(),
        }
    }

    /// Tokenize, parse and run one input line.
    ///
    /// Lines that parse to nothing (blank input, stray operators) are a
    /// no-op; failed commands are reported but never end the loop.
    fn eval_line(&mut self, line: &str) {
        let tokens = lexer::split_into_tokens(line);
        let Some(spec) = parser::parse_line(tokens) else {
            return;
        };

        match Command::resolve(spec) {
            Command::Builtin(cmd) => {
                let mut stdout = io::stdout();
                if let Err(e) = cmd.execute(&mut stdout, &mut self.env) {
                    eprintln!("minishell: {e:#}");
                }
                let _ = stdout.flush();
            }
            Command::Pipeline(spec) => executor::execute(spec, &mut self.jobs),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
