//! Process pipeline construction and execution.
//!
//! Turns a parsed [`PipelineSpec`] into a chain of child processes
//! connected by anonymous pipes, with the pipeline's boundary streams
//! attached to files when redirections ask for it. Descriptor ownership
//! is explicit: every pipe end is held as an [`OwnedFd`], duplicated into
//! a child's standard stream, and closed in both parent and child as soon
//! as it has been handed over, so a downstream reader always sees
//! end-of-stream once its writer exits.

use crate::jobs::JobSet;
use crate::parser::{PipelineSpec, Stage};
use anyhow::{Context, Result};
use nix::sys::wait::waitpid;
use nix::unistd::{ForkResult, Pid, dup2, execvp, fork, pipe};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Run a pipeline, waiting for it in the foreground or handing its pids
/// to the job tracker when `spec.background` is set.
///
/// A failed command is normal shell behavior, not a caller fault, so
/// errors are reported to the user here instead of being returned.
pub(crate) fn execute(spec: PipelineSpec, jobs: &mut JobSet) {
    match spawn_pipeline(&spec) {
        Ok(pids) => {
            if spec.background {
                if let Some(&last) = pids.last() {
                    let label = jobs.track(pids);
                    println!("[{label}] {last}");
                }
            } else {
                // Only the final stage gates the prompt, but every stage is
                // reaped so the pipeline leaves no zombies behind.
                for pid in pids {
                    let _ = waitpid(pid, None);
                }
            }
        }
        Err(e) => eprintln!("minishell: {e:#}"),
    }
}

/// Fork one child per stage, wiring adjacent stages together.
///
/// Pipes are created lazily, each one immediately before the fork of the
/// stage that writes into it, so at most one extra descriptor pair is
/// open at any point regardless of pipeline length. A pipe or fork
/// failure aborts the rest of the line; stages already started keep
/// running on their own.
fn spawn_pipeline(spec: &PipelineSpec) -> Result<Vec<Pid>> {
    if spec.stages.is_empty() {
        return Ok(Vec::new());
    }
    let last = spec.stages.len() - 1;
    let mut pids = Vec::with_capacity(spec.stages.len());
    let mut prev_read: Option<OwnedFd> = None;

    for (i, stage) in spec.stages.iter().enumerate() {
        let (next_read, write_end) = if i < last {
            let (read, write) = pipe().context("pipe")?;
            (Some(read), Some(write))
        } else {
            (None, None)
        };

        match unsafe { fork() }.context("fork")? {
            ForkResult::Child => {
                let wiring = StageWiring {
                    stdin_pipe: prev_read.take(),
                    stdout_pipe: write_end,
                    sibling_read: next_read,
                    input: if i == 0 {
                        spec.redirections.input.as_deref()
                    } else {
                        None
                    },
                    output: if i == last {
                        spec.redirections.output.as_deref()
                    } else {
                        None
                    },
                    append: spec.redirections.append,
                };
                exec_stage(stage, wiring)
            }
            ForkResult::Parent { child } => {
                // Drop the ends just handed to the child; holding the write
                // end open here would keep the next stage reading forever.
                drop(write_end);
                drop(prev_read.take());
                prev_read = next_read;
                pids.push(child);
            }
        }
    }

    Ok(pids)
}

/// Descriptors and files a single forked stage must attach before exec.
///
/// `sibling_read` is the read end of the pipe whose write end this stage
/// received; the child inherits it across fork and must close it.
struct StageWiring<'a> {
    stdin_pipe: Option<OwnedFd>,
    stdout_pipe: Option<OwnedFd>,
    sibling_read: Option<OwnedFd>,
    input: Option<&'a Path>,
    output: Option<&'a Path>,
    append: bool,
}

/// Runs in the forked child: attaches the stage's standard streams,
/// closes every descriptor the program must not inherit, and replaces the
/// process image. Never returns to the caller; the parent cannot observe
/// failures past the fork, so the child reports them on stderr itself and
/// exits non-zero.
fn exec_stage(stage: &Stage, wiring: StageWiring) -> ! {
    if let Err(e) = attach_streams(&wiring) {
        eprintln!("minishell: {}: {e:#}", stage[0]);
        unsafe { libc::_exit(1) }
    }
    // Exec keeps inherited descriptors open, so the pipe ends must go now.
    drop(wiring);

    let e = replace_image(stage);
    eprintln!("minishell: {}: {e:#}", stage[0]);
    unsafe { libc::_exit(127) }
}

/// Duplicate the stage's input and output sources onto the standard
/// streams. Redirection files are opened here, in the child, so an open
/// failure surfaces as this stage's own non-zero exit.
fn attach_streams(wiring: &StageWiring) -> Result<()> {
    if let Some(path) = wiring.input {
        let file =
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        dup2(file.as_raw_fd(), libc::STDIN_FILENO).context("dup2 stdin")?;
    } else if let Some(fd) = &wiring.stdin_pipe {
        dup2(fd.as_raw_fd(), libc::STDIN_FILENO).context("dup2 stdin")?;
    }

    if let Some(fd) = &wiring.stdout_pipe {
        dup2(fd.as_raw_fd(), libc::STDOUT_FILENO).context("dup2 stdout")?;
    } else if let Some(path) = wiring.output {
        let mut options = OpenOptions::new();
        options.write(true).create(true).mode(0o644);
        if wiring.append {
            options.append(true);
        } else {
            options.truncate(true);
        }
        let file = options
            .open(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        dup2(file.as_raw_fd(), libc::STDOUT_FILENO).context("dup2 stdout")?;
    }

    Ok(())
}

/// Replace the child's image with the stage's program, searching `PATH`.
/// Only returns on failure.
fn replace_image(stage: &Stage) -> anyhow::Error {
    let argv: std::result::Result<Vec<CString>, _> = stage
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect();
    let argv = match argv {
        Ok(argv) => argv,
        Err(e) => return anyhow::Error::new(e).context("argument contains a NUL byte"),
    };

    match execvp(&argv[0], &argv) {
        Ok(infallible) => match infallible {},
        Err(e) => anyhow::Error::new(e).context("cannot execute"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Redirections;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use std::thread;
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    // The test runner is multithreaded; keep the forking tests serialized.
    fn lock_children() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap()
    }

    fn make_unique_temp_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("minishell_exec_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn stage(words: &[&str]) -> Stage {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn run_foreground(stages: Vec<Stage>, redirections: Redirections) {
        let mut jobs = JobSet::new();
        execute(
            PipelineSpec {
                stages,
                redirections,
                background: false,
            },
            &mut jobs,
        );
    }

    #[test]
    fn test_single_stage_output_redirection() {
        let _lock = lock_children();
        let dir = make_unique_temp_dir();
        let out = dir.join("out.txt");

        run_foreground(
            vec![stage(&["echo", "hello"])],
            Redirections {
                output: Some(out.clone()),
                ..Redirections::default()
            },
        );

        assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_two_stage_pipeline_counts_lines() {
        let _lock = lock_children();
        let dir = make_unique_temp_dir();
        let out = dir.join("count.txt");

        run_foreground(
            vec![stage(&["printf", "a\\nb\\nc\\n"]), stage(&["wc", "-l"])],
            Redirections {
                output: Some(out.clone()),
                ..Redirections::default()
            },
        );

        assert_eq!(fs::read_to_string(&out).unwrap().trim(), "3");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_input_redirection_feeds_first_stage() {
        let _lock = lock_children();
        let dir = make_unique_temp_dir();
        let input = dir.join("in.txt");
        let out = dir.join("out.txt");
        fs::write(&input, "a\nb\nc\n").unwrap();

        run_foreground(
            vec![stage(&["wc", "-l"])],
            Redirections {
                input: Some(input),
                output: Some(out.clone()),
                append: false,
            },
        );

        assert_eq!(fs::read_to_string(&out).unwrap().trim(), "3");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_append_keeps_previous_contents() {
        let _lock = lock_children();
        let dir = make_unique_temp_dir();
        let out = dir.join("log.txt");

        run_foreground(
            vec![stage(&["echo", "one"])],
            Redirections {
                output: Some(out.clone()),
                append: false,
                ..Redirections::default()
            },
        );
        run_foreground(
            vec![stage(&["echo", "two"])],
            Redirections {
                output: Some(out.clone()),
                append: true,
                ..Redirections::default()
            },
        );

        assert_eq!(fs::read_to_string(&out).unwrap(), "one\ntwo\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_truncate_overwrites_previous_contents() {
        let _lock = lock_children();
        let dir = make_unique_temp_dir();
        let out = dir.join("log.txt");

        run_foreground(
            vec![stage(&["echo", "a much longer first line"])],
            Redirections {
                output: Some(out.clone()),
                append: false,
                ..Redirections::default()
            },
        );
        run_foreground(
            vec![stage(&["echo", "b"])],
            Redirections {
                output: Some(out.clone()),
                append: false,
                ..Redirections::default()
            },
        );

        assert_eq!(fs::read_to_string(&out).unwrap(), "b\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_unknown_command_in_pipeline_does_not_deadlock() {
        let _lock = lock_children();
        let dir = make_unique_temp_dir();
        let out = dir.join("out.txt");

        // The first stage exits 127 without writing; if the parent leaked
        // the pipe's write end, wc would block forever on a pipe that never
        // reaches end-of-stream and this test would hang.
        run_foreground(
            vec![
                stage(&["definitely-not-a-command-minishell"]),
                stage(&["wc", "-l"]),
            ],
            Redirections {
                output: Some(out.clone()),
                ..Redirections::default()
            },
        );

        assert_eq!(fs::read_to_string(&out).unwrap().trim(), "0");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_background_pipeline_reports_done_exactly_once() {
        let _lock = lock_children();
        let mut jobs = JobSet::new();

        execute(
            PipelineSpec {
                stages: vec![stage(&["sleep", "1"])],
                redirections: Redirections::default(),
                background: true,
            },
            &mut jobs,
        );

        // Control came back without blocking; the job finishes within the
        // sleep duration and is reported exactly once.
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = jobs.reap_completed();
        while events.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(25));
            events = jobs.reap_completed();
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label, 1);
        assert!(jobs.reap_completed().is_empty());
    }

    #[test]
    fn test_background_multi_stage_pipeline_reaps_every_stage() {
        let _lock = lock_children();
        let mut jobs = JobSet::new();
        let dir = make_unique_temp_dir();
        let out = dir.join("out.txt");

        execute(
            PipelineSpec {
                stages: vec![stage(&["printf", "x\\ny\\n"]), stage(&["wc", "-l"])],
                redirections: Redirections {
                    output: Some(out.clone()),
                    ..Redirections::default()
                },
                background: true,
            },
            &mut jobs,
        );

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = jobs.reap_completed();
        while events.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(25));
            events = jobs.reap_completed();
        }

        assert_eq!(events.len(), 1);
        assert_eq!(fs::read_to_string(&out).unwrap().trim(), "2");
        let _ = fs::remove_dir_all(dir);
    }
}
