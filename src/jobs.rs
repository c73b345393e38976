//! Tracking and reaping of detached pipelines.

use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;

/// One detached pipeline: every stage's pid, the last of which is the
/// pid shown to the user.
#[derive(Debug)]
struct Job {
    label: usize,
    pids: Vec<Pid>,
    reported: bool,
}

/// A background job that has been observed finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FinishedJob {
    pub label: usize,
    pub pid: Pid,
}

/// The set of still-running background pipelines.
///
/// Mutated only by the single-threaded interactive loop (`track` when a
/// pipeline detaches, `reap_completed` once per iteration before the
/// prompt), so there is no locking anywhere.
#[derive(Debug, Default)]
pub(crate) struct JobSet {
    jobs: Vec<Job>,
}

impl JobSet {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Track a freshly detached pipeline and return its display label.
    ///
    /// Labels follow shell job-number conventions loosely: the size of the
    /// tracked set after insertion. They are display text, not keys, so a
    /// label may repeat after earlier jobs finish.
    pub fn track(&mut self, pids: Vec<Pid>) -> usize {
        let label = self.jobs.len() + 1;
        self.jobs.push(Job {
            label,
            pids,
            reported: false,
        });
        label
    }

    /// Non-blocking sweep over every tracked pid.
    ///
    /// Exited or signaled pids are removed; a failing wait (the pid was
    /// already reaped elsewhere or never existed) removes the pid silently.
    /// A job is reported exactly once, when its final stage is seen
    /// exiting, and its entry is dropped once all of its pids are gone.
    pub fn reap_completed(&mut self) -> Vec<FinishedJob> {
        let mut finished = Vec::new();
        for job in &mut self.jobs {
            let final_pid = job.pids.last().copied();
            let label = job.label;
            let reported = &mut job.reported;
            job.pids.retain(|&pid| {
                match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                    Ok(WaitStatus::StillAlive) => true,
                    Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => {
                        if Some(pid) == final_pid && !*reported {
                            *reported = true;
                            finished.push(FinishedJob { label, pid });
                        }
                        false
                    }
                    // Stopped or continued: the process still exists.
                    Ok(_) => true,
                    Err(_) => false,
                }
            });
        }
        self.jobs.retain(|job| !job.pids.is_empty());
        finished
    }
}
