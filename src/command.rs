//! Single commands, bounded-parallel command groups, build plans.
//!
//! A [`Command`] is one external-process invocation, immutable once built.
//! A [`CommandGroup`] runs independent commands with bounded concurrency and
//! reports each completion to the caller's sink. A [`BuildPlan`] is the
//! ordered pipeline a builder hands back: later steps must not start before
//! earlier ones have completed.

use crate::process::Supervised;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One external-process invocation: working directory, program, arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    cwd: PathBuf,
    program: PathBuf,
    args: Vec<String>,
}

impl Command {
    pub fn new(
        cwd: impl Into<PathBuf>,
        program: impl Into<PathBuf>,
        args: Vec<String>,
    ) -> Self {
        Self {
            cwd: cwd.into(),
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Start the process under supervision, echoing its output.
    pub fn spawn(&self) -> io::Result<Supervised> {
        let mut cmd = process::Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.cwd);
        Supervised::spawn(&mut cmd)
    }

    /// Spawn, wait for completion and return the exit code.
    pub fn status(&self) -> io::Result<i32> {
        self.spawn()?.wait()
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Cooperative cancellation flag checked by the group scheduler before each
/// member is started.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a group member did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The process could not be started.
    Spawn(String),
    /// The process exited with a non-zero status.
    Exit(i32),
    /// Scheduling was cancelled before this member started.
    Skipped,
}

/// One failed member of a [`CommandGroup`], tagged with its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFailure {
    pub label: String,
    pub reason: FailureReason,
}

impl std::fmt::Display for MemberFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            FailureReason::Spawn(err) => write!(f, "{}: failed to start: {}", self.label, err),
            FailureReason::Exit(code) => {
                write!(f, "{}: exited with status {}", self.label, code)
            }
            FailureReason::Skipped => write!(f, "{}: skipped after earlier failure", self.label),
        }
    }
}

/// A bounded-concurrency batch of independent commands, each tagged with a
/// label (for compiles, the originating source path).
#[derive(Debug)]
pub struct CommandGroup {
    members: Vec<(Command, String)>,
    jobs: usize,
}

impl CommandGroup {
    pub fn new(members: Vec<(Command, String)>, jobs: usize) -> Self {
        Self {
            members,
            jobs: jobs.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn members(&self) -> &[(Command, String)] {
        &self.members
    }

    /// Run every member, at most `jobs` at a time, and return the failures.
    ///
    /// `on_progress` receives `(completed, total, label)` once per member,
    /// with `completed` strictly increasing from 1 to the member count.
    /// Members are independent; no ordering between them is guaranteed.
    ///
    /// A failing member never stops its already-running siblings. With
    /// `fail_fast` the cancel token is tripped on the first failure, so
    /// members that have not started yet are skipped (still counted, and
    /// recorded as [`FailureReason::Skipped`]).
    pub fn run<F>(
        &self,
        cancel: &CancelToken,
        fail_fast: bool,
        on_progress: F,
    ) -> Result<Vec<MemberFailure>>
    where
        F: Fn(usize, usize, &str) + Send + Sync,
    {
        let total = self.members.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .context("failed to create compile worker pool")?;

        let completed = Mutex::new(0usize);
        let failures = Mutex::new(Vec::new());

        pool.install(|| {
            self.members.par_iter().for_each(|(command, label)| {
                let outcome = if cancel.is_cancelled() {
                    Some(FailureReason::Skipped)
                } else {
                    match command.status() {
                        Ok(0) => None,
                        Ok(code) => Some(FailureReason::Exit(code)),
                        Err(err) => Some(FailureReason::Spawn(err.to_string())),
                    }
                };

                if let Some(reason) = outcome {
                    if fail_fast {
                        cancel.cancel();
                    }
                    failures.lock().unwrap().push(MemberFailure {
                        label: label.clone(),
                        reason,
                    });
                }

                // Lock held across the callback so counts arrive in order.
                let mut count = completed.lock().unwrap();
                *count += 1;
                on_progress(*count, total, label);
            });
        });

        Ok(failures.into_inner().unwrap())
    }
}

/// One stage of a build plan.
#[derive(Debug)]
pub enum Step {
    /// Independent commands run with bounded concurrency.
    Group(CommandGroup),
    /// A single command, sequenced after every earlier step.
    Single(Command),
}

/// Ordered pipeline of stages; each stage starts only after the previous one
/// has fully completed.
pub type BuildPlan = Vec<Step>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn sh(cwd: &Path, script: &str) -> Command {
        Command::new(cwd, "/bin/sh", vec!["-c".into(), script.into()])
    }

    fn cwd() -> PathBuf {
        std::env::temp_dir()
    }

    #[test]
    fn test_display_joins_program_and_args() {
        let cmd = Command::new("/tmp", "/usr/bin/gcc", vec!["-c".into(), "a.c".into()]);
        assert_eq!(cmd.to_string(), "/usr/bin/gcc -c a.c");
    }

    #[test]
    fn test_status_returns_exit_code() {
        assert_eq!(sh(&cwd(), "exit 5").status().unwrap(), 5);
        assert_eq!(sh(&cwd(), "true").status().unwrap(), 0);
    }

    #[test]
    fn test_group_reports_every_member_in_order() {
        let dir = cwd();
        let members = (0..6)
            .map(|i| (sh(&dir, "true"), format!("src/{i}.c")))
            .collect();
        let group = CommandGroup::new(members, 3);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let failures = group
            .run(&CancelToken::new(), false, move |done, total, label| {
                sink.lock().unwrap().push((done, total, label.to_string()));
            })
            .unwrap();

        assert!(failures.is_empty());
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 6);
        for (i, (done, total, _)) in events.iter().enumerate() {
            assert_eq!(*done, i + 1);
            assert_eq!(*total, 6);
        }
    }

    #[test]
    fn test_group_bounds_concurrency() {
        // Four 300ms sleeps with two slots need at least two rounds.
        let dir = cwd();
        let members = (0..4)
            .map(|i| (sh(&dir, "sleep 0.3"), format!("{i}")))
            .collect();
        let group = CommandGroup::new(members, 2);

        let start = Instant::now();
        group
            .run(&CancelToken::new(), false, |_, _, _| {})
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(550));
    }

    #[test]
    fn test_group_collects_failures_but_finishes_siblings() {
        let dir = cwd();
        let members = vec![
            (sh(&dir, "exit 3"), "bad.c".to_string()),
            (sh(&dir, "true"), "good.c".to_string()),
        ];
        let group = CommandGroup::new(members, 2);

        let events = Arc::new(Mutex::new(0usize));
        let sink = events.clone();
        let failures = group
            .run(&CancelToken::new(), false, move |_, _, _| {
                *sink.lock().unwrap() += 1;
            })
            .unwrap();

        assert_eq!(*events.lock().unwrap(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].label, "bad.c");
        assert_eq!(failures[0].reason, FailureReason::Exit(3));
    }

    #[test]
    fn test_group_records_spawn_failures() {
        let dir = cwd();
        let members = vec![(
            Command::new(&dir, "/nonexistent/compiler", vec![]),
            "a.c".to_string(),
        )];
        let failures = CommandGroup::new(members, 1)
            .run(&CancelToken::new(), false, |_, _, _| {})
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].reason, FailureReason::Spawn(_)));
    }

    #[test]
    fn test_fail_fast_skips_unstarted_members() {
        // jobs = 1 means members never overlap, so whichever runs first
        // trips the token and the other two are skipped.
        let dir = cwd();
        let members = vec![
            (sh(&dir, "exit 1"), "first.c".to_string()),
            (sh(&dir, "exit 1"), "second.c".to_string()),
            (sh(&dir, "exit 1"), "third.c".to_string()),
        ];
        let group = CommandGroup::new(members, 1);

        let events = Arc::new(Mutex::new(0usize));
        let sink = events.clone();
        let failures = group
            .run(&CancelToken::new(), true, move |_, _, _| {
                *sink.lock().unwrap() += 1;
            })
            .unwrap();

        // Every member is still accounted for exactly once.
        assert_eq!(*events.lock().unwrap(), 3);
        assert_eq!(failures.len(), 3);
        assert!(failures.iter().any(|f| f.reason == FailureReason::Exit(1)));
        assert_eq!(
            failures
                .iter()
                .filter(|f| f.reason == FailureReason::Skipped)
                .count(),
            2
        );
    }

    #[test]
    fn test_jobs_clamped_to_one() {
        assert_eq!(CommandGroup::new(Vec::new(), 0).jobs(), 1);
    }
}
