//! Subprocess supervision with concurrent output draining.
//!
//! A [`Supervised`] process owns a spawned child for its whole lifetime. Both
//! output pipes are drained by dedicated threads from the moment the child
//! starts, so a chatty compiler can never fill a pipe buffer and stall while
//! the caller is blocked in [`Supervised::wait`]. The drainer handles are
//! retained and joined during `wait`, so no reader thread outlives the
//! process it was reading.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

/// One spawned OS process plus the threads draining its output streams.
pub struct Supervised {
    child: Child,
    drainers: Vec<JoinHandle<()>>,
}

impl Supervised {
    /// Spawn `cmd` and echo its output lines to this process's stdout/stderr.
    pub fn spawn(cmd: &mut Command) -> io::Result<Self> {
        Self::spawn_with_sinks(cmd, |line| println!("{line}"), |line| eprintln!("{line}"))
    }

    /// Spawn `cmd`, forwarding every complete stdout line to `on_stdout` and
    /// every stderr line to `on_stderr` until the streams are exhausted.
    pub fn spawn_with_sinks<O, E>(
        cmd: &mut Command,
        on_stdout: O,
        on_stderr: E,
    ) -> io::Result<Self>
    where
        O: FnMut(&str) + Send + 'static,
        E: FnMut(&str) + Send + 'static,
    {
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut drainers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            let mut sink = on_stdout;
            drainers.push(std::thread::spawn(move || drain_lines(out, &mut sink)));
        }
        if let Some(err) = child.stderr.take() {
            let mut sink = on_stderr;
            drainers.push(std::thread::spawn(move || drain_lines(err, &mut sink)));
        }

        Ok(Self { child, drainers })
    }

    /// OS process id of the child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Ask the OS to terminate the child. `wait` still has to be called to
    /// reap it and tear down the drainers.
    pub fn kill(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    /// Block until the process exits, then return its exit code.
    ///
    /// Taking `self` by value makes the Running -> Exited transition happen
    /// exactly once. The wait is a blocking OS-level reap, not a liveness
    /// poll; once the child is gone its pipes close, the drainers hit EOF and
    /// are joined before the code is returned.
    pub fn wait(mut self) -> io::Result<i32> {
        let status = self.child.wait()?;
        for handle in self.drainers.drain(..) {
            let _ = handle.join();
        }
        // code() is None when the child was killed by a signal
        Ok(status.code().unwrap_or(-1))
    }
}

fn drain_lines<R: Read>(stream: R, sink: &mut dyn FnMut(&str)) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        match line {
            Ok(text) => sink(&text),
            Err(_) => break,
        }
    }
}
