use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::execution::scratch::tail_lines;
use crate::execution::{
    CommandSpec, ExecutionResult, OutputSink, ProcessExecutor, ProcessExitStatus, ScratchBuffer,
    spawn_validated,
};
use crate::models::{CoreError, CoreErrorKind, Task, TaskResult};
use crate::progress::{Outcome, ProgressReporter};

/// Captured lines shown under a failed task.
pub const DIAGNOSTIC_TAIL_LINES: usize = 5;

/// Runs one task at a time and owns all operator-visible output for it.
pub struct TaskRunner<W: Write> {
    executor: Arc<dyn ProcessExecutor>,
    reporter: ProgressReporter<W>,
    scratch_dir: Option<PathBuf>,
}

impl<W: Write> TaskRunner<W> {
    pub fn new(executor: Arc<dyn ProcessExecutor>, out: W) -> Self {
        Self {
            executor,
            reporter: ProgressReporter::new(out),
            scratch_dir: None,
        }
    }

    /// Directory for scratch buffers; the system temp dir when unset.
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn tick_interval(mut self, tick: Duration) -> Self {
        self.reporter = self.reporter.tick_interval(tick);
        self
    }

    pub fn reporter(&self) -> &ProgressReporter<W> {
        &self.reporter
    }

    /// Prints a failure line for a check made after a task reported success.
    pub fn report_failure(&mut self, description: &str) -> ExecutionResult<()> {
        self.reporter.finish(Outcome::Failure, description)
    }

    /// Runs `task` to completion.
    ///
    /// Prints exactly one status line. On failure the last
    /// [`DIAGNOSTIC_TAIL_LINES`] captured lines follow it and a
    /// [`CoreErrorKind::TaskFailed`] error is returned; callers are expected
    /// to stop there.
    pub async fn run(&mut self, task: &Task) -> ExecutionResult<TaskResult> {
        let description = task.description();
        tracing::debug!(
            stage = ?task.stage(),
            command = %task.command_line(),
            working_dir = ?task.working_directory(),
            verbose = task.is_verbose(),
            "starting task"
        );

        let mut scratch = match self.create_scratch() {
            Ok(scratch) => scratch,
            Err(error) => return Err(self.fail_without_output(task, error)),
        };
        tracing::trace!(scratch = %scratch.path().display(), "capturing task output");

        let command = task.command_spec();
        let attempt = if task.is_verbose() {
            self.execute_verbose(&command, &mut scratch).await
        } else {
            self.execute_quiet(&command, &scratch, description).await
        };

        let status = match attempt {
            Ok(status) => status,
            Err(error) => {
                drop(scratch);
                return Err(self.fail_without_output(task, error));
            }
        };

        let output = match scratch.lines() {
            Ok(output) => output,
            Err(error) => {
                drop(scratch);
                return Err(self.fail_without_output(task, error));
            }
        };
        let result = TaskResult { status, output };

        if result.succeeded() {
            self.reporter
                .finish(Outcome::Success, description)
                .map_err(|error| error.at_stage(task.stage()))?;
            scratch.discard()?;
            tracing::debug!(stage = ?task.stage(), "task succeeded");
            return Ok(result);
        }

        self.reporter
            .finish(Outcome::Failure, description)
            .and_then(|()| {
                self.reporter
                    .diagnostics(tail_lines(&result.output, DIAGNOSTIC_TAIL_LINES))
            })
            .map_err(|error| error.at_stage(task.stage()))?;
        scratch.discard()?;

        tracing::error!(
            stage = ?task.stage(),
            status = ?result.status,
            captured_lines = result.output.len(),
            "task failed"
        );

        Err(CoreError::new(
            CoreErrorKind::TaskFailed,
            format!("{description}: {}", describe_status(result.status)),
        )
        .at_stage(task.stage()))
    }

    fn create_scratch(&self) -> ExecutionResult<ScratchBuffer> {
        match &self.scratch_dir {
            Some(dir) => ScratchBuffer::create_in(dir),
            None => ScratchBuffer::create(),
        }
    }

    async fn execute_quiet(
        &mut self,
        command: &CommandSpec,
        scratch: &ScratchBuffer,
        description: &str,
    ) -> ExecutionResult<ProcessExitStatus> {
        let sink = OutputSink::File(scratch.writer()?);
        let mut process = spawn_validated(self.executor.as_ref(), command, sink)?;
        self.reporter.track(process.as_mut(), description).await
    }

    async fn execute_verbose(
        &mut self,
        command: &CommandSpec,
        scratch: &mut ScratchBuffer,
    ) -> ExecutionResult<ProcessExitStatus> {
        let (sender, mut lines) = mpsc::unbounded_channel();
        let process = spawn_validated(self.executor.as_ref(), command, OutputSink::Lines(sender))?;

        while let Some(line) = lines.recv().await {
            self.reporter.echo(&line)?;
            scratch.append_line(&line)?;
        }

        process.wait().await
    }

    /// Reports a task that could not produce a status of its own.
    fn fail_without_output(&mut self, task: &Task, error: CoreError) -> CoreError {
        if let Err(report_error) = self.reporter.finish(Outcome::Failure, task.description()) {
            tracing::warn!(error = %report_error, "failed to report task failure");
        }
        tracing::error!(
            stage = ?task.stage(),
            kind = ?error.kind,
            message = %error.message,
            "task could not run"
        );
        error.at_stage(task.stage())
    }
}

fn describe_status(status: ProcessExitStatus) -> String {
    match status {
        ProcessExitStatus::ExitCode(code) => format!("exited with status {code}"),
        ProcessExitStatus::Terminated => "terminated by signal".to_string(),
    }
}
