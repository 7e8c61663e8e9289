#![cfg(unix)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use teemake_core::execution::{
    CommandSpec, ExecutionResult, OutputSink, ProcessExecutor, ProcessExitStatus,
    ProcessWaitFuture, RunningProcess, TokioProcessExecutor,
};
use teemake_core::models::{CoreError, CoreErrorKind, Stage, Task};
use teemake_core::progress::INDENT_MARKER;
use teemake_core::runner::TaskRunner;

const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";

struct FinishedProcess {
    status: ProcessExitStatus,
}

impl RunningProcess for FinishedProcess {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn try_wait(&mut self) -> ExecutionResult<Option<ProcessExitStatus>> {
        Ok(Some(self.status))
    }

    fn wait(self: Box<Self>) -> ProcessWaitFuture {
        Box::pin(async move { Ok(self.status) })
    }
}

/// Writes its canned output into the sink and reports an already-exited child.
struct CannedExecutor {
    lines: Vec<String>,
    status: ProcessExitStatus,
}

impl ProcessExecutor for CannedExecutor {
    fn spawn(
        &self,
        _command: &CommandSpec,
        sink: OutputSink,
    ) -> ExecutionResult<Box<dyn RunningProcess>> {
        match sink {
            OutputSink::File(mut file) => {
                for line in &self.lines {
                    writeln!(file, "{line}").map_err(|error| {
                        CoreError::new(CoreErrorKind::Io, error.to_string())
                    })?;
                }
            }
            OutputSink::Lines(sender) => {
                for line in &self.lines {
                    let _ = sender.send(line.clone());
                }
            }
        }

        Ok(Box::new(FinishedProcess {
            status: self.status,
        }))
    }
}

fn tokio_runner() -> TaskRunner<Vec<u8>> {
    TaskRunner::new(Arc::new(TokioProcessExecutor), Vec::new())
        .tick_interval(Duration::from_millis(10))
}

fn output(runner: &TaskRunner<Vec<u8>>) -> String {
    String::from_utf8_lossy(runner.reporter().writer()).to_string()
}

fn diagnostic_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix(INDENT_MARKER))
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn successful_task_prints_one_ok_line() {
    let mut runner = tokio_runner();
    let task = Task::new(Stage::Installing, "Installing dependencies", "echo done");

    let result = runner.run(&task).await.expect("task should succeed");

    assert_eq!(result.status, ProcessExitStatus::ExitCode(0));
    assert_eq!(result.output, vec!["done"]);

    let text = output(&runner);
    assert_eq!(text.matches("[  OK  ] Installing dependencies\n").count(), 1);
    assert!(!text.contains("[ FAIL ]"));
    assert!(diagnostic_lines(&text).is_empty());
}

#[tokio::test]
async fn failed_task_shows_only_the_last_five_lines() {
    let mut runner = tokio_runner();
    let task = Task::new(
        Stage::Compiling,
        "Compiling binary",
        "for i in 1 2 3 4 5 6 7 8; do echo line $i; done; exit 3",
    );

    let error = runner.run(&task).await.expect_err("task should fail");

    assert_eq!(error.kind, CoreErrorKind::TaskFailed);
    assert_eq!(error.stage, Some(Stage::Compiling));
    assert!(error.message.contains("exited with status 3"));

    let text = output(&runner);
    assert_eq!(text.matches("[ FAIL ] Compiling binary\n").count(), 1);
    assert!(!text.contains("[  OK  ]"));
    assert_eq!(
        diagnostic_lines(&text),
        vec!["line 4", "line 5", "line 6", "line 7", "line 8"]
    );
}

#[tokio::test]
async fn short_failure_output_is_shown_in_full() {
    let mut runner = tokio_runner();
    let task = Task::new(
        Stage::CloningSource,
        "Downloading DDNet",
        "echo 'fatal: repository not found' 1>&2; exit 128",
    );

    runner.run(&task).await.expect_err("task should fail");

    assert_eq!(
        diagnostic_lines(&output(&runner)),
        vec!["fatal: repository not found"]
    );
}

#[tokio::test]
async fn failure_without_output_prints_no_diagnostics() {
    let mut runner = tokio_runner();
    let task = Task::new(Stage::ConfiguringBuild, "Initializing build system", "exit 1");

    runner.run(&task).await.expect_err("task should fail");

    let text = output(&runner);
    assert_eq!(text.matches("[ FAIL ]").count(), 1);
    assert!(diagnostic_lines(&text).is_empty());
}

#[tokio::test]
async fn signal_termination_is_a_failure() {
    let mut runner = tokio_runner();
    let task = Task::new(Stage::Compiling, "Compiling binary", "kill -9 $$");

    let error = runner.run(&task).await.expect_err("task should fail");

    assert_eq!(error.kind, CoreErrorKind::TaskFailed);
    assert!(error.message.contains("terminated by signal"));
}

#[tokio::test]
async fn scratch_buffers_are_removed_after_success_and_failure() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let mut runner = tokio_runner().scratch_dir(scratch.path());

    runner
        .run(&Task::new(Stage::Installing, "ok", "echo fine"))
        .await
        .expect("task should succeed");
    runner
        .run(&Task::new(Stage::Compiling, "broken", "echo nope; exit 1"))
        .await
        .expect_err("task should fail");
    runner
        .run(&Task::new(Stage::Compiling, "verbose", "echo loud").verbose(true))
        .await
        .expect("task should succeed");

    let leftovers: Vec<_> = std::fs::read_dir(scratch.path())
        .expect("read scratch dir")
        .collect();
    assert!(leftovers.is_empty(), "scratch files left behind: {leftovers:?}");
}

#[tokio::test]
async fn quiet_task_animates_behind_a_hidden_cursor() {
    let mut runner = tokio_runner();
    let task = Task::new(Stage::Compiling, "Compiling binary", "sleep 0.3");

    runner.run(&task).await.expect("task should succeed");

    let text = output(&runner);
    let hidden = text.find(HIDE_CURSOR).expect("cursor should be hidden");
    let shown = text.rfind(SHOW_CURSOR).expect("cursor should be restored");
    let status = text.rfind("[  OK  ] Compiling binary").expect("status line");
    assert!(hidden < shown && shown < status);
    assert!(text.contains("======"));
    assert!(text.contains("Compiling binary"));
}

#[tokio::test]
async fn cancelled_quiet_task_restores_the_cursor() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let mut runner = tokio_runner().scratch_dir(scratch.path());
    let task = Task::new(Stage::Compiling, "Compiling binary", "sleep 5");

    let outcome = tokio::time::timeout(Duration::from_millis(200), runner.run(&task)).await;
    assert!(outcome.is_err(), "task should still be running");

    let text = output(&runner);
    assert!(text.contains(HIDE_CURSOR));
    assert!(text.ends_with(SHOW_CURSOR));
    assert!(!text.contains("[  OK  ]"));
    assert!(!text.contains("[ FAIL ]"));

    let leftovers: Vec<_> = std::fs::read_dir(scratch.path())
        .expect("read scratch dir")
        .collect();
    assert!(leftovers.is_empty(), "scratch files left behind: {leftovers:?}");
}

#[tokio::test]
async fn already_exited_process_draws_no_frames() {
    let executor = CannedExecutor {
        lines: vec!["instant".to_string()],
        status: ProcessExitStatus::ExitCode(0),
    };
    let mut runner = TaskRunner::new(Arc::new(executor), Vec::new());
    let task = Task::new(Stage::Installing, "Installing dependencies", "true");

    let result = runner.run(&task).await.expect("task should succeed");

    assert_eq!(result.output, vec!["instant"]);
    let text = output(&runner);
    assert!(!text.contains(HIDE_CURSOR));
    assert!(!text.contains('='));
    assert_eq!(text.matches("[  OK  ]").count(), 1);
}

#[tokio::test]
async fn verbose_task_streams_every_line_before_its_status() {
    let mut runner = tokio_runner();
    let task = Task::new(
        Stage::CloningSource,
        "Downloading zCatch",
        "echo alpha; echo beta 1>&2",
    )
    .verbose(true);

    let result = runner.run(&task).await.expect("task should succeed");

    let mut captured = result.output.clone();
    captured.sort();
    assert_eq!(captured, vec!["alpha", "beta"]);

    let text = output(&runner);
    let mut streamed = diagnostic_lines(&text);
    streamed.sort();
    assert_eq!(streamed, vec!["alpha", "beta"]);
    assert!(text.ends_with("[  OK  ] Downloading zCatch\n"));
    assert!(!text.contains(HIDE_CURSOR));
}

#[tokio::test]
async fn verbose_failure_repeats_the_tail_after_the_status() {
    let executor = CannedExecutor {
        lines: (1..=7).map(|index| format!("out {index}")).collect(),
        status: ProcessExitStatus::ExitCode(2),
    };
    let mut runner = TaskRunner::new(Arc::new(executor), Vec::new());
    let task = Task::new(Stage::Compiling, "Compiling binary", "make").verbose(true);

    runner.run(&task).await.expect_err("task should fail");

    let text = output(&runner);
    let (streamed, after) = text
        .split_once("[ FAIL ] Compiling binary\n")
        .expect("failure line");
    assert_eq!(diagnostic_lines(streamed).len(), 7);
    assert_eq!(
        diagnostic_lines(after),
        vec!["out 3", "out 4", "out 5", "out 6", "out 7"]
    );
}

#[tokio::test]
async fn spawn_failure_reports_one_failed_line() {
    let mut runner = tokio_runner();
    let task = Task::new(Stage::Compiling, "Compiling binary", "make")
        .working_dir("/nonexistent/teemake/build");

    let error = runner.run(&task).await.expect_err("spawn should fail");

    assert_eq!(error.kind, CoreErrorKind::ProcessFailure);
    assert_eq!(error.stage, Some(Stage::Compiling));
    let text = output(&runner);
    assert_eq!(text.matches("[ FAIL ] Compiling binary\n").count(), 1);
}
