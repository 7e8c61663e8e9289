pub mod scratch;
pub mod tokio_process;

pub use scratch::ScratchBuffer;
pub use tokio_process::TokioProcessExecutor;

use std::collections::BTreeMap;
use std::fs::File;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::{CoreError, CoreErrorKind};

pub type ExecutionResult<T> = Result<T, CoreError>;

pub type ProcessWaitFuture =
    Pin<Box<dyn Future<Output = ExecutionResult<ProcessExitStatus>> + Send>>;

const SHELL: &str = "/bin/sh";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    /// A command line interpreted by `/bin/sh -c`.
    pub fn shell(command_line: &str) -> Self {
        Self::new(SHELL).arg("-c").arg(command_line)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn validate(&self) -> ExecutionResult<()> {
        if self.program.as_os_str().is_empty() {
            return Err(invalid_input("command program path must not be empty"));
        }

        if self
            .args
            .iter()
            .any(|arg| arg.trim().is_empty() || arg.contains('\0'))
        {
            return Err(invalid_input(
                "command args must be non-empty and must not contain NUL bytes",
            ));
        }

        if self
            .env
            .iter()
            .any(|(key, value)| key.is_empty() || key.contains('\0') || value.contains('\0'))
        {
            return Err(invalid_input(
                "environment keys and values must be non-empty and must not contain NUL bytes",
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProcessExitStatus {
    ExitCode(i32),
    Terminated,
}

impl ProcessExitStatus {
    pub fn succeeded(self) -> bool {
        self == Self::ExitCode(0)
    }

    pub(crate) fn from_std(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => Self::ExitCode(code),
            None => Self::Terminated,
        }
    }
}

/// Where a child's merged stdout/stderr goes.
#[derive(Debug)]
pub enum OutputSink {
    /// Both streams are written straight into this file.
    File(File),
    /// Both streams are read line by line and forwarded in arrival order.
    /// The channel closes once both streams reach EOF.
    Lines(mpsc::UnboundedSender<String>),
}

pub trait RunningProcess: Send {
    fn pid(&self) -> Option<u32>;

    /// Non-blocking liveness check; `Some` once the process has exited.
    fn try_wait(&mut self) -> ExecutionResult<Option<ProcessExitStatus>>;

    fn wait(self: Box<Self>) -> ProcessWaitFuture;
}

pub trait ProcessExecutor: Send + Sync {
    fn spawn(
        &self,
        command: &CommandSpec,
        sink: OutputSink,
    ) -> ExecutionResult<Box<dyn RunningProcess>>;
}

pub fn spawn_validated(
    executor: &dyn ProcessExecutor,
    command: &CommandSpec,
    sink: OutputSink,
) -> ExecutionResult<Box<dyn RunningProcess>> {
    command.validate()?;
    executor.spawn(command, sink)
}

fn invalid_input(message: &str) -> CoreError {
    CoreError::new(CoreErrorKind::InvalidInput, message)
}
