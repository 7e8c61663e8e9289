use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::execution::{CommandSpec, ProcessExitStatus};

/// The four pipeline steps that execute an external command.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Installing,
    CloningSource,
    ConfiguringBuild,
    Compiling,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Installing,
        Stage::CloningSource,
        Stage::ConfiguringBuild,
        Stage::Compiling,
    ];
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Installing => "installing dependencies",
            Self::CloningSource => "cloning the source",
            Self::ConfiguringBuild => "configuring the build",
            Self::Compiling => "compiling",
        })
    }
}

/// One external command with the label shown to the operator.
///
/// Fields are private: a task is fixed once the plan is built and is consumed
/// by exactly one runner invocation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Task {
    stage: Stage,
    description: String,
    command: String,
    working_dir: Option<PathBuf>,
    verbose: bool,
}

impl Task {
    pub fn new(stage: Stage, description: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            stage,
            description: description.into(),
            command: command.into(),
            working_dir: None,
            verbose: false,
        }
    }

    pub fn working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn command_line(&self) -> &str {
        &self.command
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn command_spec(&self) -> CommandSpec {
        let spec = CommandSpec::shell(&self.command);
        match &self.working_dir {
            Some(dir) => spec.working_dir(dir),
            None => spec,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskResult {
    pub status: ProcessExitStatus,
    /// Merged stdout/stderr lines in arrival order.
    pub output: Vec<String>,
}

impl TaskResult {
    pub fn succeeded(&self) -> bool {
        self.status.succeeded()
    }
}
