use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::execution::ExecutionResult;
use crate::models::{CoreError, CoreErrorKind, Stage, Task, TaskResult};
use crate::runner::TaskRunner;
use crate::selection::{BuildSystem, Selection, is_valid_server_name};

pub const SOURCE_DIR_NAME: &str = "source";
pub const BUILD_DIR_NAME: &str = "server";

const CHECKOUT_MISSING: &str = "Git repository not properly cloned";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    AwaitingSelection,
    ResolvingDependencies,
    Installing,
    CloningSource,
    ConfiguringBuild,
    Compiling,
    Complete,
    Aborted,
}

impl From<Stage> for PipelineState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Installing => Self::Installing,
            Stage::CloningSource => Self::CloningSource,
            Stage::ConfiguringBuild => Self::ConfiguringBuild,
            Stage::Compiling => Self::Compiling,
        }
    }
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Aborted)
    }
}

/// `<base>/<server-name>/{source,server}`; the build directory sits next to
/// the checkout so the configure step can refer to `../source/`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ServerLayout {
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
}

impl ServerLayout {
    pub fn new(base_dir: impl AsRef<Path>, server_name: &str) -> Result<Self, CoreError> {
        if !is_valid_server_name(server_name) {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("'{server_name}' is not a valid server name"),
            ));
        }

        let root = base_dir.as_ref().join(server_name);
        Ok(Self {
            source_dir: root.join(SOURCE_DIR_NAME),
            build_dir: root.join(BUILD_DIR_NAME),
            root,
        })
    }

    /// Creates both directories; existing ones are kept as they are.
    pub fn create(&self) -> Result<(), CoreError> {
        for dir in [&self.source_dir, &self.build_dir] {
            std::fs::create_dir_all(dir).map_err(|error| {
                CoreError::io(&format!("failed to create '{}'", dir.display()), error)
            })?;
        }
        Ok(())
    }

    pub fn has_checkout(&self) -> bool {
        self.source_dir.join(".git").exists()
    }
}

/// Knobs that shape the task list but are not part of the selection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlanOptions {
    pub verbose: bool,
    /// Prefix package installation with `sudo`.
    pub elevate: bool,
    pub build_jobs: usize,
}

/// The fixed, ordered task list for one build.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PipelinePlan {
    pub server_name: String,
    pub layout: ServerLayout,
    pub selection: Selection,
    tasks: Vec<Task>,
}

impl PipelinePlan {
    pub fn new(
        server_name: &str,
        base_dir: impl AsRef<Path>,
        selection: Selection,
        options: PlanOptions,
    ) -> Result<Self, CoreError> {
        let layout = ServerLayout::new(base_dir, server_name)?;
        let mode = selection.mode;
        let ninja = selection.build_system == BuildSystem::Ninja;

        let install_description = if ninja {
            format!("Installing dependencies for {mode} with Ninja")
        } else {
            format!("Installing dependencies for {mode}")
        };
        let install = Task::new(
            Stage::Installing,
            install_description,
            selection
                .package_manager
                .install_command(&selection.dependencies, options.elevate),
        );

        let clone = Task::new(
            Stage::CloningSource,
            format!("Downloading {mode}"),
            format!("git clone --recursive {} .", selection.source_url),
        )
        .working_dir(&layout.source_dir);

        let configure = Task::new(
            Stage::ConfiguringBuild,
            "Initializing build system",
            selection.build_command.clone(),
        )
        .working_dir(&layout.build_dir);

        let jobs = options.build_jobs.max(1);
        let compile = match selection.build_system {
            BuildSystem::Ninja => Task::new(Stage::Compiling, "Compiling binary with Ninja", "ninja"),
            BuildSystem::Make => Task::new(
                Stage::Compiling,
                format!("Compiling binary (using {jobs} cores)"),
                format!("make -j{jobs}"),
            ),
        }
        .working_dir(&layout.build_dir);

        let tasks = [install, clone, configure, compile]
            .into_iter()
            .map(|task| task.verbose(options.verbose))
            .collect();

        Ok(Self {
            server_name: server_name.to_string(),
            layout,
            selection,
            tasks,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, stage: Stage) -> Option<&Task> {
        self.tasks.iter().find(|task| task.stage() == stage)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineReport {
    pub results: Vec<(Stage, TaskResult)>,
    pub build_dir: PathBuf,
}

/// Drives a plan through the runner, strictly in order, stopping at the first
/// failure. Nothing created before a failure is removed.
pub struct PipelineDriver<W: Write> {
    runner: TaskRunner<W>,
    state: PipelineState,
    visited: Vec<PipelineState>,
}

impl<W: Write> PipelineDriver<W> {
    pub fn new(runner: TaskRunner<W>) -> Self {
        Self {
            runner,
            state: PipelineState::AwaitingSelection,
            visited: vec![PipelineState::AwaitingSelection],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn visited(&self) -> &[PipelineState] {
        &self.visited
    }

    pub fn runner(&self) -> &TaskRunner<W> {
        &self.runner
    }

    pub async fn run(&mut self, plan: &PipelinePlan) -> ExecutionResult<PipelineReport> {
        if self.state != PipelineState::AwaitingSelection {
            return Err(CoreError::new(
                CoreErrorKind::Internal,
                format!("pipeline cannot start from state {:?}", self.state),
            ));
        }

        // The plan already carries the resolved selection and dependency list.
        self.enter(PipelineState::ResolvingDependencies);

        let mut results = Vec::with_capacity(plan.tasks().len());
        for task in plan.tasks() {
            let stage = task.stage();
            self.enter(stage.into());

            if stage == Stage::CloningSource
                && let Err(error) = plan.layout.create()
            {
                return Err(self.abort(error.at_stage(stage)));
            }

            let result = match self.runner.run(task).await {
                Ok(result) => result,
                Err(error) => return Err(self.abort(error)),
            };

            if stage == Stage::CloningSource && !plan.layout.has_checkout() {
                if let Err(report_error) = self.runner.report_failure(CHECKOUT_MISSING) {
                    tracing::warn!(error = %report_error, "failed to report missing checkout");
                }
                let error = CoreError::new(
                    CoreErrorKind::TaskFailed,
                    format!(
                        "'{}' does not contain a git checkout",
                        plan.layout.source_dir.display()
                    ),
                )
                .at_stage(stage);
                return Err(self.abort(error));
            }

            results.push((stage, result));
        }

        self.enter(PipelineState::Complete);
        Ok(PipelineReport {
            results,
            build_dir: plan.layout.build_dir.clone(),
        })
    }

    fn enter(&mut self, state: PipelineState) {
        tracing::debug!(from = ?self.state, to = ?state, "pipeline transition");
        self.state = state;
        self.visited.push(state);
    }

    fn abort(&mut self, error: CoreError) -> CoreError {
        self.enter(PipelineState::Aborted);
        error
    }
}
