use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use crate::execution::{
    CommandSpec, ExecutionResult, OutputSink, ProcessExecutor, ProcessExitStatus,
    ProcessWaitFuture, RunningProcess,
};
use crate::models::{CoreError, CoreErrorKind};

pub struct TokioProcessExecutor;

impl ProcessExecutor for TokioProcessExecutor {
    fn spawn(
        &self,
        command: &CommandSpec,
        sink: OutputSink,
    ) -> ExecutionResult<Box<dyn RunningProcess>> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);

        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        let forward_to = match sink {
            OutputSink::File(file) => {
                let stderr = file.try_clone().map_err(|error| {
                    process_failure(format!("failed to duplicate output handle: {error}"))
                })?;
                cmd.stdout(Stdio::from(file));
                cmd.stderr(Stdio::from(stderr));
                None
            }
            OutputSink::Lines(sender) => {
                cmd.stdout(Stdio::piped());
                cmd.stderr(Stdio::piped());
                Some(sender)
            }
        };

        let mut child = cmd
            .spawn()
            .map_err(|error| process_failure(format!("failed to spawn process: {error}")))?;

        let pid = child.id();
        tracing::debug!(
            pid = ?pid,
            program = %command.program.display(),
            working_dir = ?command.working_dir,
            "spawned process"
        );

        if let Some(sender) = forward_to {
            if let Some(stdout) = child.stdout.take() {
                tokio::spawn(forward_lines(stdout, sender.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(forward_lines(stderr, sender));
            }
        }

        Ok(Box::new(TokioRunningProcess { child, pid }))
    }
}

struct TokioRunningProcess {
    child: tokio::process::Child,
    pid: Option<u32>,
}

impl RunningProcess for TokioRunningProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn try_wait(&mut self) -> ExecutionResult<Option<ProcessExitStatus>> {
        self.child
            .try_wait()
            .map(|status| status.map(ProcessExitStatus::from_std))
            .map_err(|error| process_failure(format!("failed to poll process: {error}")))
    }

    fn wait(self: Box<Self>) -> ProcessWaitFuture {
        let mut child = self.child;

        Box::pin(async move {
            let status = child
                .wait()
                .await
                .map_err(|error| process_failure(format!("failed to wait for process: {error}")))?;
            Ok(ProcessExitStatus::from_std(status))
        })
    }
}

async fn forward_lines<R>(stream: R, sender: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if sender.send(line).is_err() {
                    break;
                }
            }
        }
    }
}

fn process_failure(message: String) -> CoreError {
    CoreError::new(CoreErrorKind::ProcessFailure, message)
}
