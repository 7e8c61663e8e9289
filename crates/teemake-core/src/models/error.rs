use crate::models::Stage;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    InvalidInput,
    Configuration,
    UnsupportedHost,
    AuthenticationFailed,
    InsufficientDiskSpace,
    ProcessFailure,
    TaskFailed,
    Io,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub stage: Option<Stage>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage: None,
            kind,
            message: message.into(),
        }
    }

    pub fn at_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub(crate) fn io(context: &str, error: std::io::Error) -> Self {
        Self::new(CoreErrorKind::Io, format!("{context}: {error}"))
    }
}
