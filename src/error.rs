use thiserror::Error;

/// Errors that end a view controller or a background task.
///
/// `UserQuit` is not a failure: it is how a controller reports that the user
/// asked to leave. Coordinators absorb it instead of propagating it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("UI Closed")]
    UserQuit,
    #[error("cancelled")]
    Cancelled,
    #[error("terminal: {0}")]
    Terminal(#[from] std::io::Error),
    #[error("render: {0}")]
    Render(String),
    #[error("setup: {0}")]
    Setup(String),
    #[error("task: {0}")]
    Task(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn is_user_quit(&self) -> bool {
        matches!(self, Error::UserQuit)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
