use thiserror::Error;

/// Selection could not be resolved against a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    #[error("cannot find any entity to select: no prior selection and no master among {entities} entities")]
    NoMasterEntity { entities: usize },
}

/// A view string that cannot be laid out as a square grid on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedView {
    #[error("view is empty")]
    Empty,
    #[error("view of {len} cells is not a perfect square")]
    NotSquare { len: usize },
    #[error("view side of {side} cells exceeds the {max}-cell canvas")]
    TooLarge { side: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("backend answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("cannot decode backend response")]
    Decode(#[source] serde_json::Error),
    #[error("resource `{0}` missing from the resource index")]
    MissingResource(String),
    #[error("no sandbox is running")]
    NoSandbox,
}

/// Anything that can go wrong between asking for a new turn and installing it.
#[derive(Debug, Error)]
pub enum AdvanceError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}
