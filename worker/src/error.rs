use std::{error::Error, fmt, io};

use comms::ExchangeErr;
use simulation::{CodecErr, LoadErr, ModelErr};

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// A batch couldn't be completed, none of its trajectories are returned.
#[derive(Debug)]
pub enum BatchErr {
    Task { index: usize, source: ModelErr },
    ModelMismatch { index: usize, expected: String, got: String },
    Panicked(tokio::task::JoinError),
}

impl fmt::Display for BatchErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchErr::Task { index, source } => write!(f, "task {index} failed: {source}"),
            BatchErr::ModelMismatch {
                index,
                expected,
                got,
            } => write!(
                f,
                "task {index} references model {got:?} in a batch of {expected:?}"
            ),
            BatchErr::Panicked(e) => write!(f, "batch execution panicked: {e}"),
        }
    }
}

impl Error for BatchErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BatchErr::Task { source, .. } => Some(source),
            BatchErr::Panicked(e) => Some(e),
            _ => None,
        }
    }
}

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },
    Peer(String),
    Load(LoadErr),
    Batch(BatchErr),
    Codec(CodecErr),
}

impl WorkerErr {
    /// Whether the connection can't be used anymore.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerErr::Io(_))
    }

    /// Whether the peer closed the connection.
    pub fn is_eof(&self) -> bool {
        matches!(self, WorkerErr::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::UnexpectedMessage { expected, got } => {
                write!(f, "unexpected message: expected {expected}, got {got}")
            }
            WorkerErr::Peer(reason) => write!(f, "peer reported an error: {reason}"),
            WorkerErr::Load(e) => write!(f, "{e}"),
            WorkerErr::Batch(e) => write!(f, "{e}"),
            WorkerErr::Codec(e) => write!(f, "result encoding failed: {e}"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Load(e) => Some(e),
            WorkerErr::Batch(e) => Some(e),
            WorkerErr::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ExchangeErr> for WorkerErr {
    fn from(value: ExchangeErr) -> Self {
        match value {
            ExchangeErr::Io(e) => Self::Io(e),
            ExchangeErr::Unexpected { expected, got } => Self::UnexpectedMessage { expected, got },
            ExchangeErr::Peer(reason) => Self::Peer(reason),
        }
    }
}

impl From<LoadErr> for WorkerErr {
    fn from(value: LoadErr) -> Self {
        Self::Load(value)
    }
}

impl From<BatchErr> for WorkerErr {
    fn from(value: BatchErr) -> Self {
        Self::Batch(value)
    }
}

impl From<CodecErr> for WorkerErr {
    fn from(value: CodecErr) -> Self {
        Self::Codec(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<WorkerErr> for io::Error {
    fn from(value: WorkerErr) -> Self {
        match value {
            WorkerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
