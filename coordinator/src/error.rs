use std::{error::Error, fmt, io};

use comms::ExchangeErr;
use simulation::{CodecErr, LoadErr, ModelErr};

/// The coordinator module's result type.
pub type Result<T> = std::result::Result<T, CoordinatorErr>;

/// A submitted request couldn't be completed.
///
/// Every variant but `NoWorkers` names the worker that failed.
#[derive(Debug)]
pub enum DispatchErr {
    NoWorkers,
    Io {
        worker: String,
        source: io::Error,
    },
    Rejected {
        worker: String,
        reason: String,
    },
    UnexpectedMessage {
        worker: String,
        expected: &'static str,
        got: &'static str,
    },
    ResultCount {
        worker: String,
        got: usize,
        expected: usize,
    },
    Codec {
        worker: String,
        source: CodecErr,
    },
}

impl DispatchErr {
    /// Attributes a failed exchange to `worker`.
    pub fn exchange(worker: impl Into<String>, err: ExchangeErr) -> Self {
        let worker = worker.into();

        match err {
            ExchangeErr::Io(source) => Self::Io { worker, source },
            ExchangeErr::Peer(reason) => Self::Rejected { worker, reason },
            ExchangeErr::Unexpected { expected, got } => Self::UnexpectedMessage {
                worker,
                expected,
                got,
            },
        }
    }
}

impl fmt::Display for DispatchErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchErr::NoWorkers => write!(f, "no worker is reachable"),
            DispatchErr::Io { worker, source } => write!(f, "worker {worker}: io error: {source}"),
            DispatchErr::Rejected { worker, reason } => {
                write!(f, "worker {worker} rejected the batch: {reason}")
            }
            DispatchErr::UnexpectedMessage {
                worker,
                expected,
                got,
            } => write!(f, "worker {worker}: expected {expected}, got {got}"),
            DispatchErr::ResultCount {
                worker,
                got,
                expected,
            } => write!(
                f,
                "worker {worker} returned {got} trajectories for a batch of {expected}"
            ),
            DispatchErr::Codec { worker, source } => {
                write!(f, "worker {worker} sent an undecodable result: {source}")
            }
        }
    }
}

impl Error for DispatchErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DispatchErr::Io { source, .. } => Some(source),
            DispatchErr::Codec { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A client request breaks the coordinator's bounds.
#[derive(Debug)]
pub enum RequestErr {
    TooManyReplicas { got: usize, max: usize },
    TooManyPoints { got: usize, max: usize },
    InvalidDeadline { what: &'static str, value: f64 },
}

impl fmt::Display for RequestErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestErr::TooManyReplicas { got, max } => {
                write!(f, "{got} replicas requested, at most {max} are allowed")
            }
            RequestErr::TooManyPoints { got, max } => {
                write!(f, "{got} sampling points requested, at most {max} are allowed")
            }
            RequestErr::InvalidDeadline { what, value } => {
                write!(f, "{what} must be finite and non negative, got {value}")
            }
        }
    }
}

impl Error for RequestErr {}

/// Failures while serving a client connection.
#[derive(Debug)]
pub enum CoordinatorErr {
    Io(io::Error),
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },
    Peer(String),
    Request(RequestErr),
    Load(LoadErr),
    Dispatch(DispatchErr),
    Sampling(ModelErr),
}

impl CoordinatorErr {
    /// Whether the client connection can't be used anymore.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoordinatorErr::Io(_))
    }

    /// Whether the client closed the connection.
    pub fn is_eof(&self) -> bool {
        matches!(self, CoordinatorErr::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

impl fmt::Display for CoordinatorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorErr::Io(e) => write!(f, "io error: {e}"),
            CoordinatorErr::UnexpectedMessage { expected, got } => {
                write!(f, "unexpected message: expected {expected}, got {got}")
            }
            CoordinatorErr::Peer(reason) => write!(f, "client reported an error: {reason}"),
            CoordinatorErr::Request(e) => write!(f, "invalid request: {e}"),
            CoordinatorErr::Load(e) => write!(f, "{e}"),
            CoordinatorErr::Dispatch(e) => write!(f, "dispatch failed: {e}"),
            CoordinatorErr::Sampling(e) => write!(f, "sampling failed: {e}"),
        }
    }
}

impl Error for CoordinatorErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CoordinatorErr::Io(e) => Some(e),
            CoordinatorErr::Request(e) => Some(e),
            CoordinatorErr::Load(e) => Some(e),
            CoordinatorErr::Dispatch(e) => Some(e),
            CoordinatorErr::Sampling(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CoordinatorErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ExchangeErr> for CoordinatorErr {
    fn from(value: ExchangeErr) -> Self {
        match value {
            ExchangeErr::Io(e) => Self::Io(e),
            ExchangeErr::Unexpected { expected, got } => Self::UnexpectedMessage { expected, got },
            ExchangeErr::Peer(reason) => Self::Peer(reason),
        }
    }
}

impl From<RequestErr> for CoordinatorErr {
    fn from(value: RequestErr) -> Self {
        Self::Request(value)
    }
}

impl From<LoadErr> for CoordinatorErr {
    fn from(value: LoadErr) -> Self {
        Self::Load(value)
    }
}

impl From<DispatchErr> for CoordinatorErr {
    fn from(value: DispatchErr) -> Self {
        Self::Dispatch(value)
    }
}

impl From<ModelErr> for CoordinatorErr {
    fn from(value: ModelErr) -> Self {
        Self::Sampling(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<CoordinatorErr> for io::Error {
    fn from(value: CoordinatorErr) -> Self {
        match value {
            CoordinatorErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
