use std::{error::Error, fmt, io};

use comms::ExchangeErr;

/// All errors that can occur while talking to a coordinator.
#[derive(Debug)]
pub enum ClientErr {
    /// The coordinator couldn't be reached.
    ConnectionFailed { addr: String, source: io::Error },
    /// The model couldn't be turned into a blob, caught before sending.
    InvalidModel(serde_json::Error),
    /// The coordinator answered with an `Err` frame.
    Rejected(String),
    /// The coordinator answered with something else than the expected reply.
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for ClientErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { addr, source } => {
                write!(f, "connection failed to {addr}: {source}")
            }
            Self::InvalidModel(e) => write!(f, "invalid model: {e}"),
            Self::Rejected(reason) => write!(f, "coordinator rejected the request: {reason}"),
            Self::UnexpectedMessage { expected, got } => {
                write!(f, "unexpected reply: expected {expected}, got {got}")
            }
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ClientErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ConnectionFailed { source, .. } => Some(source),
            Self::InvalidModel(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ExchangeErr> for ClientErr {
    fn from(e: ExchangeErr) -> Self {
        match e {
            ExchangeErr::Io(e) => Self::Io(e),
            ExchangeErr::Peer(reason) => Self::Rejected(reason),
            ExchangeErr::Unexpected { expected, got } => Self::UnexpectedMessage { expected, got },
        }
    }
}

impl From<ClientErr> for io::Error {
    fn from(e: ClientErr) -> Self {
        match e {
            ClientErr::Io(e) | ClientErr::ConnectionFailed { source: e, .. } => e,
            other => io::Error::other(other),
        }
    }
}
