use std::{error::Error, fmt, io};

/// Failures while reading the frames of a multi frame exchange.
#[derive(Debug)]
pub enum ExchangeErr {
    /// The transport failed or a frame couldn't be decoded.
    Io(io::Error),
    /// The peer sent a well formed frame that breaks the expected sequence.
    Unexpected {
        expected: &'static str,
        got: &'static str,
    },
    /// The peer answered with an `Err` frame.
    Peer(String),
}

impl ExchangeErr {
    /// Whether the peer closed the connection.
    pub fn is_eof(&self) -> bool {
        matches!(self, ExchangeErr::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

impl fmt::Display for ExchangeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeErr::Io(e) => write!(f, "io error: {e}"),
            ExchangeErr::Unexpected { expected, got } => {
                write!(f, "protocol desync: expected {expected}, got {got}")
            }
            ExchangeErr::Peer(reason) => write!(f, "peer reported an error: {reason}"),
        }
    }
}

impl Error for ExchangeErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExchangeErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ExchangeErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<ExchangeErr> for io::Error {
    fn from(value: ExchangeErr) -> Self {
        match value {
            ExchangeErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
