use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// A single simulation run failed.
#[derive(Debug)]
pub enum ModelErr {
    ArityMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidState(String),
    InvalidDeadline(f64),
}

impl Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErr::ArityMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "the {what} has {got} components but the model expects {expected}"
            ),
            ModelErr::InvalidState(reason) => write!(f, "invalid model state: {reason}"),
            ModelErr::InvalidDeadline(deadline) => write!(
                f,
                "the deadline must be a finite non negative time, got {deadline}"
            ),
        }
    }
}

impl Error for ModelErr {}

/// A model couldn't be loaded into, or found in, a registry.
#[derive(Debug)]
pub enum LoadErr {
    Malformed(serde_json::Error),
    UnknownKind(String),
    UnsupportedVersion { kind: String, version: u32 },
    InvalidParams { kind: String, reason: String },
    Untrusted { name: String, fingerprint: String },
    NotFound(String),
}

impl Display for LoadErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadErr::Malformed(e) => write!(f, "malformed model blob: {e}"),
            LoadErr::UnknownKind(kind) => write!(f, "no model kind named {kind:?} in the catalog"),
            LoadErr::UnsupportedVersion { kind, version } => {
                write!(f, "model kind {kind:?} has no version {version}")
            }
            LoadErr::InvalidParams { kind, reason } => {
                write!(f, "invalid parameters for model kind {kind:?}: {reason}")
            }
            LoadErr::Untrusted { name, fingerprint } => write!(
                f,
                "model {name:?} with fingerprint {fingerprint} is not trusted"
            ),
            LoadErr::NotFound(name) => write!(f, "model {name:?} not found"),
        }
    }
}

impl Error for LoadErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadErr::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LoadErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value)
    }
}

/// The trajectory codec's error type.
#[derive(Debug)]
pub enum CodecErr {
    /// The input ended before the declared amount of samples was read.
    Truncated { declared: u32, decoded: u32 },
    ArityMismatch { got: usize, expected: usize },
    TooManySamples(usize),
    Io(io::Error),
}

impl Display for CodecErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecErr::Truncated { declared, decoded } => write!(
                f,
                "truncated trajectory, declared {declared} samples but only {decoded} \
                 were available"
            ),
            CodecErr::ArityMismatch { got, expected } => write!(
                f,
                "sample has {got} components but the layout holds {expected}"
            ),
            CodecErr::TooManySamples(n) => {
                write!(f, "a trajectory of {n} samples doesn't fit the u32 count")
            }
            CodecErr::Io(e) => write!(f, "io error while decoding: {e}"),
        }
    }
}

impl Error for CodecErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CodecErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<CodecErr> for io::Error {
    fn from(value: CodecErr) -> Self {
        match value {
            CodecErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
