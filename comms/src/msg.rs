use std::{borrow::Cow, fmt, io};

use serde::de::DeserializeOwned;

use crate::{Deserialize, Serialize};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

const ERR_H: Header = 0;
const CONTROL_H: Header = 1;
const TEXT_H: Header = 2;
const BYTES_H: Header = 3;
const OBJECT_H: Header = 4;
const RESULTS_H: Header = 5;

/// Commands sent by a client to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    Init,
    Data,
    Ping,
    CloseConnection,
}

/// Commands sent by the coordinator, either as replies to a client or as
/// requests to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorCommand {
    InitResponse,
    DataResponse,
    Results,
    Pong,
    Ping,
    Init,
    Task,
    CloseConnection,
}

/// Replies sent by a worker to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerCommand {
    Pong,
    InitResponse,
}

/// The command for the `Control` variant of the `Msg` enum.
///
/// Tokens are scoped by the role that sends them, a `client/INIT` and a
/// `coordinator/INIT` are different commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Client(ClientCommand),
    Coordinator(CoordinatorCommand),
    Worker(WorkerCommand),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Client(cmd) => write!(f, "client/{cmd:?}"),
            Command::Coordinator(cmd) => write!(f, "coordinator/{cmd:?}"),
            Command::Worker(cmd) => write!(f, "worker/{cmd:?}"),
        }
    }
}

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug)]
pub enum Payload<'a> {
    /// A short string, model names travel this way.
    Text(&'a str),
    /// An opaque blob, model code travels this way.
    Bytes(&'a [u8]),
    /// A JSON encoded record.
    Object(&'a [u8]),
    /// A compressed computation result.
    Results(&'a [u8]),
}

impl Payload<'_> {
    /// Decodes an `Object` payload into `T`.
    ///
    /// # Returns
    /// The decoded value or an `InvalidData` error if this is not an object
    /// payload or it doesn't match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> io::Result<T> {
        let Payload::Object(bytes) = self else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected an object payload, got {}", self.kind()),
            ));
        };

        serde_json::from_slice(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// A short name for this payload's kind, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text(_) => "data/text",
            Payload::Bytes(_) => "data/bytes",
            Payload::Object(_) => "data/object",
            Payload::Results(_) => "data/results",
        }
    }
}

/// The application layer message for the entire system.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
    /// A well formed control frame naming a command this build doesn't know.
    Unknown(&'a str),
}

impl Msg<'_> {
    /// A short name for this message's kind, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(_) => "control",
            Msg::Data(payload) => payload.kind(),
            Msg::Err(_) => "err",
            Msg::Unknown(_) => "unknown",
        }
    }

    fn buf_is_too_small<T>(size: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {HEADER_SIZE} bytes"),
        ))
    }

    fn invalid_kind_byte<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }
}

fn utf8(bytes: &[u8]) -> io::Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        let (kind, tail): (Header, Option<&'a [u8]>) = match self {
            Msg::Err(e) => (ERR_H, Some(e.as_bytes())),
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL_H.to_be_bytes());
                serde_json::to_writer(&mut *buf, cmd)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

                return Ok(None);
            }
            Msg::Unknown(raw) => (CONTROL_H, Some(raw.as_bytes())),
            Msg::Data(Payload::Text(text)) => (TEXT_H, Some(text.as_bytes())),
            Msg::Data(Payload::Bytes(bytes)) => (BYTES_H, Some(*bytes)),
            Msg::Data(Payload::Object(bytes)) => (OBJECT_H, Some(*bytes)),
            Msg::Data(Payload::Results(bytes)) => (RESULTS_H, Some(*bytes)),
        };

        buf.extend_from_slice(&kind.to_be_bytes());
        Ok(tail)
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len());
        }

        let (kind_buf, rest) = buf.split_at(HEADER_SIZE);
        let mut header = [0; HEADER_SIZE];
        header.copy_from_slice(kind_buf);

        match Header::from_be_bytes(header) {
            ERR_H => Ok(Self::Err(Cow::Borrowed(utf8(rest)?))),
            CONTROL_H => match serde_json::from_slice(rest) {
                Ok(cmd) => Ok(Self::Control(cmd)),
                Err(e) if e.is_data() => Ok(Self::Unknown(utf8(rest)?)),
                Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            },
            TEXT_H => Ok(Self::Data(Payload::Text(utf8(rest)?))),
            BYTES_H => Ok(Self::Data(Payload::Bytes(rest))),
            OBJECT_H => Ok(Self::Data(Payload::Object(rest))),
            RESULTS_H => Ok(Self::Data(Payload::Results(rest))),
            kind => Self::invalid_kind_byte(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: &Msg<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        let tail = msg.serialize(&mut buf).unwrap();
        if let Some(tail) = tail {
            buf.extend_from_slice(tail);
        }
        buf
    }

    #[test]
    fn control_tokens_are_role_scoped_json() {
        let msg = Msg::Control(Command::Client(ClientCommand::CloseConnection));
        let buf = roundtrip(&msg);
        assert_eq!(&buf[HEADER_SIZE..], br#"{"client":"CLOSE_CONNECTION"}"#);

        let Msg::Control(cmd) = Msg::deserialize(&buf).unwrap() else {
            panic!("expected a control message");
        };
        assert_eq!(cmd, Command::Client(ClientCommand::CloseConnection));
        assert_ne!(cmd, Command::Coordinator(CoordinatorCommand::CloseConnection));
    }

    #[test]
    fn unknown_token_is_not_an_error() {
        let mut buf = CONTROL_H.to_be_bytes().to_vec();
        buf.extend_from_slice(br#"{"client":"REBOOT"}"#);

        let msg = Msg::deserialize(&buf).unwrap();
        assert!(matches!(msg, Msg::Unknown(raw) if raw.contains("REBOOT")));
    }

    #[test]
    fn corrupt_control_frame_is_invalid_data() {
        let mut buf = CONTROL_H.to_be_bytes().to_vec();
        buf.extend_from_slice(b"{\"client\":");

        let err = Msg::deserialize(&buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn invalid_header_is_rejected() {
        let buf = 42u32.to_be_bytes();
        assert!(Msg::deserialize(&buf).is_err());
        assert!(Msg::deserialize(&buf[..2]).is_err());
    }

    #[test]
    fn object_payload_decodes() {
        let msg = Msg::Data(Payload::Object(br#"[1,2,3]"#));
        let buf = roundtrip(&msg);

        let Msg::Data(payload) = Msg::deserialize(&buf).unwrap() else {
            panic!("expected a data message");
        };
        let nums: Vec<u32> = payload.decode().unwrap();
        assert_eq!(nums, [1, 2, 3]);
        assert!(Payload::Text("x").decode::<u32>().is_err());
    }
}
