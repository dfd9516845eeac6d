use std::io;

use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    Deserialize, ExchangeErr, LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN,
    msg::{Command, Msg, Payload},
};

/// The receiving end handle of the communication.
pub struct FrameReceiver<R: AsyncRead + Unpin> {
    rx: R,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    /// Creates a new `FrameReceiver` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub(super) fn new(rx: R) -> Self {
        Self { rx }
    }

    /// Waits to receive a new message from the inner receiver.
    ///
    /// # Arguments
    /// * `buf` - The buffer to use for deserialization, the returned
    ///           `T`'s lifetimes will be tied to this buffer.
    ///
    /// # Returns
    /// A result object that returns `T` on success or `io::Error` on failure.
    /// A peer that closed the connection yields `UnexpectedEof`.
    pub async fn recv_into<'buf, T>(&mut self, buf: &'buf mut Vec<u8>) -> io::Result<T>
    where
        T: Deserialize<'buf>,
    {
        let mut size_buf = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut size_buf).await?;
        let len = LenType::from_be_bytes(size_buf);

        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} bytes limit"),
            ));
        }

        buf.resize(len as usize, 0);
        self.rx.read_exact(buf).await?;

        T::deserialize(buf)
    }

    /// Receives the next message and requires it to be `expected`.
    pub async fn expect_command(
        &mut self,
        buf: &mut Vec<u8>,
        expected: Command,
    ) -> Result<(), ExchangeErr> {
        match self.recv_into(buf).await? {
            Msg::Control(cmd) if cmd == expected => Ok(()),
            msg => Err(unexpected(expected_name(expected), msg)),
        }
    }

    /// Receives the next message and requires it to be a text payload.
    pub async fn expect_text(&mut self, buf: &mut Vec<u8>) -> Result<String, ExchangeErr> {
        match self.recv_into(buf).await? {
            Msg::Data(Payload::Text(text)) => Ok(text.to_string()),
            msg => Err(unexpected("data/text", msg)),
        }
    }

    /// Receives the next message and requires it to be a bytes payload.
    pub async fn expect_bytes(&mut self, buf: &mut Vec<u8>) -> Result<Vec<u8>, ExchangeErr> {
        match self.recv_into(buf).await? {
            Msg::Data(Payload::Bytes(bytes)) => Ok(bytes.to_vec()),
            msg => Err(unexpected("data/bytes", msg)),
        }
    }

    /// Receives the next message and decodes it as an object payload.
    pub async fn expect_object<T: DeserializeOwned>(
        &mut self,
        buf: &mut Vec<u8>,
    ) -> Result<T, ExchangeErr> {
        match self.recv_into(buf).await? {
            Msg::Data(payload @ Payload::Object(_)) => Ok(payload.decode()?),
            msg => Err(unexpected("data/object", msg)),
        }
    }

    /// Receives the next message and requires it to be a results payload.
    ///
    /// # Returns
    /// The still compressed result bytes.
    pub async fn expect_results(&mut self, buf: &mut Vec<u8>) -> Result<Vec<u8>, ExchangeErr> {
        match self.recv_into(buf).await? {
            Msg::Data(Payload::Results(bytes)) => Ok(bytes.to_vec()),
            msg => Err(unexpected("data/results", msg)),
        }
    }
}

fn expected_name(cmd: Command) -> &'static str {
    use crate::msg::{ClientCommand as Cl, CoordinatorCommand as Co, WorkerCommand as Wk};

    match cmd {
        Command::Client(Cl::Init) => "client/INIT",
        Command::Client(Cl::Data) => "client/DATA",
        Command::Client(Cl::Ping) => "client/PING",
        Command::Client(Cl::CloseConnection) => "client/CLOSE_CONNECTION",
        Command::Coordinator(Co::InitResponse) => "coordinator/INIT_RESPONSE",
        Command::Coordinator(Co::DataResponse) => "coordinator/DATA_RESPONSE",
        Command::Coordinator(Co::Results) => "coordinator/RESULTS",
        Command::Coordinator(Co::Pong) => "coordinator/PONG",
        Command::Coordinator(Co::Ping) => "coordinator/PING",
        Command::Coordinator(Co::Init) => "coordinator/INIT",
        Command::Coordinator(Co::Task) => "coordinator/TASK",
        Command::Coordinator(Co::CloseConnection) => "coordinator/CLOSE_CONNECTION",
        Command::Worker(Wk::Pong) => "worker/PONG",
        Command::Worker(Wk::InitResponse) => "worker/INIT_RESPONSE",
    }
}

/// Maps a message that broke the expected sequence into an `ExchangeErr`.
fn unexpected(expected: &'static str, msg: Msg<'_>) -> ExchangeErr {
    match msg {
        Msg::Err(reason) => ExchangeErr::Peer(reason.into_owned()),
        msg => ExchangeErr::Unexpected {
            expected,
            got: msg.kind(),
        },
    }
}
