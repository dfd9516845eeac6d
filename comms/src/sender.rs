//! The implementation of the sending end of the application layer protocol.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{
    LEN_TYPE_SIZE, LenType, Serialize,
    msg::{Msg, Payload},
};

/// The sending end handle of the communication.
pub struct FrameSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    buf: Vec<u8>,
    obj_buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    /// Creates a new `FrameSender` instance.
    ///
    /// # Arguments
    /// * `tx` - The underlying writer.
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            buf: Vec::new(),
            obj_buf: Vec::new(),
        }
    }

    /// Sends `msg` through the inner sender.
    ///
    /// # Arguments
    /// * `msg` - A serializable object.
    ///
    /// # Returns
    /// A result object that returns `io::Error` on failure.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        let Self { buf, tx, .. } = self;
        write_frame(tx, buf, msg).await
    }

    /// Serializes `value` as JSON and sends it as an object payload.
    ///
    /// # Arguments
    /// * `value` - Any serde serializable record.
    ///
    /// # Returns
    /// An `InvalidData` error if `value` can't be represented as JSON, or the
    /// underlying io error.
    pub async fn send_object<T: serde::Serialize>(&mut self, value: &T) -> io::Result<()> {
        let Self { buf, tx, obj_buf } = self;

        obj_buf.clear();
        serde_json::to_writer(&mut *obj_buf, value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let msg = Msg::Data(Payload::Object(obj_buf.as_slice()));
        write_frame(tx, buf, &msg).await
    }

    /// Shuts down the writing half, the peer will observe an end of stream.
    pub async fn close(&mut self) -> io::Result<()> {
        self.tx.shutdown().await
    }
}

async fn write_frame<'a, W, T>(tx: &mut W, buf: &mut Vec<u8>, msg: &'a T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize<'a>,
{
    buf.clear();
    buf.resize(LEN_TYPE_SIZE, 0);

    let zero_copy_data = msg.serialize(buf)?;
    let len = buf.len() - LEN_TYPE_SIZE + zero_copy_data.map(<[_]>::len).unwrap_or_default();
    let header = (len as LenType).to_be_bytes();

    buf[..header.len()].copy_from_slice(&header);
    tx.write_all(buf).await?;

    if let Some(data) = zero_copy_data {
        tx.write_all(data).await?;
    }

    tx.flush().await
}
