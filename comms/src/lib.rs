mod compression;
mod deserialize;
mod error;
pub mod msg;
mod receiver;
mod sender;
mod serialize;
pub mod session;
pub mod specs;
pub mod transport;

use tokio::io::{AsyncRead, AsyncWrite};

pub use compression::{CompressionErr, compress, decompress, decompressor};
pub use deserialize::Deserialize;
pub use error::ExchangeErr;
pub use receiver::FrameReceiver;
pub use sender::FrameSender;
pub use serialize::Serialize;
pub use session::{Role, Session};
pub use transport::{Listener, NetRx, NetTx, NetworkEndpoint, TlsMaterial, Transport, TransportMode};

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// The largest frame body a receiver accepts.
const MAX_FRAME_LEN: LenType = 1 << 30;

/// Creates both `FrameReceiver` and `FrameSender` network channel parts.
///
/// Given a writer and reader creates and returns both ends of the communication.
///
/// # Arguments
/// * `rx` - An async readable.
/// * `tx` - An async writable.
///
/// # Returns
/// A communication stream in the form of a frame receiver and sender.
pub fn channel<R, W>(rx: R, tx: W) -> (FrameReceiver<R>, FrameSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (FrameReceiver::new(rx), FrameSender::new(tx))
}
