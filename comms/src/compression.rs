//! Stateless compression for computation results before they cross the wire.

use std::{
    error::Error,
    fmt::{self, Display},
    io::{self, BufRead, BufReader, Read},
};

use zstd::stream::read::Decoder;

use crate::MAX_FRAME_LEN;

const LEVEL: i32 = 3;

/// The largest payload a decompression may produce.
const MAX_DECOMPRESSED_LEN: u64 = MAX_FRAME_LEN;

/// Error returned when a compressed payload can't be decompressed.
#[derive(Debug)]
pub struct CompressionErr(io::Error);

impl Display for CompressionErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed compressed payload: {}", self.0)
    }
}

impl Error for CompressionErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl From<CompressionErr> for io::Error {
    fn from(value: CompressionErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, value)
    }
}

/// Compresses `bytes`.
///
/// # Arguments
/// * `bytes` - The raw payload.
///
/// # Returns
/// The compressed payload.
pub fn compress(bytes: &[u8]) -> io::Result<Vec<u8>> {
    zstd::encode_all(bytes, LEVEL)
}

/// Decompresses a payload produced by `compress`.
///
/// # Arguments
/// * `bytes` - The compressed payload.
///
/// # Returns
/// The raw payload or a `CompressionErr` if `bytes` is malformed.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CompressionErr> {
    let mut raw = Vec::new();
    capped(bytes, MAX_DECOMPRESSED_LEN)?
        .read_to_end(&mut raw)
        .map_err(CompressionErr)?;

    Ok(raw)
}

/// Creates a streaming decompressor over `bytes`.
///
/// Malformed input past the frame header, or output growing past the frame
/// size limit, surfaces as `InvalidData` io errors while reading.
///
/// # Arguments
/// * `bytes` - The compressed payload.
///
/// # Returns
/// A buffered reader yielding the raw payload.
pub fn decompressor(bytes: &[u8]) -> Result<impl BufRead + '_, CompressionErr> {
    Ok(BufReader::new(capped(bytes, MAX_DECOMPRESSED_LEN)?))
}

fn capped(bytes: &[u8], limit: u64) -> Result<Capped<impl Read + '_>, CompressionErr> {
    let decoder = Decoder::new(bytes).map_err(CompressionErr)?;
    Ok(Capped {
        inner: decoder,
        remaining: limit,
    })
}

/// A reader failing once more than `remaining` bytes come out of `inner`.
struct Capped<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Read for Capped<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // One byte past the limit is enough to tell an overrun apart.
        let window = usize::try_from(self.remaining.saturating_add(1)).unwrap_or(usize::MAX);
        let len = buf.len().min(window);
        let n = self.inner.read(&mut buf[..len])?;

        if n as u64 > self.remaining {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "decompressed payload exceeds the frame size limit",
            ));
        }

        self.remaining -= n as u64;
        Ok(n)
    }
}
