//! Binary codec for trajectories and computation results.
//!
//! A trajectory is encoded as `[u32 BE sample count][count × record]` where a
//! record is `[f64 BE time][arity × f64 BE component]`. A computation result is
//! the plain concatenation of its trajectories, it ends where the input ends.

use std::io::{self, BufRead, Read};

use crate::{
    error::CodecErr,
    trajectory::{ComputationResult, Sample, Trajectory},
};

type CountType = u32;
const COUNT_SIZE: usize = size_of::<CountType>();
const VALUE_SIZE: usize = size_of::<f64>();

/// Upper bound for the samples preallocated from an untrusted count.
const MAX_PREALLOC: usize = 1 << 16;

/// The fixed size of every record of a model's trajectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    arity: usize,
}

impl SampleLayout {
    /// Creates a new `SampleLayout`.
    ///
    /// # Arguments
    /// * `arity` - The amount of state components in every sample.
    pub fn new(arity: usize) -> Self {
        Self { arity }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// The size in bytes of one encoded sample.
    pub fn record_size(&self) -> usize {
        VALUE_SIZE * (1 + self.arity)
    }

    /// The size in bytes of an encoded trajectory of `samples` samples.
    pub fn trajectory_size(&self, samples: usize) -> usize {
        COUNT_SIZE + samples * self.record_size()
    }
}

/// Appends the encoding of `trajectory` to `buf`.
///
/// # Returns
/// An error if a sample doesn't match `layout` or there are too many samples.
pub fn encode_trajectory(
    trajectory: &Trajectory,
    layout: SampleLayout,
    buf: &mut Vec<u8>,
) -> Result<(), CodecErr> {
    let count = CountType::try_from(trajectory.len())
        .map_err(|_| CodecErr::TooManySamples(trajectory.len()))?;

    buf.reserve(layout.trajectory_size(trajectory.len()));
    buf.extend_from_slice(&count.to_be_bytes());

    for sample in trajectory.samples() {
        if sample.state.len() != layout.arity() {
            return Err(CodecErr::ArityMismatch {
                got: sample.state.len(),
                expected: layout.arity(),
            });
        }

        buf.extend_from_slice(&sample.time.to_be_bytes());
        for value in &sample.state {
            buf.extend_from_slice(&value.to_be_bytes());
        }
    }

    Ok(())
}

/// Encodes every trajectory of `result` back to back.
pub fn encode_result(
    result: &ComputationResult,
    layout: SampleLayout,
) -> Result<Vec<u8>, CodecErr> {
    let total = result.iter().map(|t| layout.trajectory_size(t.len())).sum();
    let mut buf = Vec::with_capacity(total);

    for trajectory in result {
        encode_trajectory(trajectory, layout, &mut buf)?;
    }

    Ok(buf)
}

/// Decodes exactly one trajectory from `reader`.
///
/// This is the step both decode modes share. It reads the declared count and
/// then that many records, never fewer.
///
/// # Returns
/// The trajectory, or `CodecErr::Truncated` if the input ends early.
pub fn decode_trajectory<R: Read>(
    reader: &mut R,
    layout: SampleLayout,
) -> Result<Trajectory, CodecErr> {
    let mut count_buf = [0; COUNT_SIZE];
    read_exact_or_truncated(reader, &mut count_buf, 0, 0)?;
    let declared = CountType::from_be_bytes(count_buf);

    let mut trajectory = Trajectory::with_capacity((declared as usize).min(MAX_PREALLOC));
    let mut record = vec![0; layout.record_size()];

    for decoded in 0..declared {
        read_exact_or_truncated(reader, &mut record, declared, decoded)?;

        let mut values = record.chunks_exact(VALUE_SIZE).map(|chunk| {
            let mut bytes = [0; VALUE_SIZE];
            bytes.copy_from_slice(chunk);
            f64::from_be_bytes(bytes)
        });

        let time = values.next().unwrap_or_default();
        trajectory.push(Sample::new(time, values.collect()));
    }

    Ok(trajectory)
}

/// Decodes a whole computation result held in memory.
///
/// # Arguments
/// * `bytes` - The complete, already decompressed, result.
/// * `layout` - The layout of the model that produced it.
pub fn decode_result(bytes: &[u8], layout: SampleLayout) -> Result<ComputationResult, CodecErr> {
    let mut rest = bytes;
    let mut result = ComputationResult::new();

    while !rest.is_empty() {
        result.push(decode_trajectory(&mut rest, layout)?);
    }

    Ok(result)
}

/// Decodes a computation result from a stream of unknown length.
///
/// Stops once the reader reports no more data is available.
pub fn decode_stream<R: BufRead>(
    mut reader: R,
    layout: SampleLayout,
) -> Result<ComputationResult, CodecErr> {
    let mut result = ComputationResult::new();

    while !reader.fill_buf()?.is_empty() {
        result.push(decode_trajectory(&mut reader, layout)?);
    }

    Ok(result)
}

fn read_exact_or_truncated<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    declared: CountType,
    decoded: CountType,
) -> Result<(), CodecErr> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CodecErr::Truncated { declared, decoded },
        _ => CodecErr::Io(e),
    })
}
