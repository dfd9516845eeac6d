use std::io;

/// Types that can be read back from a frame body.
pub trait Deserialize<'a>: Sized {
    /// Deserializes a frame body, the result may borrow from `buf`.
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}
