use std::io;

/// Types that can be written into a frame body.
pub trait Serialize<'a> {
    /// Serializes `self` into `buf`.
    ///
    /// # Arguments
    /// * `buf` - The frame buffer, the length prefix was already reserved in it.
    ///
    /// # Returns
    /// An optional borrowed tail that must be written right after `buf`, this
    /// avoids copying large payloads into the frame buffer.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}
