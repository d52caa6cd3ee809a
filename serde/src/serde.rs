use crate::{ByteCounter, ByteReader, ByteWrite, SerdeErr};

/// A type that can be written into and read back out of a byte stream
pub trait Serde: Sized + Clone + PartialEq {
    /// Writes the value into the stream
    fn ser(&self, writer: &mut dyn ByteWrite);

    /// Reads a value out of the stream
    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr>;

    /// Number of bytes `ser` would produce
    fn byte_length(&self) -> usize {
        let mut counter = ByteCounter::new();
        self.ser(&mut counter);
        counter.count()
    }
}
