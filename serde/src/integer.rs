use crate::{byte_reader::ByteReader, byte_writer::ByteWrite, error::SerdeErr, serde::Serde};

/// Longest encoding of a u64: ten groups of seven bits
pub const MAX_VARINT_BYTES: usize = 10;

/// Unsigned integer written in seven-bit groups, least significant group
/// first, with the high bit of each byte set while more groups follow.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct UnsignedVariableInteger {
    inner: u64,
}

impl UnsignedVariableInteger {
    pub fn new<T: Into<u64>>(value: T) -> Self {
        Self {
            inner: value.into(),
        }
    }

    pub fn get(&self) -> u64 {
        self.inner
    }

    pub fn set<T: Into<u64>>(&mut self, value: T) {
        self.inner = value.into();
    }
}

impl Serde for UnsignedVariableInteger {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        let mut value = self.inner;
        loop {
            let group = (value & 0x7F) as u8;
            value >>= 7;
            let proceed = value != 0;
            if proceed {
                writer.write_byte(group | 0x80);
            } else {
                writer.write_byte(group);
                return;
            }
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut output: u64 = 0;
        for index in 0..MAX_VARINT_BYTES {
            let byte = reader.read_byte()?;
            let group = u64::from(byte & 0x7F);
            let shift = 7 * index as u32;

            // the tenth group may only carry the single remaining bit
            if index == MAX_VARINT_BYTES - 1 && group > 1 {
                return Err(SerdeErr::VarIntOverflow);
            }
            output |= group << shift;

            if byte & 0x80 == 0 {
                return Ok(Self { inner: output });
            }
        }
        Err(SerdeErr::VarIntOverflow)
    }

    fn byte_length(&self) -> usize {
        let mut value = self.inner >> 7;
        let mut output = 1;
        while value != 0 {
            value >>= 7;
            output += 1;
        }
        output
    }
}

/// Signed integer, zig-zag mapped onto an [`UnsignedVariableInteger`] so
/// that small magnitudes of either sign stay short
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct SignedVariableInteger {
    inner: i64,
}

impl SignedVariableInteger {
    pub fn new<T: Into<i64>>(value: T) -> Self {
        Self {
            inner: value.into(),
        }
    }

    pub fn get(&self) -> i64 {
        self.inner
    }

    fn zigzag(&self) -> u64 {
        ((self.inner << 1) ^ (self.inner >> 63)) as u64
    }
}

impl Serde for SignedVariableInteger {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        UnsignedVariableInteger::new(self.zigzag()).ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let encoded = UnsignedVariableInteger::de(reader)?.get();
        let value = ((encoded >> 1) as i64) ^ -((encoded & 1) as i64);
        Ok(Self { inner: value })
    }

    fn byte_length(&self) -> usize {
        UnsignedVariableInteger::new(self.zigzag()).byte_length()
    }
}

// Tests
