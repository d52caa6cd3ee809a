use std::fmt;

use skein_serde::{ByteReader, ByteWrite, Serde, SerdeErr};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 16-bit identifier of a remote-callable method, derived from its fully
/// qualified signature
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodHash(u16);

impl MethodHash {
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// FNV-1a over the signature's bytes, folded from 32 to 16 bits
    pub fn of(signature: &str) -> Self {
        let mut hash = FNV_OFFSET_BASIS;
        for byte in signature.as_bytes() {
            hash ^= u32::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        Self(((hash >> 16) ^ (hash & 0xFFFF)) as u16)
    }

    pub fn to_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for MethodHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodHash({:#06x})", self.0)
    }
}

impl fmt::Display for MethodHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl Serde for MethodHash {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self(u16::de(reader)?))
    }

    fn byte_length(&self) -> usize {
        2
    }
}
