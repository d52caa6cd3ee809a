use std::{
    fmt,
    ops::{BitAnd, BitOr, BitOrAssign},
};

use skein_serde::{ByteReader, ByteWrite, Serde, SerdeErr, UnsignedVariableInteger};

use crate::constants::MAX_FIELDS_PER_COMPONENT;

/// A 64-bit set of changed fields (or components, at entity level). Bit `i`
/// stands for the `i`-th field in declaration order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DirtyMask(u64);

impl DirtyMask {
    pub const EMPTY: DirtyMask = DirtyMask(0);

    pub fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Mask with the lowest `count` bits set
    pub fn all(count: usize) -> Self {
        if count >= MAX_FIELDS_PER_COMPONENT {
            Self(u64::MAX)
        } else {
            Self((1u64 << count) - 1)
        }
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn bit(&self, index: u8) -> bool {
        index < 64 && self.0 & (1u64 << index) != 0
    }

    pub fn set_bit(&mut self, index: u8) {
        if index < 64 {
            self.0 |= 1u64 << index;
        }
    }

    pub fn clear_bit(&mut self, index: u8) {
        if index < 64 {
            self.0 &= !(1u64 << index);
        }
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_clear(&self) -> bool {
        self.0 == 0
    }

    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Index one past the highest set bit, 0 when clear
    pub fn width(&self) -> usize {
        64 - self.0.leading_zeros() as usize
    }

    /// Indices of the set bits, ascending
    pub fn iter(&self) -> DirtyBits {
        DirtyBits { remaining: self.0 }
    }
}

impl BitAnd for DirtyMask {
    type Output = DirtyMask;

    fn bitand(self, rhs: Self) -> Self::Output {
        DirtyMask(self.0 & rhs.0)
    }
}

impl BitOr for DirtyMask {
    type Output = DirtyMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        DirtyMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for DirtyMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for DirtyMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirtyMask({:#b})", self.0)
    }
}

impl Serde for DirtyMask {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        UnsignedVariableInteger::new(self.0).ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self(UnsignedVariableInteger::de(reader)?.get()))
    }

    fn byte_length(&self) -> usize {
        UnsignedVariableInteger::new(self.0).byte_length()
    }
}

pub struct DirtyBits {
    remaining: u64,
}

impl Iterator for DirtyBits {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.remaining.trailing_zeros();
        self.remaining &= self.remaining - 1;
        Some(index as u8)
    }
}
