use crate::SerdeErr;

/// Cursor over a borrowed byte slice
pub struct ByteReader<'b> {
    buffer: &'b [u8],
    cursor: usize,
}

impl<'b> ByteReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        let Some(byte) = self.buffer.get(self.cursor) else {
            return Err(SerdeErr::UnexpectedEnd {
                needed: 1,
                remaining: 0,
            });
        };
        self.cursor += 1;
        Ok(*byte)
    }

    /// Reads exactly `length` bytes, borrowing them from the underlying buffer
    pub fn read_bytes(&mut self, length: usize) -> Result<&'b [u8], SerdeErr> {
        let remaining = self.remaining();
        if length > remaining {
            return Err(SerdeErr::UnexpectedEnd {
                needed: length,
                remaining,
            });
        }
        let start = self.cursor;
        self.cursor += length;
        Ok(&self.buffer[start..self.cursor])
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SerdeErr> {
        let bytes = self.read_bytes(N)?;
        let mut output = [0u8; N];
        output.copy_from_slice(bytes);
        Ok(output)
    }

    /// Returns the unread remainder and advances to the end
    pub fn read_to_end(&mut self) -> &'b [u8] {
        let start = self.cursor;
        self.cursor = self.buffer.len();
        &self.buffer[start..]
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn has_remaining(&self) -> bool {
        self.cursor < self.buffer.len()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }
}
