/// Sink for serialized bytes
pub trait ByteWrite {
    fn write_byte(&mut self, byte: u8);

    fn write_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.write_byte(*byte);
        }
    }

    /// Whether this writer only counts bytes instead of storing them
    fn is_counter(&self) -> bool;
}

/// A growable ByteWrite implementation backed by a `Vec<u8>`.
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Overwrites two bytes at `position` with a little-endian u16, used to
    /// backfill length prefixes once a record has been written
    pub fn patch_u16(&mut self, position: usize, value: u16) {
        let bytes = value.to_le_bytes();
        self.buffer[position] = bytes[0];
        self.buffer[position + 1] = bytes[1];
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteWrite for ByteWriter {
    fn write_byte(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn is_counter(&self) -> bool {
        false
    }
}

/// Counts how many bytes would be written, without storing them
pub struct ByteCounter {
    count: usize,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self { count: 0 }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl Default for ByteCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteWrite for ByteCounter {
    fn write_byte(&mut self, _byte: u8) {
        self.count += 1;
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.count += bytes.len();
    }

    fn is_counter(&self) -> bool {
        true
    }
}
