use skein_serde::{ByteReader, ByteWrite, ByteWriter, Serde, SerdeErr};

use crate::{
    connection::{error::FramingError, message_kind::MessageKind},
    constants::{CHUNK_HEADER_BYTES, FRAME_KIND_BYTES},
    types::HostType,
};

/// One application message: a 2-byte kind followed by its body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub kind: MessageKind,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(kind: MessageKind, body: Vec<u8>) -> Self {
        Self { kind, body }
    }

    /// A frame whose body is a single encoded message
    pub fn from_message<M: Serde>(kind: MessageKind, message: &M) -> Self {
        let mut writer = ByteWriter::with_capacity(message.byte_length());
        message.ser(&mut writer);
        Self::new(kind, writer.to_bytes())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(FRAME_KIND_BYTES + self.body.len());
        self.kind.to_u16().ser(&mut writer);
        writer.write_bytes(&self.body);
        writer.to_bytes()
    }

    /// Parses a reassembled frame received by a host of type `receiver`.
    /// Kinds the receiver never accepts are framing errors.
    pub fn from_bytes(bytes: &[u8], receiver: HostType) -> Result<Self, FramingError> {
        if bytes.len() < FRAME_KIND_BYTES {
            return Err(FramingError::FrameTooShort {
                length: bytes.len(),
            });
        }
        let raw = u16::from_le_bytes([bytes[0], bytes[1]]);
        let kind =
            MessageKind::from_u16(raw).ok_or(FramingError::UnknownMessageKind { kind: raw })?;
        if !kind.is_received_by(receiver) {
            return Err(FramingError::UnexpectedMessageKind { kind });
        }
        Ok(Self::new(kind, bytes[FRAME_KIND_BYTES..].to_vec()))
    }

    /// Decodes the body as a single message of type `M`
    pub fn read_message<M: Serde>(&self) -> Result<M, FramingError> {
        let mut reader = ByteReader::new(&self.body);
        M::de(&mut reader).map_err(|source| FramingError::MalformedBody {
            kind: self.kind,
            source,
        })
    }
}

/// The fixed header at the front of every chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Send stamp of the frame this chunk belongs to
    pub sequence: u16,
    pub index: u16,
    pub count: u16,
}

impl ChunkHeader {
    /// Splits a received chunk into its header and body
    pub fn split(chunk: &[u8]) -> Result<(Self, &[u8]), FramingError> {
        if chunk.len() < CHUNK_HEADER_BYTES {
            return Err(FramingError::ChunkTooShort {
                length: chunk.len(),
                min: CHUNK_HEADER_BYTES,
            });
        }
        let mut reader = ByteReader::new(chunk);
        let header = Self::de(&mut reader).map_err(|_| FramingError::ChunkTooShort {
            length: chunk.len(),
            min: CHUNK_HEADER_BYTES,
        })?;
        Ok((header, reader.read_to_end()))
    }
}

impl Serde for ChunkHeader {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.sequence.ser(writer);
        self.index.ser(writer);
        self.count.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            sequence: u16::de(reader)?,
            index: u16::de(reader)?,
            count: u16::de(reader)?,
        })
    }

    fn byte_length(&self) -> usize {
        CHUNK_HEADER_BYTES
    }
}

/// Splits frame bytes into chunks of at most `max_payload` body bytes each,
/// all stamped with `sequence`
pub fn fragment(
    sequence: u16,
    frame: &[u8],
    max_payload: usize,
) -> Result<Vec<Vec<u8>>, FramingError> {
    let max_payload = max_payload.max(1);
    let count = frame.len().div_ceil(max_payload).max(1);
    let count = u16::try_from(count).map_err(|_| FramingError::FrameTooLarge {
        length: frame.len(),
        max: usize::from(u16::MAX) * max_payload,
    })?;

    let mut chunks = Vec::with_capacity(usize::from(count));
    let mut pieces = frame.chunks(max_payload);
    for index in 0..count {
        let piece = pieces.next().unwrap_or(&[]);
        let mut writer = ByteWriter::with_capacity(CHUNK_HEADER_BYTES + piece.len());
        ChunkHeader {
            sequence,
            index,
            count,
        }
        .ser(&mut writer);
        writer.write_bytes(piece);
        chunks.push(writer.to_bytes());
    }
    Ok(chunks)
}
