use skein_serde::{ByteReader, ByteWrite, ByteWriter, Serde, SerdeErr};

use crate::{
    constants::RPC_RECORD_PREFIX_BYTES,
    rpc::{error::RpcError, method_hash::MethodHash},
    types::{ComponentId, EntityId},
};

/// The three call directions, each with its own authority rule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RpcKind {
    /// Client to server, honoured only from ready sessions
    ServerRpc,
    /// Server to every ready observer, optionally skipping the owner
    ClientRpc,
    /// Server to one peer, the owner unless another target is given
    TargetRpc,
}

impl Serde for RpcKind {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        let tag: u8 = match self {
            RpcKind::ServerRpc => 0,
            RpcKind::ClientRpc => 1,
            RpcKind::TargetRpc => 2,
        };
        tag.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match u8::de(reader)? {
            0 => Ok(RpcKind::ServerRpc),
            1 => Ok(RpcKind::ClientRpc),
            2 => Ok(RpcKind::TargetRpc),
            tag => Err(SerdeErr::InvalidTag {
                type_name: "RpcKind",
                tag: u16::from(tag),
            }),
        }
    }

    fn byte_length(&self) -> usize {
        1
    }
}

/// Addresses a call: `(entity, component, method)` plus its kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RpcCallHeader {
    pub entity: EntityId,
    pub component: ComponentId,
    pub hash: MethodHash,
    pub kind: RpcKind,
}

impl Serde for RpcCallHeader {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.entity.ser(writer);
        self.component.ser(writer);
        self.hash.ser(writer);
        self.kind.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            entity: EntityId::de(reader)?,
            component: ComponentId::de(reader)?,
            hash: MethodHash::de(reader)?,
            kind: RpcKind::de(reader)?,
        })
    }
}

/// One outbound call: header plus the already-encoded argument bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcCall {
    pub header: RpcCallHeader,
    pub args: Vec<u8>,
}

impl RpcCall {
    pub fn new(header: RpcCallHeader, args: Vec<u8>) -> Self {
        Self { header, args }
    }

    /// Appends this call as a `u16`-length-prefixed record
    pub fn write_record(&self, writer: &mut ByteWriter) -> Result<(), RpcError> {
        let length = self.header.byte_length() + self.args.len();
        if length > usize::from(u16::MAX) {
            return Err(RpcError::RecordTooLarge {
                length,
                max: usize::from(u16::MAX),
            });
        }
        let prefix_position = writer.len();
        writer.write_bytes(&[0; RPC_RECORD_PREFIX_BYTES]);
        self.header.ser(writer);
        writer.write_bytes(&self.args);
        writer.patch_u16(prefix_position, length as u16);
        Ok(())
    }

    /// Bytes `write_record` appends
    pub fn record_length(&self) -> usize {
        RPC_RECORD_PREFIX_BYTES + self.header.byte_length() + self.args.len()
    }
}

/// Walks a batch of call records. Each record yields its header and a reader
/// bounded to that record's argument bytes.
pub struct RpcBatchReader<'b> {
    reader: ByteReader<'b>,
}

impl<'b> RpcBatchReader<'b> {
    pub fn new(batch: &'b [u8]) -> Self {
        Self {
            reader: ByteReader::new(batch),
        }
    }

    /// Next record, or `None` once the batch is exhausted. A record that
    /// does not fit in what remains is a framing error.
    pub fn next_record(&mut self) -> Result<Option<(RpcCallHeader, ByteReader<'b>)>, RpcError> {
        if !self.reader.has_remaining() {
            return Ok(None);
        }
        let remaining = self.reader.remaining();
        if remaining < RPC_RECORD_PREFIX_BYTES {
            return Err(RpcError::TruncatedRecord {
                declared: RPC_RECORD_PREFIX_BYTES,
                remaining,
            });
        }
        let declared = usize::from(u16::de(&mut self.reader)?);
        let remaining = self.reader.remaining();
        if declared > remaining {
            return Err(RpcError::TruncatedRecord {
                declared,
                remaining,
            });
        }
        let record = self.reader.read_bytes(declared)?;
        let mut record_reader = ByteReader::new(record);
        let header = RpcCallHeader::de(&mut record_reader)?;
        Ok(Some((header, record_reader)))
    }
}
