use std::any::Any;

use skein_serde::{ByteReader, ByteWrite};

use crate::{
    codec::codec_registry::CodecRegistry,
    component::schema::ComponentSchema,
    error::{CodecError, ConfigError},
};

/// A component whose fields are replicated field-by-field. Implemented by
/// hand or with [`replicated_component!`](crate::replicated_component). The
/// engine only reaches a component's data through these methods.
pub trait Replicated: Any + Send {
    /// Flattened field list and replication direction of this component
    fn schema(&self) -> Result<ComponentSchema, ConfigError>;

    /// Writes field `index` through the registry's codec for its type
    fn encode_field(
        &self,
        index: u8,
        codecs: &CodecRegistry,
        writer: &mut dyn ByteWrite,
    ) -> Result<(), CodecError>;

    /// Reads field `index` through the registry's codec for its type
    fn decode_field(
        &mut self,
        index: u8,
        codecs: &CodecRegistry,
        reader: &mut ByteReader,
    ) -> Result<(), CodecError>;

    fn copy_to_box(&self) -> Box<dyn Replicated>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
