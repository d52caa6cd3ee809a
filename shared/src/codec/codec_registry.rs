use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
};

use skein_serde::{ByteReader, ByteWrite, Serde, SerdeErr};

use crate::{
    component::schema::ComponentSchema,
    error::{CodecError, ConfigError},
};

type EncodeFn = Box<dyn Fn(&dyn Any, &mut dyn ByteWrite) -> Result<(), CodecError> + Send + Sync>;
type DecodeFn = Box<dyn Fn(&mut ByteReader) -> Result<Box<dyn Any>, CodecError> + Send + Sync>;

struct Codec {
    encode: EncodeFn,
    decode: DecodeFn,
}

/// Maps each replicated field type to the pair of functions that write it
/// into and read it out of a byte stream. Every type used by a replicated
/// field must be registered before an entity carrying it is constructed.
pub struct CodecRegistry {
    codecs: HashMap<TypeId, Codec>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// A registry with codecs for the primitive types, strings and their
    /// `Serde` encodings already registered
    pub fn with_primitives() -> Self {
        let mut registry = Self::new();
        registry.insert_serde::<bool>();
        registry.insert_serde::<u8>();
        registry.insert_serde::<u16>();
        registry.insert_serde::<u32>();
        registry.insert_serde::<u64>();
        registry.insert_serde::<i8>();
        registry.insert_serde::<i16>();
        registry.insert_serde::<i32>();
        registry.insert_serde::<i64>();
        registry.insert_serde::<f32>();
        registry.insert_serde::<f64>();
        registry.insert_serde::<String>();
        registry
    }

    // Registration

    pub fn register<T, E, D>(&mut self, encode: E, decode: D) -> Result<(), ConfigError>
    where
        T: Any,
        E: Fn(&T, &mut dyn ByteWrite) + Send + Sync + 'static,
        D: Fn(&mut ByteReader) -> Result<T, SerdeErr> + Send + Sync + 'static,
    {
        if self.contains::<T>() {
            return Err(ConfigError::DuplicateCodec {
                type_name: type_name::<T>(),
            });
        }
        self.insert(encode, decode);
        Ok(())
    }

    /// Registers a type using its own `Serde` implementation
    pub fn register_serde<T: Serde + Any>(&mut self) -> Result<(), ConfigError> {
        self.register::<T, _, _>(|value, writer| value.ser(writer), |reader| T::de(reader))
    }

    fn insert_serde<T: Serde + Any>(&mut self) {
        self.insert::<T, _, _>(|value, writer| value.ser(writer), |reader| T::de(reader));
    }

    fn insert<T, E, D>(&mut self, encode: E, decode: D)
    where
        T: Any,
        E: Fn(&T, &mut dyn ByteWrite) + Send + Sync + 'static,
        D: Fn(&mut ByteReader) -> Result<T, SerdeErr> + Send + Sync + 'static,
    {
        let encode: EncodeFn = Box::new(
            move |value: &dyn Any, writer: &mut dyn ByteWrite| -> Result<(), CodecError> {
                let value = value.downcast_ref::<T>().ok_or(CodecError::TypeMismatch {
                    expected: type_name::<T>(),
                })?;
                encode(value, writer);
                Ok(())
            },
        );
        let decode: DecodeFn = Box::new(
            move |reader: &mut ByteReader| -> Result<Box<dyn Any>, CodecError> {
                let value = decode(reader)?;
                Ok(Box::new(value))
            },
        );
        self.codecs.insert(TypeId::of::<T>(), Codec { encode, decode });
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.codecs.contains_key(&TypeId::of::<T>())
    }

    pub fn contains_type_id(&self, type_id: &TypeId) -> bool {
        self.codecs.contains_key(type_id)
    }

    /// Fails if any field of the schema uses a type without a registered codec
    pub fn validate_schema(&self, schema: &ComponentSchema) -> Result<(), ConfigError> {
        for field in schema.fields() {
            if !self.contains_type_id(&field.type_id()) {
                return Err(ConfigError::UnregisteredCodec {
                    component: schema.name(),
                    field: field.name(),
                    type_name: field.type_name(),
                });
            }
        }
        Ok(())
    }

    // Encode / Decode

    pub fn encode<T: Any>(&self, writer: &mut dyn ByteWrite, value: &T) -> Result<(), CodecError> {
        let codec = self.codec::<T>()?;
        (codec.encode)(value, writer)
    }

    pub fn decode<T: Any>(&self, reader: &mut ByteReader) -> Result<T, CodecError> {
        let codec = self.codec::<T>()?;
        let boxed = (codec.decode)(reader)?;
        boxed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| CodecError::TypeMismatch {
                expected: type_name::<T>(),
            })
    }

    fn codec<T: Any>(&self) -> Result<&Codec, CodecError> {
        self.codecs
            .get(&TypeId::of::<T>())
            .ok_or(CodecError::MissingCodec {
                type_name: type_name::<T>(),
            })
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}
