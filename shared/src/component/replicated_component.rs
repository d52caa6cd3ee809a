/// Implements [`Replicated`](crate::Replicated) for a struct from the list
/// of its replicated fields, in wire order. Every listed type needs a codec
/// in the registry the entity is built with. Prefix the struct name with
/// `client_authoritative` for components the owning peer writes.
///
/// ```
/// use skein_shared::replicated_component;
///
/// #[derive(Clone, Default)]
/// pub struct Health {
///     pub current: u32,
///     pub max: u32,
/// }
///
/// replicated_component!(Health { current: u32, max: u32 });
/// ```
#[macro_export]
macro_rules! replicated_component {
    (client_authoritative $name:ident { $($field:ident: $ty:ty),+ $(,)? }) => {
        $crate::replicated_component!(@impl $name, ClientAuthoritative, $($field: $ty),+);
    };
    ($name:ident { $($field:ident: $ty:ty),+ $(,)? }) => {
        $crate::replicated_component!(@impl $name, ServerAuthoritative, $($field: $ty),+);
    };
    (@impl $name:ident, $direction:ident, $($field:ident: $ty:ty),+) => {
        impl $crate::Replicated for $name {
            fn schema(&self) -> Result<$crate::ComponentSchema, $crate::ConfigError> {
                $crate::ComponentSchema::builder(stringify!($name))
                    .direction($crate::ReplicationDirection::$direction)
                    $(.field::<$ty>(stringify!($field)))+
                    .build()
            }

            fn encode_field(
                &self,
                index: u8,
                codecs: &$crate::CodecRegistry,
                writer: &mut dyn $crate::ByteWrite,
            ) -> Result<(), $crate::CodecError> {
                let mut next: u8 = 0;
                $(
                    if index == next {
                        return codecs.encode(writer, &self.$field);
                    }
                    next += 1;
                )+
                let _ = next;
                Err($crate::CodecError::FieldOutOfRange {
                    component: stringify!($name),
                    index,
                })
            }

            fn decode_field(
                &mut self,
                index: u8,
                codecs: &$crate::CodecRegistry,
                reader: &mut $crate::ByteReader,
            ) -> Result<(), $crate::CodecError> {
                let mut next: u8 = 0;
                $(
                    if index == next {
                        self.$field = codecs.decode::<$ty>(reader)?;
                        return Ok(());
                    }
                    next += 1;
                )+
                let _ = next;
                Err($crate::CodecError::FieldOutOfRange {
                    component: stringify!($name),
                    index,
                })
            }

            fn copy_to_box(&self) -> Box<dyn $crate::Replicated> {
                Box::new(self.clone())
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }
    };
}
