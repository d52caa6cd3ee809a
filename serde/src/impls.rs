use crate::{ByteReader, ByteWrite, Serde, SerdeErr, UnsignedVariableInteger};

// Unit

impl Serde for () {
    fn ser(&self, _: &mut dyn ByteWrite) {}

    fn de(_: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(())
    }

    fn byte_length(&self) -> usize {
        0
    }
}

// Bool

impl Serde for bool {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        writer.write_byte(u8::from(*self));
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match reader.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SerdeErr::InvalidBool(other)),
        }
    }

    fn byte_length(&self) -> usize {
        1
    }
}

// Fixed-width numbers, little-endian

macro_rules! impl_serde_for_number {
    ($($ty:ty),*) => {
        $(
            impl Serde for $ty {
                fn ser(&self, writer: &mut dyn ByteWrite) {
                    writer.write_bytes(&self.to_le_bytes());
                }

                fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
                    let bytes = reader.read_array::<{ std::mem::size_of::<$ty>() }>()?;
                    Ok(<$ty>::from_le_bytes(bytes))
                }

                fn byte_length(&self) -> usize {
                    std::mem::size_of::<$ty>()
                }
            }
        )*
    };
}

impl_serde_for_number!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

// Strings & collections, length-prefixed with a variable integer

impl Serde for String {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        UnsignedVariableInteger::new(self.len() as u64).ser(writer);
        writer.write_bytes(self.as_bytes());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let length = UnsignedVariableInteger::de(reader)?.get() as usize;
        let bytes = reader.read_bytes(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerdeErr::InvalidUtf8)
    }
}

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        UnsignedVariableInteger::new(self.len() as u64).ser(writer);
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let length = UnsignedVariableInteger::de(reader)?.get() as usize;
        // each element takes at least one byte, so a length beyond what is
        // left can only come from a corrupt or hostile stream
        if length > reader.remaining() {
            return Err(SerdeErr::UnexpectedEnd {
                needed: length,
                remaining: reader.remaining(),
            });
        }
        let mut output = Vec::with_capacity(length);
        for _ in 0..length {
            output.push(T::de(reader)?);
        }
        Ok(output)
    }
}

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        match self {
            Some(value) => {
                true.ser(writer);
                value.ser(writer);
            }
            None => false.ser(writer),
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        if bool::de(reader)? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }
}

impl<A: Serde, B: Serde> Serde for (A, B) {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.0.ser(writer);
        self.1.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok((A::de(reader)?, B::de(reader)?))
    }
}

impl<T: Serde + Copy + Default, const N: usize> Serde for [T; N] {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut output = [T::default(); N];
        for item in output.iter_mut() {
            *item = T::de(reader)?;
        }
        Ok(output)
    }
}
