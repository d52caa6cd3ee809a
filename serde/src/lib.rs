//! # Skein Serde
//! Byte-oriented writers, readers and the [`Serde`] trait used by every
//! skein wire structure.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod byte_reader;
mod byte_writer;
mod error;
mod impls;
mod integer;
mod serde;

pub use byte_reader::ByteReader;
pub use byte_writer::{ByteCounter, ByteWrite, ByteWriter};
pub use error::SerdeErr;
pub use integer::{SignedVariableInteger, UnsignedVariableInteger, MAX_VARINT_BYTES};
pub use serde::Serde;
