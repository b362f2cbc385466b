//! Little-endian binary primitives shared by the container reader/writer.
//!
//! The container format is little-endian only (see spec §6), so every
//! primitive field is read and written through the `lebe` crate rather than
//! through architecture-dependent byte order.

use crate::error::Result;
pub use std::io::{Read, Seek, SeekFrom, Write};

use lebe::prelude::*;

/// Extension trait for the handful of primitive sizes used in directory
/// fields and strip payloads.
pub trait Data: Sized + Default + Copy {
    fn read(read: &mut impl Read) -> Result<Self>;
    fn write(self, write: &mut impl Write) -> Result<()>;
}

macro_rules! implement_data_for_primitive {
    ($kind:ident) => {
        impl Data for $kind {
            fn read(read: &mut impl Read) -> Result<Self> {
                Ok(read.read_from_little_endian()?)
            }

            fn write(self, write: &mut impl Write) -> Result<()> {
                write.write_as_little_endian(&self)?;
                Ok(())
            }
        }
    };
}

implement_data_for_primitive!(u8);
implement_data_for_primitive!(u16);
implement_data_for_primitive!(u32);
implement_data_for_primitive!(u64);
implement_data_for_primitive!(i16);
implement_data_for_primitive!(i32);

/// Current byte offset of a seekable stream, used to stamp directory
/// `next` pointers and to enforce word alignment on appended records.
pub fn position(stream: &mut (impl Seek + ?Sized)) -> Result<u64> {
    Ok(stream.stream_position()?)
}

/// If `offset` is odd, write one zero byte so the following record starts
/// word-aligned, and return the (possibly advanced) offset.
pub fn align(stream: &mut (impl Write + Seek), offset: u64) -> Result<u64> {
    if offset % 2 != 0 {
        stream.write_all(&[0u8])?;
        Ok(offset + 1)
    } else {
        Ok(offset)
    }
}

pub fn skip_bytes(read: &mut impl Read, count: u64) -> Result<()> {
    let copied = std::io::copy(&mut read.by_ref().take(count), &mut std::io::sink())?;
    debug_assert_eq!(copied, count, "short read while skipping bytes");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_primitives() {
        let mut buffer = Vec::new();
        42u16.write(&mut buffer).unwrap();
        123456u64.write(&mut buffer).unwrap();
        let mut cursor = std::io::Cursor::new(buffer);
        assert_eq!(u16::read(&mut cursor).unwrap(), 42);
        assert_eq!(u64::read(&mut cursor).unwrap(), 123456);
    }

    #[test]
    fn align_pads_odd_offsets() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        let aligned = align(&mut cursor, 7).unwrap();
        assert_eq!(aligned, 8);
        assert_eq!(cursor.get_ref().len(), 1);

        let aligned = align(&mut cursor, 8).unwrap();
        assert_eq!(aligned, 8);
    }
}
