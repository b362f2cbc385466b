//! BigTIFF-family preamble: the 16-byte file header, 20-byte tag fields, and
//! the fixed-shape head directory (HFD) and page directory (IFD) that carry
//! exactly the tags this format needs, in a fixed order, and nothing else.
//! Reading one of these validates every tag against its expected value —
//! this container is deliberately strict about what counts as one of its
//! own files, rather than tolerant of arbitrary TIFF content.

use crate::error::{Error, Result};
use crate::io::Data;
use std::io::{Read, Write};

pub const TAG_IMAGE_WIDTH: u16 = 0x0100;
pub const TAG_IMAGE_LENGTH: u16 = 0x0101;
pub const TAG_BITS_PER_SAMPLE: u16 = 0x0102;
pub const TAG_COMPRESSION: u16 = 0x0103;
pub const TAG_INTERPRETATION: u16 = 0x0106;
pub const TAG_DESCRIPTION: u16 = 0x010E;
pub const TAG_STRIP_OFFSETS: u16 = 0x0111;
pub const TAG_ORIENTATION: u16 = 0x0112;
pub const TAG_SAMPLES_PER_PIXEL: u16 = 0x0115;
pub const TAG_ROWS_PER_STRIP: u16 = 0x0116;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
pub const TAG_CONFIGURATION: u16 = 0x011C;
pub const TAG_PAGE_NUMBER: u16 = 0x0129;
pub const TAG_PREDICTOR: u16 = 0x013D;
pub const TAG_SAMPLE_FORMAT: u16 = 0x0153;

pub const TAG_PAGE_INDEX: u16 = 0xFFB1;
pub const TAG_PAGE_OFFSET: u16 = 0xFFB2;
pub const TAG_PAGE_MINIMUM: u16 = 0xFFB3;
pub const TAG_PAGE_MAXIMUM: u16 = 0xFFB4;

pub const HFD_FIELD_COUNT: u64 = 13;
pub const IFD_FIELD_COUNT: u64 = 14;

/// A single BigTIFF tag/type/count/offset record. `offset` doubles as an
/// inline value for small fixed-size payloads (one to four 16-bit numbers),
/// the way the directory's per-channel bit depth and sample format arrays
/// are packed directly into it rather than stored out of line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Field {
    pub tag: u16,
    pub kind: u16,
    pub count: u64,
    pub offset: u64,
}

impl Field {
    #[must_use]
    pub const fn new(tag: u16, kind: u16, count: u64, offset: u64) -> Self {
        Self { tag, kind, count, offset }
    }

    /// Read up to four little-endian `u16`s packed into `offset`, used for
    /// the per-channel bit-depth and sample-format arrays.
    #[must_use]
    pub fn packed_u16s(self) -> [u16; 4] {
        let bytes = self.offset.to_le_bytes();
        [
            u16::from_le_bytes([bytes[0], bytes[1]]),
            u16::from_le_bytes([bytes[2], bytes[3]]),
            u16::from_le_bytes([bytes[4], bytes[5]]),
            u16::from_le_bytes([bytes[6], bytes[7]]),
        ]
    }

    #[must_use]
    pub fn with_packed_u16s(mut self, values: [u16; 4]) -> Self {
        let mut bytes = [0u8; 8];
        for (chunk, v) in bytes.chunks_exact_mut(2).zip(values) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
        self.offset = u64::from_le_bytes(bytes);
        self
    }

    fn read(stream: &mut impl Read) -> Result<Self> {
        Ok(Self {
            tag: u16::read(stream)?,
            kind: u16::read(stream)?,
            count: u64::read(stream)?,
            offset: u64::read(stream)?,
        })
    }

    fn write(self, stream: &mut impl Write) -> Result<()> {
        self.tag.write(stream)?;
        self.kind.write(stream)?;
        self.count.write(stream)?;
        self.offset.write(stream)?;
        Ok(())
    }
}

/// The 16-byte BigTIFF header: little-endian byte order, BigTIFF version,
/// 8-byte offsets, a reserved zero word, and the offset of the first
/// directory (here, the head directory).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub endianness: u16,
    pub version: u16,
    pub offsetsize: u16,
    pub zero: u16,
    pub first_hfd: u64,
}

impl Header {
    #[must_use]
    pub const fn new(first_hfd: u64) -> Self {
        Self { endianness: 0x4949, version: 0x002B, offsetsize: 8, zero: 0, first_hfd }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.endianness == 0x4949 && self.version == 0x002B && self.offsetsize == 8 && self.zero == 0
    }

    pub fn read(stream: &mut impl Read) -> Result<Self> {
        let header = Self {
            endianness: u16::read(stream)?,
            version: u16::read(stream)?,
            offsetsize: u16::read(stream)?,
            zero: u16::read(stream)?,
            first_hfd: u64::read(stream)?,
        };
        Ok(header)
    }

    pub fn write(self, stream: &mut impl Write) -> Result<()> {
        self.endianness.write(stream)?;
        self.version.write(stream)?;
        self.offsetsize.write(stream)?;
        self.zero.write(stream)?;
        self.first_hfd.write(stream)?;
        Ok(())
    }
}

/// The head directory: one per file, carrying the parameters shared by
/// every page (dimensions, channel layout, rows per strip) plus the four
/// catalog/extrema fields `finish` fills in and the free-text description.
#[derive(Debug, Clone, Copy)]
pub struct Hfd {
    pub count: u64,
    pub image_width: Field,
    pub image_length: Field,
    pub bits_per_sample: Field,
    pub description: Field,
    pub strip_offsets: Field,
    pub samples_per_pixel: Field,
    pub rows_per_strip: Field,
    pub strip_byte_counts: Field,
    pub sample_format: Field,
    pub page_index: Field,
    pub page_offset: Field,
    pub page_minimum: Field,
    pub page_maximum: Field,
    pub next: u64,
}

impl Hfd {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.count == HFD_FIELD_COUNT
            && self.image_width.tag == TAG_IMAGE_WIDTH
            && self.image_length.tag == TAG_IMAGE_LENGTH
            && self.bits_per_sample.tag == TAG_BITS_PER_SAMPLE
            && self.description.tag == TAG_DESCRIPTION
            && self.samples_per_pixel.tag == TAG_SAMPLES_PER_PIXEL
            && self.sample_format.tag == TAG_SAMPLE_FORMAT
            && self.page_index.tag == TAG_PAGE_INDEX
            && self.page_offset.tag == TAG_PAGE_OFFSET
            && self.page_minimum.tag == TAG_PAGE_MINIMUM
            && self.page_maximum.tag == TAG_PAGE_MAXIMUM
    }

    pub fn read(stream: &mut impl Read) -> Result<Self> {
        let count = u64::read(stream)?;
        let hfd = Self {
            count,
            image_width: Field::read(stream)?,
            image_length: Field::read(stream)?,
            bits_per_sample: Field::read(stream)?,
            description: Field::read(stream)?,
            strip_offsets: Field::read(stream)?,
            samples_per_pixel: Field::read(stream)?,
            rows_per_strip: Field::read(stream)?,
            strip_byte_counts: Field::read(stream)?,
            sample_format: Field::read(stream)?,
            page_index: Field::read(stream)?,
            page_offset: Field::read(stream)?,
            page_minimum: Field::read(stream)?,
            page_maximum: Field::read(stream)?,
            next: u64::read(stream)?,
        };
        Ok(hfd)
    }

    pub fn write(self, stream: &mut impl Write) -> Result<()> {
        self.count.write(stream)?;
        self.image_width.write(stream)?;
        self.image_length.write(stream)?;
        self.bits_per_sample.write(stream)?;
        self.description.write(stream)?;
        self.strip_offsets.write(stream)?;
        self.samples_per_pixel.write(stream)?;
        self.rows_per_strip.write(stream)?;
        self.strip_byte_counts.write(stream)?;
        self.sample_format.write(stream)?;
        self.page_index.write(stream)?;
        self.page_offset.write(stream)?;
        self.page_minimum.write(stream)?;
        self.page_maximum.write(stream)?;
        self.next.write(stream)?;
        Ok(())
    }
}

/// The page directory: one per stored page, carrying that page's strip
/// offsets/lengths, the breadth-first page number, and a copy of the
/// per-file parameters LibTIFF expects every directory to repeat.
#[derive(Debug, Clone, Copy)]
pub struct Ifd {
    pub count: u64,
    pub image_width: Field,
    pub image_length: Field,
    pub bits_per_sample: Field,
    pub compression: Field,
    pub interpretation: Field,
    pub strip_offsets: Field,
    pub orientation: Field,
    pub samples_per_pixel: Field,
    pub rows_per_strip: Field,
    pub strip_byte_counts: Field,
    pub configuration: Field,
    pub page_number: Field,
    pub predictor: Field,
    pub sample_format: Field,
    pub next: u64,
}

impl Ifd {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.count == IFD_FIELD_COUNT
            && self.image_width.tag == TAG_IMAGE_WIDTH
            && self.image_length.tag == TAG_IMAGE_LENGTH
            && self.bits_per_sample.tag == TAG_BITS_PER_SAMPLE
            && self.compression.tag == TAG_COMPRESSION
            && self.interpretation.tag == TAG_INTERPRETATION
            && self.strip_offsets.tag == TAG_STRIP_OFFSETS
            && self.orientation.tag == TAG_ORIENTATION
            && self.samples_per_pixel.tag == TAG_SAMPLES_PER_PIXEL
            && self.rows_per_strip.tag == TAG_ROWS_PER_STRIP
            && self.strip_byte_counts.tag == TAG_STRIP_BYTE_COUNTS
            && self.configuration.tag == TAG_CONFIGURATION
            && self.predictor.tag == TAG_PREDICTOR
            && self.sample_format.tag == TAG_SAMPLE_FORMAT
    }

    pub fn read(stream: &mut impl Read) -> Result<Self> {
        let count = u64::read(stream)?;
        let ifd = Self {
            count,
            image_width: Field::read(stream)?,
            image_length: Field::read(stream)?,
            bits_per_sample: Field::read(stream)?,
            compression: Field::read(stream)?,
            interpretation: Field::read(stream)?,
            strip_offsets: Field::read(stream)?,
            orientation: Field::read(stream)?,
            samples_per_pixel: Field::read(stream)?,
            rows_per_strip: Field::read(stream)?,
            strip_byte_counts: Field::read(stream)?,
            configuration: Field::read(stream)?,
            page_number: Field::read(stream)?,
            predictor: Field::read(stream)?,
            sample_format: Field::read(stream)?,
            next: u64::read(stream)?,
        };
        Ok(ifd)
    }

    pub fn write(self, stream: &mut impl Write) -> Result<()> {
        self.count.write(stream)?;
        self.image_width.write(stream)?;
        self.image_length.write(stream)?;
        self.bits_per_sample.write(stream)?;
        self.compression.write(stream)?;
        self.interpretation.write(stream)?;
        self.strip_offsets.write(stream)?;
        self.orientation.write(stream)?;
        self.samples_per_pixel.write(stream)?;
        self.rows_per_strip.write(stream)?;
        self.strip_byte_counts.write(stream)?;
        self.configuration.write(stream)?;
        self.page_number.write(stream)?;
        self.predictor.write(stream)?;
        self.sample_format.write(stream)?;
        self.next.write(stream)?;
        Ok(())
    }
}

/// Byte size of one BigTIFF datum of the given type tag; `0` for a type
/// this codec never emits or reads.
#[must_use]
pub fn tiff_type_size(kind: u16) -> usize {
    match kind {
        1 | 2 | 6 | 7 => 1,
        3 | 8 => 2,
        4 | 9 | 11 => 4,
        5 | 10 | 12 | 16 | 17 | 18 => 8,
        _ => 0,
    }
}

pub(crate) fn validate_header(header: Header) -> Result<Header> {
    if header.is_valid() {
        Ok(header)
    } else {
        Err(Error::not_our_format("<header>"))
    }
}

pub(crate) fn validate_hfd(hfd: Hfd) -> Result<Hfd> {
    if hfd.is_valid() {
        Ok(hfd)
    } else {
        Err(Error::not_our_format("<head directory>"))
    }
}

pub(crate) fn validate_ifd(ifd: Ifd) -> Result<Ifd> {
    if ifd.is_valid() {
        Ok(ifd)
    } else {
        Err(Error::not_our_format("<page directory>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_roundtrips_and_validates() {
        let header = Header::new(42);
        let mut buffer = Vec::new();
        header.write(&mut buffer).unwrap();
        let mut cursor = Cursor::new(buffer);
        let back = Header::read(&mut cursor).unwrap();
        assert_eq!(header, back);
        assert!(back.is_valid());
    }

    #[test]
    fn field_packs_four_u16_channel_values() {
        let field = Field::new(TAG_BITS_PER_SAMPLE, 3, 3, 0).with_packed_u16s([8, 8, 8, 0]);
        assert_eq!(field.packed_u16s(), [8, 8, 8, 0]);
    }
}
