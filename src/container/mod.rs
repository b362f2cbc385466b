//! Container-level strip I/O: turning one page's worth of float samples
//! into a sequence of compressed, horizontally-predicted strips on disk,
//! and back. `store.rs` owns the file handle and directory chain; this
//! module only knows how to encode/decode the data a page's IFD points at.

pub mod header;

use rayon::prelude::*;

use crate::codec::{self, SampleKind};
use crate::error::Result;
use crate::io::Data;
use std::io::{Read, Seek, SeekFrom, Write};

/// Per-file parameters that determine how a page's strips are laid out:
/// `side` is the halo-inclusive page width/height (`n + 2`), `channels` is
/// samples per pixel, `rows_per_strip` bounds how many rows one deflate
/// block covers.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub side: usize,
    pub channels: usize,
    pub rows_per_strip: usize,
    pub kind: SampleKind,
}

impl Layout {
    #[must_use]
    pub fn strip_count(self) -> usize {
        (self.side + self.rows_per_strip - 1) / self.rows_per_strip
    }

    fn rows_in_strip(self, strip: usize) -> usize {
        let start = strip * self.rows_per_strip;
        self.rows_per_strip.min(self.side - start)
    }

    fn row_bytes(self) -> usize {
        self.side * self.channels * self.kind.bytes_per_sample()
    }
}

/// Encode one page of `side * side * channels` samples into compressed
/// strips, write them at the current file position, and return the strip
/// offsets/lengths (parallel arrays, one entry per strip) to be stored in
/// the page's directory fields.
pub fn write_page(
    writer: &mut (impl Write + Seek),
    layout: Layout,
    samples: &[f32],
) -> Result<(Vec<u64>, Vec<u32>)> {
    let strips: Vec<Vec<u8>> = (0..layout.strip_count())
        .into_par_iter()
        .map(|strip| encode_strip(layout, samples, strip))
        .collect::<Result<_>>()?;

    let mut offsets = Vec::with_capacity(strips.len());
    let mut lengths = Vec::with_capacity(strips.len());
    for strip in strips {
        let offset = writer.stream_position()?;
        writer.write_all(&strip)?;
        offsets.push(offset);
        lengths.push(strip.len() as u32);
    }
    Ok((offsets, lengths))
}

fn encode_strip(layout: Layout, samples: &[f32], strip: usize) -> Result<Vec<u8>> {
    let rows = layout.rows_in_strip(strip);
    let row_bytes = layout.row_bytes();
    let samples_per_row = layout.side * layout.channels;
    let mut raw = vec![0u8; rows * row_bytes];

    for r in 0..rows {
        let row_index = strip * layout.rows_per_strip + r;
        let src = &samples[row_index * samples_per_row..(row_index + 1) * samples_per_row];
        let dst = &mut raw[r * row_bytes..(r + 1) * row_bytes];
        codec::quantize(dst, src, layout.kind);
        codec::predict_row(dst, layout.side, layout.channels, layout.kind.bits);
    }
    codec::compress_strip(&raw)
}

/// Read and decode a full page of samples given the directory's strip
/// offset/length arrays (already resolved to absolute file offsets) and
/// strip count.
pub fn read_page(
    reader: &mut (impl Read + Seek),
    layout: Layout,
    offsets: &[u64],
    lengths: &[u32],
) -> Result<Vec<f32>> {
    let raw_strips: Vec<Vec<u8>> = offsets
        .iter()
        .zip(lengths)
        .map(|(&offset, &length)| {
            reader.seek(SeekFrom::Start(offset))?;
            let mut zipped = vec![0u8; length as usize];
            reader.read_exact(&mut zipped)?;
            Ok(zipped)
        })
        .collect::<Result<_>>()?;

    let samples_per_row = layout.side * layout.channels;
    let mut samples = vec![0f32; layout.side * samples_per_row];

    let decoded: Vec<Vec<f32>> = raw_strips
        .into_par_iter()
        .enumerate()
        .map(|(strip, zipped)| decode_strip(layout, strip, &zipped))
        .collect::<Result<_>>()?;

    for (strip, rows) in decoded.into_iter().enumerate() {
        let start_row = strip * layout.rows_per_strip;
        let base = start_row * samples_per_row;
        samples[base..base + rows.len()].copy_from_slice(&rows);
    }
    Ok(samples)
}

fn decode_strip(layout: Layout, strip: usize, zipped: &[u8]) -> Result<Vec<f32>> {
    let rows = layout.rows_in_strip(strip);
    let row_bytes = layout.row_bytes();
    let mut raw = codec::decompress_strip(zipped, rows * row_bytes)?;

    let samples_per_row = layout.side * layout.channels;
    let mut samples = vec![0f32; rows * samples_per_row];

    for r in 0..rows {
        let dst = &mut samples[r * samples_per_row..(r + 1) * samples_per_row];
        let raw_row = &mut raw[r * row_bytes..(r + 1) * row_bytes];
        codec::unpredict_row(raw_row, layout.side, layout.channels, layout.kind.bits);
        codec::dequantize(dst, raw_row, layout.kind);
    }
    Ok(samples)
}

/// Copy a page's already-compressed strips from one file to another
/// without an encode/decode round trip, the way `repeat` avoids doing
/// unnecessary work when the source and destination share a pixel format.
pub fn copy_raw_strips(
    src: &mut (impl Read + Seek),
    dst: &mut (impl Write + Seek),
    offsets: &[u64],
    lengths: &[u32],
) -> Result<(Vec<u64>, Vec<u32>)> {
    let mut new_offsets = Vec::with_capacity(offsets.len());
    for (&offset, &length) in offsets.iter().zip(lengths) {
        src.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        src.read_exact(&mut buf)?;
        new_offsets.push(dst.stream_position()?);
        dst.write_all(&buf)?;
    }
    Ok((new_offsets, lengths.to_vec()))
}

/// Read a `u64`/`u32` parallel array pair (strip offsets, strip lengths)
/// from the given absolute offsets.
pub fn read_strip_arrays(
    reader: &mut (impl Read + Seek),
    offsets_at: u64,
    lengths_at: u64,
    count: usize,
) -> Result<(Vec<u64>, Vec<u32>)> {
    reader.seek(SeekFrom::Start(offsets_at))?;
    let offsets = (0..count).map(|_| u64::read(reader)).collect::<Result<_>>()?;
    reader.seek(SeekFrom::Start(lengths_at))?;
    let lengths = (0..count).map(|_| u32::read(reader)).collect::<Result<_>>()?;
    Ok((offsets, lengths))
}

/// Write a `u64`/`u32` parallel array pair at the current file position,
/// returning their respective offsets.
pub fn write_strip_arrays(
    writer: &mut (impl Write + Seek),
    offsets: &[u64],
    lengths: &[u32],
) -> Result<(u64, u64)> {
    let offsets_at = writer.stream_position()?;
    for &o in offsets {
        o.write(writer)?;
    }
    let lengths_at = writer.stream_position()?;
    for &l in lengths {
        l.write(writer)?;
    }
    Ok((offsets_at, lengths_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn test_layout() -> Layout {
        Layout { side: 6, channels: 1, rows_per_strip: 4, kind: SampleKind::U8 }
    }

    #[test]
    fn page_roundtrips_through_write_and_read() {
        let layout = test_layout();
        let samples: Vec<f32> = (0..layout.side * layout.side)
            .map(|i| (i % layout.side) as f32 / (layout.side - 1) as f32)
            .collect();

        let mut file = Cursor::new(Vec::new());
        let (offsets, lengths) = write_page(&mut file, layout, &samples).unwrap();

        let mut file = Cursor::new(file.into_inner());
        let back = read_page(&mut file, layout, &offsets, &lengths).unwrap();

        for (a, b) in samples.iter().zip(&back) {
            assert!((a - b).abs() < 1.0 / 255.0 + 1e-6);
        }
    }

    #[test]
    fn strip_count_matches_ceiling_division() {
        let layout = test_layout();
        assert_eq!(layout.strip_count(), 2);
    }
}
