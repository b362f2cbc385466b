//! Per-strip codec pipeline: float samples are quantized to a fixed-point
//! (or left as 32-bit float) raw encoding, horizontally difference-predicted
//! row by row, then deflate-compressed. Decoding reverses exactly these
//! three stages.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Sample storage width and signedness, mirroring the handful of pixel
/// formats the container supports: 8- or 16-bit integers (signed or
/// unsigned), or 32-bit IEEE float passed through unquantized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleKind {
    pub bits: u16,
    pub signed: bool,
}

impl SampleKind {
    pub const U8: Self = Self { bits: 8, signed: false };
    pub const U16: Self = Self { bits: 16, signed: false };
    pub const I8: Self = Self { bits: 8, signed: true };
    pub const I16: Self = Self { bits: 16, signed: true };
    pub const F32: Self = Self { bits: 32, signed: false };

    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        (self.bits / 8) as usize
    }
}

fn sclamp(k: f32) -> f32 {
    k.clamp(-1.0, 1.0)
}

fn uclamp(k: f32) -> f32 {
    k.clamp(0.0, 1.0)
}

/// Quantize `samples` into `out` using `kind`. `out` must hold
/// `samples.len() * kind.bytes_per_sample()` bytes already.
pub fn quantize(out: &mut [u8], samples: &[f32], kind: SampleKind) {
    match (kind.bits, kind.signed) {
        (8, false) => {
            for (o, &f) in out.iter_mut().zip(samples) {
                *o = (uclamp(f) * 255.0) as u8;
            }
        }
        (16, false) => {
            for (chunk, &f) in out.chunks_exact_mut(2).zip(samples) {
                let v = (uclamp(f) * 65535.0) as u16;
                chunk.copy_from_slice(&v.to_le_bytes());
            }
        }
        (8, true) => {
            for (o, &f) in out.iter_mut().zip(samples) {
                *o = ((sclamp(f) * 127.0) as i8).to_le_bytes()[0];
            }
        }
        (16, true) => {
            for (chunk, &f) in out.chunks_exact_mut(2).zip(samples) {
                let v = (sclamp(f) * 32767.0) as i16;
                chunk.copy_from_slice(&v.to_le_bytes());
            }
        }
        (32, _) => {
            for (chunk, &f) in out.chunks_exact_mut(4).zip(samples) {
                chunk.copy_from_slice(&f.to_le_bytes());
            }
        }
        _ => unreachable!("unsupported sample kind {kind:?}"),
    }
}

/// Reverse of `quantize`.
pub fn dequantize(samples: &mut [f32], raw: &[u8], kind: SampleKind) {
    match (kind.bits, kind.signed) {
        (8, false) => {
            for (s, &b) in samples.iter_mut().zip(raw) {
                *s = f32::from(b) / 255.0;
            }
        }
        (16, false) => {
            for (s, chunk) in samples.iter_mut().zip(raw.chunks_exact(2)) {
                let v = u16::from_le_bytes([chunk[0], chunk[1]]);
                *s = f32::from(v) / 65535.0;
            }
        }
        (8, true) => {
            for (s, &b) in samples.iter_mut().zip(raw) {
                *s = f32::from(b as i8) / 127.0;
            }
        }
        (16, true) => {
            for (s, chunk) in samples.iter_mut().zip(raw.chunks_exact(2)) {
                let v = i16::from_le_bytes([chunk[0], chunk[1]]);
                *s = f32::from(v) / 32767.0;
            }
        }
        (32, _) => {
            for (s, chunk) in samples.iter_mut().zip(raw.chunks_exact(4)) {
                *s = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
        }
        _ => unreachable!("unsupported sample kind {kind:?}"),
    }
}

/// Apply the horizontal-difference predictor to one row of `width` pixels,
/// `channels` samples wide, in place: column `j` becomes the difference
/// from column `j - 1`, scanned back to front so the subtraction always
/// reads the still-original neighbor. No-op for 32-bit float samples,
/// which the format never predicts.
pub fn predict_row(row: &mut [u8], width: usize, channels: usize, bits: u16) {
    match bits {
        8 => {
            for j in (1..width).rev() {
                for k in 0..channels {
                    let prev = row[(j - 1) * channels + k];
                    row[j * channels + k] = row[j * channels + k].wrapping_sub(prev);
                }
            }
        }
        16 => {
            for j in (1..width).rev() {
                for k in 0..channels {
                    let cur = sample16(row, j * channels + k);
                    let prev = sample16(row, (j - 1) * channels + k);
                    set_sample16(row, j * channels + k, cur.wrapping_sub(prev));
                }
            }
        }
        32 => {}
        other => unreachable!("unsupported predictor bit depth {other}"),
    }
}

/// Reverse of `predict_row`, scanning front to back so each reconstructed
/// sample is available before it's needed as the next column's base.
pub fn unpredict_row(row: &mut [u8], width: usize, channels: usize, bits: u16) {
    match bits {
        8 => {
            for j in 0..width.saturating_sub(1) {
                for k in 0..channels {
                    let prev = row[j * channels + k];
                    row[(j + 1) * channels + k] = row[(j + 1) * channels + k].wrapping_add(prev);
                }
            }
        }
        16 => {
            for j in 0..width.saturating_sub(1) {
                for k in 0..channels {
                    let prev = sample16(row, j * channels + k);
                    let next = sample16(row, (j + 1) * channels + k);
                    set_sample16(row, (j + 1) * channels + k, next.wrapping_add(prev));
                }
            }
        }
        32 => {}
        other => unreachable!("unsupported predictor bit depth {other}"),
    }
}

fn sample16(row: &[u8], index: usize) -> u16 {
    let b = index * 2;
    u16::from_le_bytes([row[b], row[b + 1]])
}

fn set_sample16(row: &mut [u8], index: usize, value: u16) {
    let b = index * 2;
    row[b..b + 2].copy_from_slice(&value.to_le_bytes());
}

/// Deflate-compress a raw strip.
pub fn compress_strip(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

/// Inflate a compressed strip back to `expected_len` raw bytes.
pub fn decompress_strip(zipped: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(zipped);
    let mut raw = Vec::with_capacity(expected_len);
    decoder.read_to_end(&mut raw)?;
    if raw.len() != expected_len {
        return Err(Error::CorruptStrip { page_index: 0 });
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_dequantize_u8_roundtrips_within_one_step() {
        let samples = [0.0f32, 0.25, 0.5, 0.75, 1.0];
        let mut raw = vec![0u8; samples.len()];
        quantize(&mut raw, &samples, SampleKind::U8);
        let mut back = vec![0f32; samples.len()];
        dequantize(&mut back, &raw, SampleKind::U8);
        for (a, b) in samples.iter().zip(&back) {
            assert!((a - b).abs() < 1.0 / 255.0 + 1e-6);
        }
    }

    #[test]
    fn quantize_f32_is_exact() {
        let samples = [1.0f32, -2.5, 3.25];
        let mut raw = vec![0u8; samples.len() * 4];
        quantize(&mut raw, &samples, SampleKind::F32);
        let mut back = vec![0f32; samples.len()];
        dequantize(&mut back, &raw, SampleKind::F32);
        assert_eq!(samples, back.as_slice());
    }

    #[test]
    fn predictor_roundtrips_u16_row() {
        let width = 6;
        let channels = 2;
        let mut raw = vec![0u8; width * channels * 2];
        let original: Vec<u16> = (0..width * channels).map(|i| (i * 137) as u16).collect();
        for (i, v) in original.iter().enumerate() {
            set_sample16(&mut raw, i, *v);
        }
        let mut predicted = raw.clone();
        predict_row(&mut predicted, width, channels, 16);
        unpredict_row(&mut predicted, width, channels, 16);
        assert_eq!(predicted, raw);
    }

    #[test]
    fn compress_decompress_roundtrips() {
        let raw: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();
        let zipped = compress_strip(&raw).unwrap();
        let back = decompress_strip(&zipped, raw.len()).unwrap();
        assert_eq!(raw, back);
    }
}
