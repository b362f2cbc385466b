//! Rendering a source image onto the pages of a store: an overlap probe
//! prunes any subtree the source never touches, and every surviving page
//! at the fixed target depth is filled by a quincunx (five-sample) filter
//! and appended only if at least one of its pixels actually hit the
//! source. Pages above the target depth are never rendered directly; a
//! later `mipmap` pass builds the rest of the pyramid from this leaf
//! level upward.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::algebra::{self, Face, PageIndex};
use crate::error::Result;
use crate::progress::{Context, Progress};
use crate::sampler::ImageSource;
use crate::store::{Params, Store};
use crate::vector::Vector3;

/// Render `source` onto `store` at a fixed subdivision depth `d`, pruning
/// any page whose footprint the source never overlaps.
pub fn convert<S: ImageSource>(source: &S, store: &mut Store, d: i32, ctx: &Context<'_, impl Progress>) -> Result<()> {
    let total: u64 = 6 * 4u64.pow(d.max(0) as u32);
    ctx.progress.start("convert", total);

    let mut previous = 0u64;
    for f in 0..Face::COUNT {
        previous = divide(source, store, d, Face::new(i64::from(f)), i64::from(f), 0, 0, 1, previous, ctx)?;
    }

    ctx.progress.finish();
    Ok(())
}

/// Consider page `x`, at row `u` column `v` of the `w`-by-`w` page array on
/// `face`. If the source overlaps it at all, either render it (at `d == 0`)
/// or recurse into its four children (`d - 1` each).
#[allow(clippy::too_many_arguments)]
fn divide<S: ImageSource>(
    source: &S,
    store: &mut Store,
    d: i32,
    face: Face,
    x: PageIndex,
    u: i64,
    v: i64,
    w: i64,
    previous: u64,
    ctx: &Context<'_, impl Progress>,
) -> Result<u64> {
    if !overlap(source, face, u, v, w) {
        return Ok(previous);
    }

    if d == 0 {
        let (page, hit) = render_page(source, store.params(), face, u, v, w);
        ctx.progress.step(1);
        if hit {
            store.append(previous, x, &page)
        } else {
            Ok(previous)
        }
    } else {
        let mut previous = previous;
        for (k, &(du, dv)) in [(0, 0), (0, 1), (1, 0), (1, 1)].iter().enumerate() {
            previous = divide(source, store, d - 1, face, algebra::child(x, k as i64), u * 2 + du, v * 2 + dv, w * 2, previous, ctx)?;
        }
        Ok(previous)
    }
}

/// Approximate whether `source` touches the page at row `u` column `v` of
/// the `w`-by-`w` page array on `face`, by probing a 129-by-129 grid of
/// pixel centers within its footprint and stopping at the first hit.
fn overlap(source: &impl ImageSource, face: Face, u: i64, v: i64, w: i64) -> bool {
    const PROBE: i64 = 128;
    for i in 0..=PROBE {
        for j in 0..=PROBE {
            let direction = algebra::sample_center(face, PROBE * u + i, PROBE * v + j, PROBE * w);
            if source.locate(direction) {
                return true;
            }
        }
    }
    false
}

/// Fill the interior `n`-by-`n` region of a halo-inclusive `(n+2)`-by-`(n+2)`
/// page raster at row `u` column `v` of the `w`-by-`w` page array on `face`,
/// leaving the halo zeroed for a later border pass to stitch. Returns
/// whether any interior pixel actually hit the source. Rows are filled in
/// parallel, each reducing into the shared hit flag, mirroring the
/// original's per-row OpenMP parallelization of this same loop.
fn render_page<S: ImageSource>(source: &S, params: Params, face: Face, u: i64, v: i64, w: i64) -> (Vec<f32>, bool) {
    let n = params.side as i64;
    let o = n + 2;
    let channels = params.channels;
    let mut buffer = vec![0f32; (o * o) as usize * channels];
    let hit = AtomicBool::new(false);

    buffer.par_chunks_mut(o as usize * channels).enumerate().for_each(|(row, row_buffer)| {
        let i = row as i64 - 1;
        if !(0..n).contains(&i) {
            return;
        }
        for j in 0..n {
            let at = ((j + 1) * channels as i64) as usize;
            if corner(source, face, i, j, n, u, v, w, &mut row_buffer[at..at + channels]) {
                hit.store(true, Ordering::Relaxed);
            }
        }
    });
    (buffer, hit.load(Ordering::Relaxed))
}

/// Sample the pixel at row `i` column `j` of the `n`-by-`n` page at row `u`
/// column `v` of the `w`-by-`w` page array on `face`, via a quincunx
/// filtering of its four corners, writing the weighted average into `out`.
/// Returns whether any of the five sample points hit the source.
#[allow(clippy::too_many_arguments)]
fn corner<S: ImageSource>(source: &S, face: Face, i: i64, j: i64, n: i64, u: i64, v: i64, w: i64, out: &mut [f32]) -> bool {
    let channels = source.channels();
    let corners = algebra::sample_corners(face, n * u + i, n * v + j, n * w);
    let points = quincunx_points(corners);

    let mut sum = vec![0f32; channels];
    let mut total_weight = 0f32;
    let mut raw = vec![0f32; channels];

    for point in points {
        let weight = source.sample(point, &mut raw);
        if weight > 0.0 {
            for (s, &v) in sum.iter_mut().zip(&raw) {
                *s += v * weight;
            }
            total_weight += weight;
        }
    }

    if total_weight > 0.0 {
        for (o, s) in out.iter_mut().zip(&sum) {
            *o = *s / total_weight;
        }
        true
    } else {
        false
    }
}

/// The five points of a quincunx filter over a pixel's four corners: the
/// pixel's true center (the normalized sum of all four corners), and the
/// four points each halfway between that center and one corner. Sampling
/// here rather than at the corners themselves avoids double-sampling the
/// edges shared with neighboring pixels.
fn quincunx_points(corners: [Vector3; 4]) -> [Vector3; 5] {
    let center = corners[0].add(corners[1]).add(corners[2]).add(corners[3]).normalized();
    [
        center,
        center.add(corners[0]).normalized(),
        center.add(corners[1]).normalized(),
        center.add(corners[2]).normalized(),
        center.add(corners[3]).normalized(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SampleKind;
    use crate::progress::NullProgress;
    use crate::sampler::SolidColor;
    use tempfile::NamedTempFile;

    #[test]
    fn constant_source_fills_every_leaf_at_the_target_depth() {
        let path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let params = Params { side: 4, channels: 1, kind: SampleKind::U8 };
        let mut store = Store::create(&path, params).unwrap();
        let source = SolidColor::new(vec![0.5]);
        let progress = NullProgress;
        let ctx = Context::new(&progress, 1);

        convert(&source, &mut store, 2, &ctx).unwrap();
        store.scan_catalog().unwrap();

        // depth 2: only the leaves survive (convert never appends above the
        // target depth), six roots' worth of 16 grandchildren each.
        assert_eq!(store.catalog.len(), 6 * 16);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn a_source_that_never_hits_anything_converts_to_an_empty_catalog() {
        struct Nowhere;
        impl ImageSource for Nowhere {
            fn channels(&self) -> usize {
                1
            }
            fn sample(&self, _direction: Vector3, _out: &mut [f32]) -> f32 {
                0.0
            }
            fn locate(&self, _direction: Vector3) -> bool {
                false
            }
        }

        let path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let params = Params { side: 4, channels: 1, kind: SampleKind::U8 };
        let mut store = Store::create(&path, params).unwrap();
        let progress = NullProgress;
        let ctx = Context::new(&progress, 1);

        convert(&Nowhere, &mut store, 2, &ctx).unwrap();
        store.scan_catalog().unwrap();
        assert_eq!(store.catalog.len(), 0);

        std::fs::remove_file(&path).ok();
    }
}
