//! Merging two catalogs page by page: a page present in only one input is
//! `repeat`-ed through as a raw strip copy, with no decode/recode; a page
//! present in both is decoded and combined channel by channel. Operates on
//! the full halo-inclusive page buffer — earlier tooling in this lineage
//! sized its combine buffer from the interior side length alone and
//! silently dropped the halo; this implementation does not reproduce that
//! truncation.

use crate::algebra::PageIndex;
use crate::error::Result;
use crate::passes::read_all_pages;
use crate::progress::{Context, Progress};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMode {
    Sum,
    Max,
    Average,
    /// Treat the last channel of each page as an alpha weight and blend
    /// the remaining channels: `out = a*(1-alpha_b) + b*alpha_b`.
    Alpha,
}

/// Merge every page present in `a` or `b` into `output`, combining pages
/// present in both via `mode`.
pub fn combine(
    a: &mut Store,
    b: &mut Store,
    output: &mut Store,
    mode: CombineMode,
    ctx: &Context<'_, impl Progress>,
) -> Result<()> {
    let pages_a = read_all_pages(a)?;
    let pages_b = read_all_pages(b)?;
    let channels = a.params().channels;

    let mut indices: Vec<PageIndex> = pages_a.keys().chain(pages_b.keys()).copied().collect();
    indices.sort_unstable();
    indices.dedup();
    ctx.progress.start("combine", indices.len() as u64);

    let mut previous = 0u64;
    for x in indices {
        previous = match (pages_a.get(&x), pages_b.get(&x)) {
            (Some(pa), Some(pb)) => {
                let merged = combine_pages(pa, pb, channels, mode);
                output.append(previous, x, &merged)?
            }
            (Some(_), None) => {
                let offset = a.catalog.offset(a.catalog.search(x).expect("x came from a's catalog"));
                output.repeat(previous, a, offset)?
            }
            (None, Some(_)) => {
                let offset = b.catalog.offset(b.catalog.search(x).expect("x came from b's catalog"));
                output.repeat(previous, b, offset)?
            }
            (None, None) => unreachable!("index came from one of the two maps"),
        };
        ctx.progress.step(1);
    }

    ctx.progress.finish();
    Ok(())
}

fn combine_pages(a: &[f32], b: &[f32], channels: usize, mode: CombineMode) -> Vec<f32> {
    debug_assert_eq!(a.len(), b.len());
    let mut out = vec![0f32; a.len()];

    match mode {
        CombineMode::Sum => {
            for (o, (&av, &bv)) in out.iter_mut().zip(a.iter().zip(b)) {
                *o = av + bv;
            }
        }
        CombineMode::Max => {
            for (o, (&av, &bv)) in out.iter_mut().zip(a.iter().zip(b)) {
                *o = av.max(bv);
            }
        }
        CombineMode::Average => {
            for (o, (&av, &bv)) in out.iter_mut().zip(a.iter().zip(b)) {
                *o = (av + bv) / 2.0;
            }
        }
        CombineMode::Alpha => {
            let alpha_channel = channels - 1;
            for pixel in 0..a.len() / channels {
                let base = pixel * channels;
                let alpha_b = b[base + alpha_channel];
                for ch in 0..channels {
                    out[base + ch] = if ch == alpha_channel {
                        a[base + ch].max(alpha_b)
                    } else {
                        a[base + ch] * (1.0 - alpha_b) + b[base + ch] * alpha_b
                    };
                }
            }
        }
    }
    out
}
