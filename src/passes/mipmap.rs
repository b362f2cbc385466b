//! Building coarser pages from their four children by box-filter
//! downsampling, the way an image mipmap pyramid is built bottom-up.

use std::collections::HashMap;

use crate::algebra::{self, PageIndex};
use crate::error::Result;
use crate::passes::{pixel, set_pixel, ReduceMode};
use crate::progress::{Context, Progress};
use crate::store::{Params, Store};

/// Grow every missing ancestor page reachable from an existing page, then
/// recompute every internal page (leaves unchanged) from its children, and
/// write the whole resulting catalog to `output`. Synthesizing missing
/// parents (rather than only rebuilding parents the input already has) is
/// what lets a file holding only the deepest level of a mipmap chain grow
/// its whole pyramid in one pass.
pub fn mipmap(input: &mut Store, output: &mut Store, mode: ReduceMode, ctx: &Context<'_, impl Progress>) -> Result<()> {
    let params = input.params();
    let mut pages = crate::passes::read_all_pages(input)?;

    loop {
        let mut missing: Vec<PageIndex> = pages
            .keys()
            .copied()
            .filter(|&x| algebra::level(x) > 0)
            .map(algebra::parent)
            .filter(|p| !pages.contains_key(p))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        if missing.is_empty() {
            break;
        }
        for &p in &missing {
            let page = downsample_children(&pages, params, p, mode);
            pages.insert(p, page);
        }
    }

    let mut indices: Vec<PageIndex> = pages.keys().copied().collect();
    indices.sort_by_key(|&x| std::cmp::Reverse(algebra::level(x)));
    for &x in &indices {
        let has_child = (0..4).any(|k| pages.contains_key(&algebra::child(x, k)));
        if has_child {
            let page = downsample_children(&pages, params, x, mode);
            pages.insert(x, page);
        }
    }

    indices.sort_unstable();
    ctx.progress.start("mipmap", indices.len() as u64);
    let mut previous = 0u64;
    for x in indices {
        previous = output.append(previous, x, &pages[&x])?;
        ctx.progress.step(1);
    }
    ctx.progress.finish();
    Ok(())
}

fn downsample_children(
    pages: &HashMap<PageIndex, Vec<f32>>,
    params: Params,
    parent: PageIndex,
    mode: ReduceMode,
) -> Vec<f32> {
    let n = params.side;
    let side = n + 2;
    let channels = params.channels;
    let half = n / 2;
    let mut out = vec![0f32; side * side * channels];

    for k in 0..4 {
        let Some(child_page) = pages.get(&algebra::child(parent, k)) else { continue };
        let (row_base, col_base) = match k {
            0 => (0, 0),
            1 => (0, half),
            2 => (half, 0),
            _ => (half, half),
        };

        for i in 0..half {
            for j in 0..half {
                let r0 = 2 * i + 1;
                let c0 = 2 * j + 1;
                for ch in 0..channels {
                    let q0 = pixel(child_page, side, channels, r0, c0, ch);
                    let q1 = if mode == ReduceMode::MaxPixel && ch == 0 {
                        pixel(child_page, side, channels, r0, c0 + 1, (ch + 1).min(channels - 1))
                    } else {
                        pixel(child_page, side, channels, r0, c0 + 1, ch)
                    };
                    let q2 = pixel(child_page, side, channels, r0 + 1, c0, ch);
                    let q3 = pixel(child_page, side, channels, r0 + 1, c0 + 1, ch);

                    let value = match mode {
                        ReduceMode::Sum => q0 + q1 + q2 + q3,
                        ReduceMode::Average => (q0 + q1 + q2 + q3) / 4.0,
                        ReduceMode::Max | ReduceMode::MaxPixel => q0.max(q1).max(q2).max(q3),
                    };

                    set_pixel(&mut out, side, channels, row_base + i + 1, col_base + j + 1, ch, value);
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SampleKind;
    use crate::progress::NullProgress;
    use tempfile::NamedTempFile;

    #[test]
    fn averaging_constant_children_reproduces_the_constant() {
        let in_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let out_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let params = Params { side: 4, channels: 1, kind: SampleKind::U8 };

        let mut input = Store::create(&in_path, params).unwrap();
        let samples = vec![0.5f32; (params.side + 2) * (params.side + 2)];
        let mut previous = input.append(0, 4, &samples).unwrap();
        for k in 0..4 {
            previous = input.append(previous, algebra::child(4, k), &samples).unwrap();
        }
        let _ = previous;

        let mut output = Store::create(&out_path, params).unwrap();
        let progress = NullProgress;
        let ctx = Context::new(&progress, 0);
        mipmap(&mut input, &mut output, ReduceMode::Average, &ctx).unwrap();

        output.scan_catalog().unwrap();
        assert_eq!(output.catalog.len(), 5);

        std::fs::remove_file(&in_path).ok();
        std::fs::remove_file(&out_path).ok();
    }
}
