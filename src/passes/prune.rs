//! Dropping subtrees that add no detail beyond what their parent already
//! represents: if every pixel of a page is within `tolerance` of a single
//! value, and none of its children are themselves necessary, the whole
//! subtree can be served by sampling its parent instead of storing it.
//! Level-0 root pages are always kept regardless of constancy, since
//! there's no coarser page above them to fall back to.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::algebra::{self, PageIndex};
use crate::error::Result;
use crate::passes::read_all_pages;
use crate::progress::{Context, Progress};
use crate::store::Store;

/// Copy every page of `input` to `output` except subtrees whose pages are
/// all within `tolerance` of their own corner pixel and carry no necessary
/// descendants.
pub fn prune(input: &mut Store, output: &mut Store, tolerance: f32, ctx: &Context<'_, impl Progress>) -> Result<()> {
    let pages = read_all_pages(input)?;
    let params = input.params();

    let mut indices: Vec<PageIndex> = pages.keys().copied().collect();
    indices.sort_by_key(|&x| Reverse(algebra::level(x)));

    let mut necessary: HashMap<PageIndex, bool> = HashMap::with_capacity(indices.len());
    for &x in &indices {
        let is_root = algebra::level(x) == 0;
        let children_necessary = (0..4).any(|k| necessary.get(&algebra::child(x, k)).copied().unwrap_or(false));
        let constant = is_constant(&pages[&x], params.side + 2, params.channels, tolerance);
        necessary.insert(x, is_root || children_necessary || !constant);
    }

    let mut keep: Vec<PageIndex> = indices.iter().copied().filter(|x| necessary[x]).collect();
    keep.sort_unstable();
    ctx.progress.start("prune", keep.len() as u64);

    let mut previous = 0u64;
    for x in keep {
        previous = output.append(previous, x, &pages[&x])?;
        ctx.progress.step(1);
    }

    ctx.progress.finish();
    Ok(())
}

/// Whether every interior (halo excluded) pixel of `page` is within
/// `tolerance` of the page's own interior corner pixel (`1`, `1`).
fn is_constant(page: &[f32], side: usize, channels: usize, tolerance: f32) -> bool {
    let n = side - 2;
    (0..channels).all(|ch| {
        let corner = crate::passes::pixel(page, side, channels, 1, 1, ch);
        (0..n).all(|i| {
            (0..n).all(|j| (crate::passes::pixel(page, side, channels, i + 1, j + 1, ch) - corner).abs() <= tolerance)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SampleKind;
    use crate::progress::NullProgress;
    use crate::store::Params;
    use tempfile::NamedTempFile;

    #[test]
    fn constant_children_are_pruned_but_roots_survive() {
        let in_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let out_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let params = Params { side: 4, channels: 1, kind: SampleKind::U8 };

        let mut input = Store::create(&in_path, params).unwrap();
        let flat = vec![0.5f32; (params.side + 2) * (params.side + 2)];
        let mut previous = input.append(0, 4, &flat).unwrap();
        for k in 0..4 {
            previous = input.append(previous, algebra::child(4, k), &flat).unwrap();
        }
        let _ = previous;

        let mut output = Store::create(&out_path, params).unwrap();
        let progress = NullProgress;
        let ctx = Context::new(&progress, 0);
        prune(&mut input, &mut output, 1.0 / 255.0, &ctx).unwrap();

        output.scan_catalog().unwrap();
        assert_eq!(output.catalog.len(), 1);
        assert_eq!(output.catalog.index(0), 4);

        std::fs::remove_file(&in_path).ok();
        std::fs::remove_file(&out_path).ok();
    }
}
