//! Cross-page post-processing passes: every one of these reads an already
//! `finish`ed (or at least `append`ed) store and writes a transformed copy
//! to a second store, since the container's append-only chain can't grow
//! or shrink a page's strip data in place once the catalog is built.

pub mod border;
pub mod combine;
pub mod mipmap;
pub mod normal;
pub mod prune;
pub mod rectify;
pub mod sample;

use std::collections::HashMap;

use crate::algebra::PageIndex;
use crate::store::Store;

/// How a downsample or merge combines several source values into one:
/// the four reduction modes `mipmap` and `combine` both support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceMode {
    Sum,
    Max,
    Average,
    /// Reproduces a one-channel-off indexing quirk in the reduction this
    /// mode is grounded on: when combining four samples, the second one's
    /// channel-0 value is read one channel past where the rest of its
    /// channels and the other three samples all read theirs. Channels 1+
    /// read normally. Kept because the catalogs this crate reads were
    /// written against that exact behavior.
    MaxPixel,
}

/// Read every page of `store` into memory, keyed by page index. Used by
/// passes that need random access across the whole catalog (mipmap parents
/// need their children, border stitching needs every neighbor).
pub(crate) fn read_all_pages(store: &mut Store) -> crate::error::Result<HashMap<PageIndex, Vec<f32>>> {
    store.scan_catalog()?;
    let entries: Vec<(PageIndex, u64)> =
        (0..store.catalog.len()).map(|i| (store.catalog.index(i), store.catalog.offset(i))).collect();

    let mut pages = HashMap::with_capacity(entries.len());
    for (x, offset) in entries {
        pages.insert(x, store.read_page(offset)?);
    }
    Ok(pages)
}

/// Value at pixel (`row`, `col`, `channel`) of a halo-inclusive page buffer
/// whose raster side is `side` and which holds `channels` samples/pixel.
pub(crate) fn pixel(page: &[f32], side: usize, channels: usize, row: usize, col: usize, channel: usize) -> f32 {
    page[(row * side + col) * channels + channel]
}

pub(crate) fn set_pixel(
    page: &mut [f32],
    side: usize,
    channels: usize,
    row: usize,
    col: usize,
    channel: usize,
    value: f32,
) {
    page[(row * side + col) * channels + channel] = value;
}
