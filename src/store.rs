//! The page store façade: open/create a container file, append or copy
//! pages into it, scan its catalog, and run the `finish`/`polish`
//! metadata passes. This is the one type most callers need — the
//! directory-chain and strip-codec details live in `container` and
//! `codec`.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::algebra::{self, PageIndex};
use crate::codec::SampleKind;
use crate::container::header::{
    validate_header, validate_hfd, validate_ifd, Field, Header, Hfd, Ifd, TAG_BITS_PER_SAMPLE,
    TAG_COMPRESSION, TAG_CONFIGURATION, TAG_DESCRIPTION, TAG_IMAGE_LENGTH, TAG_IMAGE_WIDTH,
    TAG_INTERPRETATION, TAG_ORIENTATION, TAG_PAGE_INDEX, TAG_PAGE_MAXIMUM, TAG_PAGE_MINIMUM,
    TAG_PAGE_NUMBER, TAG_PAGE_OFFSET, TAG_PREDICTOR, TAG_ROWS_PER_STRIP, TAG_SAMPLES_PER_PIXEL,
    TAG_SAMPLE_FORMAT, TAG_STRIP_BYTE_COUNTS, TAG_STRIP_OFFSETS,
};
use crate::container::{self, Layout};
use crate::error::{Error, Result};
use crate::io::Data;

const DEFAULT_ROWS_PER_STRIP: usize = 16;

/// The parameters fixed at creation time for every page in a file: side
/// length (samples per page edge, not counting the one-pixel halo),
/// channel count, and sample storage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    pub side: usize,
    pub channels: usize,
    pub kind: SampleKind,
}

impl Params {
    fn layout(self, rows_per_strip: usize) -> Layout {
        Layout { side: self.side + 2, channels: self.channels, rows_per_strip, kind: self.kind }
    }
}

/// The sorted catalog of every real page in a file: parallel index and
/// file-offset vectors, plus a lookup from index to its position for
/// `O(1)` (amortized) neighbor search.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    indices: Vec<PageIndex>,
    offsets: Vec<u64>,
    position_of: HashMap<PageIndex, usize>,
}

impl Catalog {
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[must_use]
    pub fn index(&self, position: usize) -> PageIndex {
        self.indices[position]
    }

    #[must_use]
    pub fn offset(&self, position: usize) -> u64 {
        self.offsets[position]
    }

    /// Catalog position of page `x`, or `None` if it isn't present.
    #[must_use]
    pub fn search(&self, x: PageIndex) -> Option<usize> {
        self.position_of.get(&x).copied()
    }

    fn from_parallel_vecs(indices: Vec<PageIndex>, offsets: Vec<u64>) -> Self {
        let position_of = indices.iter().enumerate().map(|(i, &x)| (x, i)).collect();
        Self { indices, offsets, position_of }
    }

    fn is_leaf(&self, x: PageIndex) -> bool {
        (0..4).all(|k| self.search(algebra::child(x, k)).is_none())
    }
}

/// An open container file: either a freshly created output or an existing
/// input, positioned so `append`/`repeat` can extend its directory chain.
#[derive(Debug)]
pub struct Store {
    file: File,
    params: Params,
    rows_per_strip: usize,
    first_hfd: u64,
    pub catalog: Catalog,
}

impl Store {
    /// Open an existing container for reading (and, since pages are only
    /// ever appended, for further appends).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let header = validate_header(Header::read(&mut file)?)
            .map_err(|_| Error::not_our_format(path))?;

        file.seek(SeekFrom::Start(header.first_hfd))?;
        let hfd = validate_hfd(Hfd::read(&mut file)?).map_err(|_| Error::not_our_format(path))?;

        let side = hfd.image_width.offset as usize;
        let channels = hfd.samples_per_pixel.offset as usize;
        let rows_per_strip = hfd.rows_per_strip.offset as usize;
        let bits = hfd.bits_per_sample.packed_u16s()[0];
        let signed = hfd.sample_format.packed_u16s()[0] == 2;

        Ok(Self {
            file,
            params: Params { side, channels, kind: SampleKind { bits, signed } },
            rows_per_strip,
            first_hfd: header.first_hfd,
            catalog: Catalog::default(),
        })
    }

    /// Create a new, empty container with the given per-page parameters.
    pub fn create(path: impl AsRef<Path>, params: Params) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path)?;

        let rows_per_strip = DEFAULT_ROWS_PER_STRIP;
        let hfd = init_hfd(params, rows_per_strip)?;

        let header = Header::new(0);
        header.write(&mut file)?;
        let first_hfd = file.stream_position()?;
        hfd.write(&mut file)?;

        file.seek(SeekFrom::Start(0))?;
        Header::new(first_hfd).write(&mut file)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self { file, params, rows_per_strip, first_hfd, catalog: Catalog::default() })
    }

    #[must_use]
    pub fn params(&self) -> Params {
        self.params
    }

    #[must_use]
    pub fn rows_per_strip(&self) -> usize {
        self.rows_per_strip
    }

    /// Samples in one full (halo-inclusive) page buffer.
    #[must_use]
    pub fn page_samples(&self) -> usize {
        let side = self.params.side + 2;
        side * side * self.params.channels
    }

    fn layout(&self) -> Layout {
        self.params.layout(self.rows_per_strip)
    }

    /// Append a new page at `x`, chained after the directory at file
    /// offset `previous` (`0` for the first page of the file). Returns
    /// this page's directory offset, to be threaded into the next call.
    pub fn append(&mut self, previous: u64, x: PageIndex, samples: &[f32]) -> Result<u64> {
        let mut ifd = init_ifd(self.params, self.rows_per_strip)?;

        self.file.seek(SeekFrom::End(0))?;
        let ifd_offset = self.file.stream_position()?;
        ifd.write(&mut self.file)?;

        let (offsets, lengths) = container::write_page(&mut self.file, self.layout(), samples)?;
        align(&mut self.file)?;

        let (offsets_at, lengths_at) =
            container::write_strip_arrays(&mut self.file, &offsets, &lengths)?;

        ifd.strip_offsets = Field::new(TAG_STRIP_OFFSETS, 16, offsets.len() as u64, offsets_at);
        ifd.strip_byte_counts =
            Field::new(TAG_STRIP_BYTE_COUNTS, 4, lengths.len() as u64, lengths_at);
        ifd.page_number = Field::new(TAG_PAGE_NUMBER, 4, 1, x as u64);

        self.file.seek(SeekFrom::Start(ifd_offset))?;
        ifd.write(&mut self.file)?;

        self.link(ifd_offset, previous)?;
        self.file.seek(SeekFrom::End(0))?;
        self.file.flush()?;
        Ok(ifd_offset)
    }

    /// Copy page `x` from `source`'s directory at `source_offset` into
    /// this file without decoding and re-encoding it, chained after
    /// `previous`. Both stores must share `side`/`channels`/`kind`.
    pub fn repeat(&mut self, previous: u64, source: &mut Store, source_offset: u64) -> Result<u64> {
        debug_assert_eq!(self.params, source.params, "repeat requires matching page parameters");

        source.file.seek(SeekFrom::Start(source_offset))?;
        let mut ifd = validate_ifd(Ifd::read(&mut source.file)?)?;

        let strip_count = ifd.strip_byte_counts.count as usize;
        let (src_offsets, lengths) = container::read_strip_arrays(
            &mut source.file,
            ifd.strip_offsets.offset,
            ifd.strip_byte_counts.offset,
            strip_count,
        )?;

        self.file.seek(SeekFrom::End(0))?;
        let ifd_offset = self.file.stream_position()?;
        ifd.next = 0;
        ifd.write(&mut self.file)?;

        let (offsets, lengths) =
            container::copy_raw_strips(&mut source.file, &mut self.file, &src_offsets, &lengths)?;
        align(&mut self.file)?;

        let (offsets_at, lengths_at) =
            container::write_strip_arrays(&mut self.file, &offsets, &lengths)?;

        ifd.strip_offsets = Field::new(TAG_STRIP_OFFSETS, 16, offsets.len() as u64, offsets_at);
        ifd.strip_byte_counts =
            Field::new(TAG_STRIP_BYTE_COUNTS, 4, lengths.len() as u64, lengths_at);

        self.file.seek(SeekFrom::Start(ifd_offset))?;
        ifd.write(&mut self.file)?;

        self.link(ifd_offset, previous)?;
        self.file.seek(SeekFrom::End(0))?;
        self.file.flush()?;
        Ok(ifd_offset)
    }

    fn link(&mut self, child_offset: u64, previous: u64) -> Result<()> {
        if previous == 0 {
            self.file.seek(SeekFrom::Start(self.first_hfd))?;
            let mut hfd = Hfd::read(&mut self.file)?;
            hfd.next = child_offset;
            self.file.seek(SeekFrom::Start(self.first_hfd))?;
            hfd.write(&mut self.file)?;
        } else {
            self.file.seek(SeekFrom::Start(previous))?;
            let mut ifd = Ifd::read(&mut self.file)?;
            ifd.next = child_offset;
            self.file.seek(SeekFrom::Start(previous))?;
            ifd.write(&mut self.file)?;
        }
        Ok(())
    }

    /// Offset of the first page's directory, i.e. the head of the chain.
    fn rewind(&mut self) -> Result<u64> {
        self.file.seek(SeekFrom::Start(self.first_hfd))?;
        let hfd = Hfd::read(&mut self.file)?;
        Ok(hfd.next)
    }

    /// Scan every page directory in the file and populate `self.catalog`
    /// with sorted (index, offset) pairs.
    pub fn scan_catalog(&mut self) -> Result<()> {
        let mut indices = Vec::new();
        let mut ifd_offsets = Vec::new();

        let mut offset = self.rewind()?;
        while offset != 0 {
            self.file.seek(SeekFrom::Start(offset))?;
            let ifd = validate_ifd(Ifd::read(&mut self.file)?)?;
            indices.push(ifd.page_number.offset as PageIndex);
            ifd_offsets.push(offset);
            offset = ifd.next;
        }

        let mut order: Vec<usize> = (0..indices.len()).collect();
        order.sort_by_key(|&i| indices[i]);

        let sorted_indices: Vec<PageIndex> = order.iter().map(|&i| indices[i]).collect();
        let sorted_offsets: Vec<u64> = order.iter().map(|&i| ifd_offsets[i]).collect();

        self.catalog = Catalog::from_parallel_vecs(sorted_indices, sorted_offsets);
        Ok(())
    }

    /// Rewrite the directory chain so it links pages in ascending page-index
    /// order rather than whatever order they were appended in. Passes like
    /// `convert` write pages depth-first, leaving a chain `scan_catalog`
    /// still reads correctly but a naive sequential reader would not.
    pub fn relink(&mut self) -> Result<()> {
        self.scan_catalog()?;
        if self.catalog.is_empty() {
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(self.first_hfd))?;
        let mut hfd = Hfd::read(&mut self.file)?;
        hfd.next = self.catalog.offset(0);
        self.file.seek(SeekFrom::Start(self.first_hfd))?;
        hfd.write(&mut self.file)?;

        for i in 0..self.catalog.len() {
            let offset = self.catalog.offset(i);
            self.file.seek(SeekFrom::Start(offset))?;
            let mut ifd = validate_ifd(Ifd::read(&mut self.file)?)?;
            ifd.next = if i + 1 < self.catalog.len() { self.catalog.offset(i + 1) } else { 0 };
            self.file.seek(SeekFrom::Start(offset))?;
            ifd.write(&mut self.file)?;
        }

        self.file.seek(SeekFrom::End(0))?;
        Ok(())
    }

    /// Read and decode the page whose directory sits at `ifd_offset`
    /// (typically `self.catalog.offset(position)`).
    pub fn read_page(&mut self, ifd_offset: u64) -> Result<Vec<f32>> {
        self.file.seek(SeekFrom::Start(ifd_offset))?;
        let ifd = validate_ifd(Ifd::read(&mut self.file)?)?;

        let strip_count = ifd.strip_byte_counts.count as usize;
        let (offsets, lengths) = container::read_strip_arrays(
            &mut self.file,
            ifd.strip_offsets.offset,
            ifd.strip_byte_counts.offset,
            strip_count,
        )?;
        container::read_page(&mut self.file, self.layout(), &offsets, &lengths)
    }

    /// LibTIFF refuses a non-zero-sized IFD with no strip data of its own;
    /// point the head directory's strip fields at the first page's strips
    /// so a naive TIFF reader opening just the HFD still finds real data.
    pub fn polish(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.first_hfd))?;
        let mut hfd = Hfd::read(&mut self.file)?;

        if hfd.next != 0 {
            self.file.seek(SeekFrom::Start(hfd.next))?;
            let ifd = validate_ifd(Ifd::read(&mut self.file)?)?;
            hfd.strip_offsets = ifd.strip_offsets;
            hfd.strip_byte_counts = ifd.strip_byte_counts;
        }

        self.file.seek(SeekFrom::Start(self.first_hfd))?;
        hfd.write(&mut self.file)?;
        Ok(())
    }

    /// Compute the page-index catalog grown by `depth` virtual oversample
    /// levels, and the per-channel min/max extrema for each entry, without
    /// writing anything. Shared by `finish` (which also persists the
    /// result) and the read-only `extrema` report.
    pub fn compute_extrema(&mut self, depth: i32) -> Result<Option<(Vec<PageIndex>, Vec<f32>, Vec<f32>)>> {
        self.scan_catalog()?;
        let xv: Vec<PageIndex> = (0..self.catalog.len()).map(|i| self.catalog.index(i)).collect();
        if xv.is_empty() {
            return Ok(None);
        }

        let yv = grow_leaves(&self.catalog, &xv, depth);
        let position_of: HashMap<PageIndex, usize> =
            yv.iter().enumerate().map(|(i, &x)| (x, i)).collect();

        let channels = self.params.channels;
        let mut min_values = vec![f32::MAX; yv.len() * channels];
        let mut max_values = vec![f32::MIN; yv.len() * channels];

        for &x in xv.iter().rev() {
            let y_pos = position_of[&x];
            if self.catalog.is_leaf(x) {
                if let Some(page_pos) = self.catalog.search(x) {
                    let offset = self.catalog.offset(page_pos);
                    let page = self.read_page(offset)?;
                    bound_leaf(
                        self.params.side,
                        channels,
                        &page,
                        &yv,
                        &position_of,
                        &mut min_values,
                        &mut max_values,
                        x,
                        0,
                        self.params.side,
                        0,
                        self.params.side,
                        depth,
                    );
                }
            } else {
                bound_node(y_pos, channels, x, &position_of, &mut min_values, &mut max_values);
            }
        }

        Ok(Some((yv, min_values, max_values)))
    }

    /// Compute and append the page-index/offset catalog and per-page
    /// min/max extrema, oversampling leaves to `depth` virtual levels so
    /// extrema stay accurate under later mipmap/sample queries, then
    /// record them (plus `description`) in the head directory.
    pub fn finish(&mut self, description: &str, depth: i32) -> Result<()> {
        let Some((yv, min_values, max_values)) = self.compute_extrema(depth)? else { return Ok(()) };
        let channels = self.params.channels;

        let sample_type = tiff_sample_type(self.params.kind);
        let mut min_raw = vec![0u8; yv.len() * channels * self.params.kind.bytes_per_sample()];
        let mut max_raw = vec![0u8; yv.len() * channels * self.params.kind.bytes_per_sample()];
        crate::codec::quantize(&mut min_raw, &min_values, self.params.kind);
        crate::codec::quantize(&mut max_raw, &max_values, self.params.kind);

        self.file.seek(SeekFrom::End(0))?;
        let index_at = self.file.stream_position()?;
        for &x in &yv {
            (x as u64).write(&mut self.file)?;
        }
        let offsets_at = self.file.stream_position()?;
        for &x in &yv {
            let offset = self.catalog.search(x).map_or(0, |p| self.catalog.offset(p));
            offset.write(&mut self.file)?;
        }
        let min_at = self.file.stream_position()?;
        self.file.write_all(&min_raw)?;
        let max_at = self.file.stream_position()?;
        self.file.write_all(&max_raw)?;
        let text_at = self.file.stream_position()?;
        let text = description.as_bytes();
        self.file.write_all(text)?;
        self.file.write_all(&[0u8])?;

        self.file.seek(SeekFrom::Start(self.first_hfd))?;
        let mut hfd = Hfd::read(&mut self.file)?;
        hfd.page_index = Field::new(TAG_PAGE_INDEX, 16, yv.len() as u64, index_at);
        hfd.page_offset = Field::new(TAG_PAGE_OFFSET, 16, yv.len() as u64, offsets_at);
        hfd.page_minimum =
            Field::new(TAG_PAGE_MINIMUM, sample_type, (yv.len() * channels) as u64, min_at);
        hfd.page_maximum =
            Field::new(TAG_PAGE_MAXIMUM, sample_type, (yv.len() * channels) as u64, max_at);
        hfd.description = Field::new(TAG_DESCRIPTION, 2, text.len() as u64 + 1, text_at);
        self.file.seek(SeekFrom::Start(self.first_hfd))?;
        hfd.write(&mut self.file)?;
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn bound_leaf(
    n: usize,
    channels: usize,
    page: &[f32],
    yv: &[PageIndex],
    position_of: &HashMap<PageIndex, usize>,
    min_values: &mut [f32],
    max_values: &mut [f32],
    x: PageIndex,
    left: usize,
    right: usize,
    top: usize,
    bottom: usize,
    depth: i32,
) {
    if depth > 0 {
        let h = (left + right) / 2;
        let v = (top + bottom) / 2;
        let children = [
            (algebra::child(x, 0), left, h, top, v),
            (algebra::child(x, 1), h, right, top, v),
            (algebra::child(x, 2), left, h, v, bottom),
            (algebra::child(x, 3), h, right, v, bottom),
        ];
        for (cx, l, r, t, b) in children {
            bound_leaf(n, channels, page, yv, position_of, min_values, max_values, cx, l, r, t, b, depth - 1);
        }
        if let Some(&pos) = position_of.get(&x) {
            bound_node(pos, channels, x, position_of, min_values, max_values);
        }
        return;
    }

    let Some(&pos) = position_of.get(&x) else { return };
    let side = n + 2;
    for k in 0..channels {
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for y in top..bottom {
            for xx in left..right {
                let sample = page[((y + 1) * side + (xx + 1)) * channels + k];
                lo = lo.min(sample);
                hi = hi.max(sample);
            }
        }
        min_values[pos * channels + k] = lo;
        max_values[pos * channels + k] = hi;
    }
}

fn bound_node(
    pos: usize,
    channels: usize,
    x: PageIndex,
    position_of: &HashMap<PageIndex, usize>,
    min_values: &mut [f32],
    max_values: &mut [f32],
) {
    for k in 0..channels {
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for kid in 0..4 {
            if let Some(&child_pos) = position_of.get(&algebra::child(x, kid)) {
                lo = lo.min(min_values[child_pos * channels + k]);
                hi = hi.max(max_values[child_pos * channels + k]);
            }
        }
        min_values[pos * channels + k] = lo;
        max_values[pos * channels + k] = hi;
    }
}

/// Extend the real catalog with `depth` levels of virtual (non-stored)
/// descendants under each leaf, so `finish` can compute extrema that
/// anticipate deeper mipmap/sample queries than the file actually stores.
fn grow_leaves(catalog: &Catalog, xv: &[PageIndex], depth: i32) -> Vec<PageIndex> {
    let mut yv: Vec<PageIndex> = xv.to_vec();
    if depth > 0 {
        for &x in xv {
            if catalog.is_leaf(x) {
                grow_leaf(x, depth - 1, &mut yv);
            }
        }
    }
    yv.sort_unstable();
    yv.dedup();
    yv
}

fn grow_leaf(x: PageIndex, depth: i32, out: &mut Vec<PageIndex>) {
    out.push(x);
    if depth > 0 {
        for k in 0..4 {
            grow_leaf(algebra::child(x, k), depth - 1, out);
        }
    }
}

fn tiff_sample_type(kind: SampleKind) -> u16 {
    match (kind.bits, kind.signed) {
        (8, false) => 1,
        (16, false) => 3,
        (8, true) => 6,
        (16, true) => 8,
        (32, _) => 11,
        _ => 7,
    }
}

fn photometric_interpretation(channels: usize) -> u64 {
    if channels == 1 {
        1
    } else {
        3
    }
}

fn predictor_kind(kind: SampleKind) -> u64 {
    if kind.bits == 32 {
        1
    } else {
        2
    }
}

fn init_hfd(params: Params, rows_per_strip: usize) -> Result<Hfd> {
    check_supported(params)?;

    let b = params.kind.bits;
    let f = tiff_sample_format(params.kind);
    let bits_field =
        Field::new(TAG_BITS_PER_SAMPLE, 3, params.channels as u64, 0).with_packed_u16s(channel_fill(b, params.channels));
    let format_field = Field::new(TAG_SAMPLE_FORMAT, 3, params.channels as u64, 0)
        .with_packed_u16s(channel_fill(f, params.channels));

    Ok(Hfd {
        count: 13,
        image_width: Field::new(TAG_IMAGE_WIDTH, 3, 1, params.side as u64),
        image_length: Field::new(TAG_IMAGE_LENGTH, 3, 1, params.side as u64),
        bits_per_sample: bits_field,
        description: Field::new(TAG_DESCRIPTION, 2, 0, 0),
        strip_offsets: Field::new(TAG_STRIP_OFFSETS, 16, 0, 0),
        samples_per_pixel: Field::new(TAG_SAMPLES_PER_PIXEL, 3, 1, params.channels as u64),
        rows_per_strip: Field::new(TAG_ROWS_PER_STRIP, 3, 1, rows_per_strip as u64),
        strip_byte_counts: Field::new(TAG_STRIP_BYTE_COUNTS, 4, 0, 0),
        sample_format: format_field,
        page_index: Field::new(TAG_PAGE_INDEX, 0, 0, 0),
        page_offset: Field::new(TAG_PAGE_OFFSET, 0, 0, 0),
        page_minimum: Field::new(TAG_PAGE_MINIMUM, 0, 0, 0),
        page_maximum: Field::new(TAG_PAGE_MAXIMUM, 0, 0, 0),
        next: 0,
    })
}

fn init_ifd(params: Params, rows_per_strip: usize) -> Result<Ifd> {
    check_supported(params)?;

    let b = params.kind.bits;
    let f = tiff_sample_format(params.kind);
    let bits_field =
        Field::new(TAG_BITS_PER_SAMPLE, 3, params.channels as u64, 0).with_packed_u16s(channel_fill(b, params.channels));
    let format_field = Field::new(TAG_SAMPLE_FORMAT, 3, params.channels as u64, 0)
        .with_packed_u16s(channel_fill(f, params.channels));

    Ok(Ifd {
        count: 14,
        image_width: Field::new(TAG_IMAGE_WIDTH, 3, 1, params.side as u64),
        image_length: Field::new(TAG_IMAGE_LENGTH, 3, 1, params.side as u64),
        bits_per_sample: bits_field,
        compression: Field::new(TAG_COMPRESSION, 3, 1, 8),
        interpretation: Field::new(TAG_INTERPRETATION, 3, 1, photometric_interpretation(params.channels)),
        strip_offsets: Field::new(TAG_STRIP_OFFSETS, 0, 0, 0),
        orientation: Field::new(TAG_ORIENTATION, 3, 1, 2),
        samples_per_pixel: Field::new(TAG_SAMPLES_PER_PIXEL, 3, 1, params.channels as u64),
        rows_per_strip: Field::new(TAG_ROWS_PER_STRIP, 3, 1, rows_per_strip as u64),
        strip_byte_counts: Field::new(TAG_STRIP_BYTE_COUNTS, 0, 0, 0),
        configuration: Field::new(TAG_CONFIGURATION, 3, 1, 1),
        page_number: Field::new(TAG_PAGE_NUMBER, 0, 0, 0),
        predictor: Field::new(TAG_PREDICTOR, 3, 1, predictor_kind(params.kind)),
        sample_format: format_field,
        next: 0,
    })
}

fn channel_fill(value: u16, channels: usize) -> [u16; 4] {
    let mut out = [0u16; 4];
    for (k, slot) in out.iter_mut().enumerate() {
        *slot = if k < channels { value } else { 0 };
    }
    out
}

fn tiff_sample_format(kind: SampleKind) -> u16 {
    if kind.bits == 32 {
        3
    } else if kind.signed {
        2
    } else {
        1
    }
}

fn check_supported(params: Params) -> Result<()> {
    if params.channels * (params.kind.bits as usize / 8) <= 8 {
        Ok(())
    } else {
        Err(Error::parameter_mismatch("channels * bytes_per_sample", "<= 8", params.channels * (params.kind.bits as usize / 8)))
    }
}

fn align(stream: &mut (impl Write + Seek)) -> Result<u64> {
    let offset = stream.stream_position()?;
    crate::io::align(stream, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn scratch_path() -> std::path::PathBuf {
        NamedTempFile::new().unwrap().into_temp_path().keep().unwrap()
    }

    #[test]
    fn create_open_append_and_read_page_roundtrips() {
        let path = scratch_path();
        let params = Params { side: 4, channels: 1, kind: SampleKind::U8 };

        {
            let mut store = Store::create(&path, params).unwrap();
            let samples = vec![0.5f32; (params.side + 2) * (params.side + 2)];
            store.append(0, 4, &samples).unwrap();
        }

        let mut store = Store::open(&path).unwrap();
        store.scan_catalog().unwrap();
        assert_eq!(store.catalog.len(), 1);
        assert_eq!(store.catalog.index(0), 4);

        let page = store.read_page(store.catalog.offset(0)).unwrap();
        assert!(page.iter().all(|&v| (v - 0.5).abs() < 1.0 / 255.0 + 1e-6));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn finish_writes_catalog_and_extrema_fields() {
        let path = scratch_path();
        let params = Params { side: 2, channels: 1, kind: SampleKind::U8 };

        let mut store = Store::create(&path, params).unwrap();
        let samples = vec![0.25f32; (params.side + 2) * (params.side + 2)];
        let mut previous = 0u64;
        for face in 0..6 {
            previous = store.append(previous, face, &samples).unwrap();
        }
        store.scan_catalog().unwrap();
        store.finish("test store", 0).unwrap();

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn relink_visits_pages_in_ascending_index_order() {
        let path = scratch_path();
        let params = Params { side: 2, channels: 1, kind: SampleKind::U8 };

        let mut store = Store::create(&path, params).unwrap();
        let samples = vec![0.1f32; (params.side + 2) * (params.side + 2)];
        let mut previous = 0u64;
        for face in (0..6).rev() {
            previous = store.append(previous, face, &samples).unwrap();
        }

        store.relink().unwrap();
        store.scan_catalog().unwrap();
        let indices: Vec<PageIndex> = (0..store.catalog.len()).map(|i| store.catalog.index(i)).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);

        std::fs::remove_file(&path).ok();
    }
}
