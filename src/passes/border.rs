//! Stitching the one-pixel halo around each page from its real neighbors,
//! so sampling and mipmap filters never need to special-case page edges.
//! Straight edges copy from the adjacent page's outermost interior row or
//! column; corners copy from whichever diagonal neighbor the seam tables
//! resolve to. Crossing onto a different cube face remaps the shared
//! edge's coordinate by applying both `SEAM_I` and `SEAM_J` to the same
//! same-face-convention `(row, col)` pair — some face pairs transpose the
//! axes rather than just flipping one of them, so both functions are
//! always looked up together, never just one applied to the varying axis.

use std::collections::HashMap;

use crate::algebra::{self, PageIndex, SeamFn, SEAM_I, SEAM_J};
use crate::error::Result;
use crate::passes::{pixel, read_all_pages, set_pixel};
use crate::progress::{Context, Progress};
use crate::store::Store;

/// Rewrite every page of `input` with its halo stitched from its real
/// neighbors, writing the result to `output`.
pub fn border(input: &mut Store, output: &mut Store, ctx: &Context<'_, impl Progress>) -> Result<()> {
    let pages = read_all_pages(input)?;
    let params = input.params();
    let n = params.side;
    let side = n + 2;
    let channels = params.channels;

    let mut indices: Vec<PageIndex> = pages.keys().copied().collect();
    indices.sort_unstable();
    ctx.progress.start("border", indices.len() as u64);

    let mut previous = 0u64;
    for x in indices {
        let mut page = pages[&x].clone();

        stitch_edge(&mut page, &pages, side, channels, x, algebra::north(x), Side::North);
        stitch_edge(&mut page, &pages, side, channels, x, algebra::south(x), Side::South);
        stitch_edge(&mut page, &pages, side, channels, x, algebra::west(x), Side::West);
        stitch_edge(&mut page, &pages, side, channels, x, algebra::east(x), Side::East);

        stitch_corner(&mut page, &pages, side, channels, x, algebra::northwest(x), Corner::NorthWest);
        stitch_corner(&mut page, &pages, side, channels, x, algebra::northeast(x), Corner::NorthEast);
        stitch_corner(&mut page, &pages, side, channels, x, algebra::southwest(x), Corner::SouthWest);
        stitch_corner(&mut page, &pages, side, channels, x, algebra::southeast(x), Corner::SouthEast);

        previous = output.append(previous, x, &page)?;
        ctx.progress.step(1);
    }

    ctx.progress.finish();
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Side {
    North,
    South,
    West,
    East,
}

#[derive(Debug, Clone, Copy)]
enum Corner {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

/// The `(translate_i, translate_j)` pair for crossing from `from`'s face to
/// `to`'s face: applied together to a same-face-convention `(row, col)`
/// coordinate, they give the actual `(row, col)` to read in `to`'s buffer.
/// Same-face pairs translate as the identity on both axes; some face pairs
/// transpose row and col rather than just flipping one of them, so both
/// functions must be looked up and applied — using only one to permute a
/// single axis silently drops that transposition.
fn seam(from: PageIndex, to: PageIndex) -> (SeamFn, SeamFn) {
    let from_face = algebra::root(from).0 as usize;
    let to_face = algebra::root(to).0 as usize;
    if from_face == to_face {
        return (|i, _, _| i, |_, j, _| j);
    }
    (
        SEAM_I[from_face][to_face].expect("bordering faces must share a seam"),
        SEAM_J[from_face][to_face].expect("bordering faces must share a seam"),
    )
}

fn stitch_edge(
    page: &mut [f32],
    pages: &HashMap<PageIndex, Vec<f32>>,
    side: usize,
    channels: usize,
    x: PageIndex,
    neighbor: PageIndex,
    side_kind: Side,
) {
    let Some(neighbor_page) = pages.get(&neighbor) else { return };
    let n = side - 2;
    let (seam_i, seam_j) = seam(x, neighbor);
    let o = side as i64;

    for k in 0..n {
        let own = (k + 1) as i64;
        let (i_arg, j_arg) = match side_kind {
            Side::North => (side as i64 - 2, own),
            Side::South => (1, own),
            Side::West => (own, side as i64 - 2),
            Side::East => (own, 1),
        };
        let src_row = seam_i(i_arg, j_arg, o) as usize;
        let src_col = seam_j(i_arg, j_arg, o) as usize;

        for ch in 0..channels {
            let value = pixel(neighbor_page, side, channels, src_row, src_col, ch);
            match side_kind {
                Side::North => set_pixel(page, side, channels, 0, k + 1, ch, value),
                Side::South => set_pixel(page, side, channels, side - 1, k + 1, ch, value),
                Side::West => set_pixel(page, side, channels, k + 1, 0, ch, value),
                Side::East => set_pixel(page, side, channels, k + 1, side - 1, ch, value),
            }
        }
    }
}

fn stitch_corner(
    page: &mut [f32],
    pages: &HashMap<PageIndex, Vec<f32>>,
    side: usize,
    channels: usize,
    x: PageIndex,
    neighbor: PageIndex,
    corner: Corner,
) {
    let Some(neighbor_page) = pages.get(&neighbor) else { return };
    let (seam_i, seam_j) = seam(x, neighbor);
    let o = side as i64;

    let (i_arg, j_arg) = match corner {
        Corner::NorthWest => (o - 2, o - 2),
        Corner::NorthEast => (o - 2, 1),
        Corner::SouthWest => (1, o - 2),
        Corner::SouthEast => (1, 1),
    };
    let src_row = seam_i(i_arg, j_arg, o) as usize;
    let src_col = seam_j(i_arg, j_arg, o) as usize;

    let (dst_row, dst_col) = match corner {
        Corner::NorthWest => (0, 0),
        Corner::NorthEast => (0, side - 1),
        Corner::SouthWest => (side - 1, 0),
        Corner::SouthEast => (side - 1, side - 1),
    };

    for ch in 0..channels {
        let value = pixel(neighbor_page, side, channels, src_row, src_col, ch);
        set_pixel(page, side, channels, dst_row, dst_col, ch, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SampleKind;
    use crate::progress::NullProgress;
    use crate::store::Params;
    use tempfile::NamedTempFile;

    /// Face 2's north neighbor is face 5, whose seam pair is `(flip_i,
    /// flip_j)`: the row read from the neighbor is fixed at 1 (not at
    /// `side - 2`, what a single-axis permutation applied only to the
    /// varying column would produce), and the column is flipped. Gives
    /// face 5's root page a distinguishable value per column of body row 0
    /// and checks face 2's stitched north halo reads that row, reversed.
    #[test]
    fn north_halo_across_a_flipping_seam_reads_the_correct_row_and_column() {
        let in_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let out_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let params = Params { side: 4, channels: 1, kind: SampleKind::U8 };
        let side = params.side + 2;

        let mut face5 = vec![0f32; side * side];
        for c in 0..4 {
            face5[1 * side + (c + 1)] = 0.1 * (c as f32 + 1.0);
        }
        let face2 = vec![0f32; side * side];

        let mut input = Store::create(&in_path, params).unwrap();
        let previous = input.append(0, 2, &face2).unwrap();
        input.append(previous, 5, &face5).unwrap();

        let mut output = Store::create(&out_path, params).unwrap();
        let progress = NullProgress;
        let ctx = Context::new(&progress, 0);
        border(&mut input, &mut output, &ctx).unwrap();

        output.scan_catalog().unwrap();
        let pos = output.catalog.search(2).unwrap();
        let page = output.read_page(output.catalog.offset(pos)).unwrap();

        let expected = [0.4f32, 0.3, 0.2, 0.1];
        for (k, &e) in expected.iter().enumerate() {
            let got = pixel(&page, side, 1, 0, k + 1, 0);
            assert!((got - e).abs() < 1.0 / 255.0 + 1e-3, "col {k}: expected {e}, got {got}");
        }

        std::fs::remove_file(&in_path).ok();
        std::fs::remove_file(&out_path).ok();
    }

    #[test]
    fn constant_faces_stitch_to_the_same_constant() {
        let in_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let out_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let params = Params { side: 4, channels: 1, kind: SampleKind::U8 };

        let mut input = Store::create(&in_path, params).unwrap();
        let samples = vec![0.5f32; (params.side + 2) * (params.side + 2)];
        let mut previous = 0u64;
        for face in 0..6 {
            previous = input.append(previous, face, &samples).unwrap();
        }

        let mut output = Store::create(&out_path, params).unwrap();
        let progress = NullProgress;
        let ctx = Context::new(&progress, 0);
        border(&mut input, &mut output, &ctx).unwrap();

        output.scan_catalog().unwrap();
        let page = output.read_page(output.catalog.offset(0)).unwrap();
        assert!(page.iter().all(|&v| (v - 0.5).abs() < 1e-6));

        std::fs::remove_file(&in_path).ok();
        std::fs::remove_file(&out_path).ok();
    }
}
