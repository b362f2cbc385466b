//! Deriving a surface-normal map from a single-channel elevation store:
//! each pixel's normal is the average of the four triangle normals formed
//! with its four halo-adjacent neighbors, displaced off the unit sphere by
//! the elevation sample. Run `border` first so those neighbors are real
//! stitched data, not zeroed halo.

use crate::algebra::{self, Face, PageIndex};
use crate::error::Result;
use crate::passes::{pixel, read_all_pages, set_pixel};
use crate::progress::{Context, Progress};
use crate::store::{Params, Store};
use crate::vector::Vector3;

/// Write a three-channel (x, y, z) normal map to `output`, one page per
/// page of the single-channel elevation `input`. `output` must already be
/// created with `channels == 3`; each component is encoded from `[-1, 1]`
/// to `[0, 1]` before being written, so an unsigned sample kind round-trips
/// it exactly.
pub fn normal(input: &mut Store, output: &mut Store, ctx: &Context<'_, impl Progress>) -> Result<()> {
    let pages = read_all_pages(input)?;
    let params = input.params();
    debug_assert_eq!(params.channels, 1, "normal expects a single elevation channel");

    let mut indices: Vec<PageIndex> = pages.keys().copied().collect();
    indices.sort_unstable();
    ctx.progress.start("normal", indices.len() as u64);

    let mut previous = 0u64;
    for x in indices {
        let elevation = &pages[&x];
        let normals = page_normals(elevation, params, x);
        previous = output.append(previous, x, &normals)?;
        ctx.progress.step(1);
    }

    ctx.progress.finish();
    Ok(())
}

fn page_position(face: Face, level: i64, row: i64, col: i64, n: i64, i: i64, j: i64, radius: f64) -> Vector3 {
    let scale = 1.0 / (1i64 << level) as f64;
    let y = (row as f64 + (i as f64 - 0.5) / n as f64) * scale;
    let x = (col as f64 + (j as f64 - 0.5) / n as f64) * scale;
    algebra::vector(face, y, x).scale(radius)
}

/// Maps a `[-1, 1]` normal component to `[0, 1]` for storage.
fn encode_component(component: f64) -> f32 {
    ((component + 1.0) / 2.0) as f32
}

fn safe_normalized(v: Vector3) -> Vector3 {
    if v.length() > 1e-12 {
        v.normalized()
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    }
}

fn page_normals(elevation: &[f32], params: Params, x: PageIndex) -> Vec<f32> {
    let n = params.side as i64;
    let side = (n + 2) as usize;
    let face = algebra::root(x);
    let level = algebra::level(x);
    let row = algebra::row(x);
    let col = algebra::col(x);

    let mut out = vec![0f32; side * side * 3];
    let radius_at = |_i: i64, _j: i64, e: f32| 1.0 + f64::from(e);

    for i in 1..=n {
        for j in 1..=n {
            let (iu, ju) = (i as usize, j as usize);
            let e = pixel(elevation, side, 1, iu, ju, 0);
            let center = page_position(face, level, row, col, n, i, j, radius_at(i, j, e));

            let north_e = pixel(elevation, side, 1, (i - 1) as usize, ju, 0);
            let south_e = pixel(elevation, side, 1, (i + 1) as usize, ju, 0);
            let west_e = pixel(elevation, side, 1, iu, (j - 1) as usize, 0);
            let east_e = pixel(elevation, side, 1, iu, (j + 1) as usize, 0);

            let north = page_position(face, level, row, col, n, i - 1, j, radius_at(i - 1, j, north_e));
            let south = page_position(face, level, row, col, n, i + 1, j, radius_at(i + 1, j, south_e));
            let west = page_position(face, level, row, col, n, i, j - 1, radius_at(i, j - 1, west_e));
            let east = page_position(face, level, row, col, n, i, j + 1, radius_at(i, j + 1, east_e));

            let to_n = north.sub(center);
            let to_s = south.sub(center);
            let to_e = east.sub(center);
            let to_w = west.sub(center);

            let sum = to_n
                .cross(to_e)
                .add(to_e.cross(to_s))
                .add(to_s.cross(to_w))
                .add(to_w.cross(to_n));
            let normal = safe_normalized(sum);

            set_pixel(&mut out, side, 3, iu, ju, 0, encode_component(normal.x));
            set_pixel(&mut out, side, 3, iu, ju, 1, encode_component(normal.y));
            set_pixel(&mut out, side, 3, iu, ju, 2, encode_component(normal.z));
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
    fn flat_elevation_points_normal_outward() {
        let in_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let out_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();

        let elevation_params = Params { side: 4, channels: 1, kind: SampleKind::U8 };
        let mut input = Store::create(&in_path, elevation_params).unwrap();
        let samples = vec![0.0f32; (elevation_params.side + 2) * (elevation_params.side + 2)];
        input.append(0, 4, &samples).unwrap();

        let normal_params = Params { side: 4, channels: 3, kind: SampleKind::U8 };
        let mut output = Store::create(&out_path, normal_params).unwrap();
        let progress = NullProgress;
        let ctx = Context::new(&progress, 0);
        normal(&mut input, &mut output, &ctx).unwrap();

        output.scan_catalog().unwrap();
        let page = output.read_page(output.catalog.offset(0)).unwrap();
        let mid = (normal_params.side / 2 + 1) * (normal_params.side + 2) + (normal_params.side / 2 + 1);
        let decode = |encoded: f32| f64::from(encoded) * 2.0 - 1.0;
        let (x, y, z) = (decode(page[mid * 3]), decode(page[mid * 3 + 1]), decode(page[mid * 3 + 2]));
        let len = (x * x + y * y + z * z).sqrt();
        assert!((len - 1.0).abs() < 0.2);

        std::fs::remove_file(&in_path).ok();
        std::fs::remove_file(&out_path).ok();
    }
}
