//! Point queries: given a world-space direction, find the deepest stored
//! page whose footprint contains it and bilinearly interpolate the four
//! nearest pixels.

use crate::algebra::{self, Face, PageIndex};
use crate::error::Result;
use crate::passes::pixel;
use crate::store::Store;
use crate::vector::Vector3;

/// Sample `store` in world direction `direction`, descending from the
/// appropriate root face toward the deepest page actually present in the
/// catalog (capped at `max_depth`, if given), and bilinearly interpolating
/// its four nearest pixels. `store.scan_catalog` must have already been
/// called.
pub fn sample(store: &mut Store, direction: Vector3, max_depth: Option<i32>) -> Result<Vec<f32>> {
    let face = select_face(direction);
    let (y, x) = locate(face, direction);

    let mut x_index: PageIndex = i64::from(face.0);
    let mut level = 0i64;
    loop {
        if max_depth.is_some_and(|max| level >= i64::from(max)) {
            break;
        }
        let next_level = level + 1;
        let row = (y * (1i64 << next_level) as f64) as i64;
        let col = (x * (1i64 << next_level) as f64) as i64;
        let quadrant = row_col_to_quadrant(row, col);
        let child = algebra::child(x_index, quadrant);
        if store.catalog.search(child).is_none() {
            break;
        }
        x_index = child;
        level = next_level;
    }

    let offset = store.catalog.search(x_index).expect("root face page must always be present");
    let page = store.read_page(store.catalog.offset(offset))?;
    Ok(bilinear(&page, store.params().side, store.params().channels, x_index, y, x))
}

fn row_col_to_quadrant(row: i64, col: i64) -> i64 {
    2 * (row & 1) + (col & 1)
}

fn select_face(direction: Vector3) -> Face {
    let (ax, ay, az) = (direction.x.abs(), direction.y.abs(), direction.z.abs());
    if ax >= ay && ax >= az {
        Face::new(if direction.x > 0.0 { 0 } else { 1 })
    } else if ay >= ax && ay >= az {
        Face::new(if direction.y > 0.0 { 2 } else { 3 })
    } else {
        Face::new(if direction.z > 0.0 { 4 } else { 5 })
    }
}

/// Invert the forward `algebra::vector` projection via Gauss-Newton: the
/// forward map has no closed-form inverse once the per-face basis swizzle
/// and spherical normalization are composed, so this refines an initial
/// guess at the face center using the projection's own local Jacobian.
fn locate(face: Face, direction: Vector3) -> (f64, f64) {
    let mut y = 0.5;
    let mut x = 0.5;
    let eps = 1e-4;

    for _ in 0..12 {
        let f0 = algebra::vector(face, y, x);
        let fy = algebra::vector(face, (y + eps).min(1.0), x);
        let fx = algebra::vector(face, y, (x + eps).min(1.0));
        let dy = fy.sub(f0).scale(1.0 / eps);
        let dx = fx.sub(f0).scale(1.0 / eps);
        let residual = direction.sub(f0);

        let a11 = dy.dot(dy);
        let a12 = dy.dot(dx);
        let a22 = dx.dot(dx);
        let b1 = dy.dot(residual);
        let b2 = dx.dot(residual);
        let det = a11 * a22 - a12 * a12;
        if det.abs() < 1e-12 {
            break;
        }

        let step_y = (b1 * a22 - b2 * a12) / det;
        let step_x = (a11 * b2 - a12 * b1) / det;
        y = (y + step_y).clamp(0.0, 1.0);
        x = (x + step_x).clamp(0.0, 1.0);
    }
    (y, x)
}

fn bilinear(page: &[f32], n: usize, channels: usize, x_index: PageIndex, y: f64, x: f64) -> Vec<f32> {
    let side = n + 2;
    let level = algebra::level(x_index);
    let row = algebra::row(x_index);
    let col = algebra::col(x_index);
    let scale = (1i64 << level) as f64;

    let local_y = (y * scale - row as f64) * n as f64 - 0.5;
    let local_x = (x * scale - col as f64) * n as f64 - 0.5;

    let i0 = local_y.floor().clamp(0.0, (n - 1) as f64) as usize;
    let j0 = local_x.floor().clamp(0.0, (n - 1) as f64) as usize;
    let fy = (local_y - i0 as f64).clamp(0.0, 1.0) as f32;
    let fx = (local_x - j0 as f64).clamp(0.0, 1.0) as f32;

    let mut out = vec![0f32; channels];
    for ch in 0..channels {
        let v00 = pixel(page, side, channels, i0 + 1, j0 + 1, ch);
        let v01 = pixel(page, side, channels, i0 + 1, j0 + 2, ch);
        let v10 = pixel(page, side, channels, i0 + 2, j0 + 1, ch);
        let v11 = pixel(page, side, channels, i0 + 2, j0 + 2, ch);
        let top = v00 * (1.0 - fx) + v01 * fx;
        let bottom = v10 * (1.0 - fx) + v11 * fx;
        out[ch] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SampleKind;
    use crate::store::Params;
    use tempfile::NamedTempFile;

    #[test]
    fn sampling_a_constant_store_returns_the_constant() {
        let path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let params = Params { side: 4, channels: 1, kind: SampleKind::U8 };
        let mut store = Store::create(&path, params).unwrap();

        let samples = vec![0.75f32; (params.side + 2) * (params.side + 2)];
        let mut previous = 0u64;
        for face in 0..6 {
            previous = store.append(previous, face, &samples).unwrap();
        }
        store.scan_catalog().unwrap();

        let value = sample(&mut store, Vector3::new(1.0, 0.2, 0.1).normalized(), None).unwrap();
        assert!((value[0] - 0.75).abs() < 1.0 / 255.0 + 1e-3);

        std::fs::remove_file(&path).ok();
    }
}
