//! The inverse of `convert`: flatten a store back into a rectangular raster
//! by sampling it once per output pixel. Only the default (equirectangular
//! panorama) projection of the projection table is implemented; the other
//! variants there are about mapping a *source* image's pixel space onto a
//! sampled direction during `convert`, and have no bearing on reading a
//! store back out, so `rectify` doesn't need them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::io::Data;
use crate::passes::sample::sample;
use crate::progress::{Context, Progress};
use crate::store::Store;
use crate::vector::Vector3;

/// Sample `store` onto a `width x height` equirectangular raster and write
/// it as a flat little-endian binary: a `(width, height, channels)` `u32`
/// header followed by `width * height * channels` `f32` samples in
/// row-major order.
pub fn rectify(
    store: &mut Store,
    out_path: impl AsRef<Path>,
    width: usize,
    height: usize,
    max_depth: Option<i32>,
    ctx: &Context<'_, impl Progress>,
) -> Result<()> {
    store.scan_catalog()?;
    let channels = store.params().channels;
    let mut raster = vec![0f32; width * height * channels];
    ctx.progress.start("rectify", height as u64);

    for row in 0..height {
        let lat = std::f64::consts::FRAC_PI_2 - row as f64 * std::f64::consts::PI / (height - 1).max(1) as f64;
        for col in 0..width {
            let lon = std::f64::consts::TAU * (1.0 - col as f64 / width as f64);
            let direction = direction_from(lat, lon);
            let value = sample(store, direction, max_depth)?;
            let base = (row * width + col) * channels;
            raster[base..base + channels].copy_from_slice(&value);
        }
        ctx.progress.step(1);
    }
    ctx.progress.finish();

    write_raw(out_path, width, height, channels, &raster)
}

fn direction_from(lat: f64, lon: f64) -> Vector3 {
    Vector3::new(lat.cos() * lon.cos(), lat.sin(), lat.cos() * lon.sin())
}

fn write_raw(
    out_path: impl AsRef<Path>,
    width: usize,
    height: usize,
    channels: usize,
    raster: &[f32],
) -> Result<()> {
    let file = File::create(out_path)?;
    let mut writer = BufWriter::new(file);
    (width as u32).write(&mut writer)?;
    (height as u32).write(&mut writer)?;
    (channels as u32).write(&mut writer)?;
    for &value in raster {
        value.to_bits().write(&mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SampleKind;
    use crate::progress::NullProgress;
    use crate::store::Params;
    use tempfile::NamedTempFile;

    #[test]
    fn rectifying_a_constant_store_fills_every_pixel() {
        let store_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let out_path = NamedTempFile::new().unwrap().into_temp_path().keep().unwrap();
        let params = Params { side: 4, channels: 1, kind: SampleKind::U8 };

        let mut store = Store::create(&store_path, params).unwrap();
        let samples = vec![0.5f32; (params.side + 2) * (params.side + 2)];
        let mut previous = 0u64;
        for face in 0..6 {
            previous = store.append(previous, face, &samples).unwrap();
        }
        store.scan_catalog().unwrap();

        let progress = NullProgress;
        let ctx = Context::new(&progress, 0);
        rectify(&mut store, &out_path, 8, 4, None, &ctx).unwrap();

        let bytes = std::fs::read(&out_path).unwrap();
        assert_eq!(bytes.len(), 12 + 8 * 4 * 4);

        std::fs::remove_file(&store_path).ok();
        std::fs::remove_file(&out_path).ok();
    }
}
