//! A pre-decoded raster image addressed through one of six projections,
//! implementing [`ImageSource`]. Concrete image codecs (PDS, PNG, JPEG,
//! panorama formats) are an external collaborator's job — this type takes
//! a flat `f32` pixel buffer however the caller got it, and handles the
//! rest: the `(v, lon, lat) → (line, sample)` projection math, a bilinear
//! filter with partial-hit fallback at the image's edges, and the
//! latitude/longitude feathering used to blend adjacent planetary tiles.

use crate::sampler::ImageSource;
use crate::vector::Vector3;

/// Which pixel-space mapping a [`RasterImage`] uses, and the parameters
/// that mapping needs. Variant names and fields match the source-image
/// metadata each formula is keyed by.
#[derive(Debug, Clone, Copy)]
pub enum Projection {
    /// The inside-viewing mapping applied to panoramas, which carry no
    /// projection metadata of their own.
    Panorama,
    Equirectangular { radius: f64, lon_p: f64, lat_p: f64, scale: f64, l0: f64, s0: f64 },
    Orthographic { radius: f64, lon_p: f64, scale: f64, l0: f64, s0: f64 },
    /// `lat_p`'s sign selects the north or south branch of the projection.
    PolarStereographic { radius: f64, lon_p: f64, lat_p: f64, scale: f64, l0: f64, s0: f64 },
    SimpleCylindrical { lon_p: f64, lat_p: f64, res: f64, l0: f64, s0: f64 },
    /// `face` selects which of the cube's six faces this image covers.
    SphericalCube { face: u8 },
}

/// Optional latitude/longitude feathering: a source blends to zero weight
/// outside `[center - span, center + span]`-ish bounds via a smoothstep
/// bell, so adjacent planetary tiles can overlap without a hard seam.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blend {
    pub center: f64,
    pub lo: f64,
    pub hi: f64,
}

impl Blend {
    fn is_active(self) -> bool {
        self.center != 0.0 || self.lo != 0.0 || self.hi != 0.0
    }
}

/// A decoded image, addressed by world direction through a [`Projection`].
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub pixels: Vec<f32>,
    pub projection: Projection,
    pub lat_blend: Blend,
    pub lon_blend: Blend,
}

impl RasterImage {
    #[must_use]
    pub fn new(width: usize, height: usize, channels: usize, pixels: Vec<f32>, projection: Projection) -> Self {
        debug_assert_eq!(pixels.len(), width * height * channels);
        Self { width, height, channels, pixels, projection, lat_blend: Blend::default(), lon_blend: Blend::default() }
    }

    fn pixel(&self, i: i64, j: i64) -> Option<&[f32]> {
        if i < 0 || j < 0 || i as usize >= self.height || j as usize >= self.width {
            return None;
        }
        let at = (i as usize * self.width + j as usize) * self.channels;
        Some(&self.pixels[at..at + self.channels])
    }

    /// Project world direction `direction` into this image's `(line,
    /// sample)` pixel space.
    fn project(&self, direction: Vector3, lon: f64, lat: f64) -> (f64, f64) {
        match self.projection {
            Projection::Panorama => {
                let h = self.height as f64;
                let w = self.width as f64;
                ((h - 1.0) * (std::f64::consts::FRAC_PI_2 - lat) / std::f64::consts::PI, w * (1.0 - lon / (2.0 * std::f64::consts::PI)))
            }
            Projection::Equirectangular { radius, lon_p, lat_p, scale, l0, s0 } => {
                let x = radius * (lon - lon_p) * lat_p.cos();
                let y = radius * lat;
                (l0 - y / scale, s0 + x / scale)
            }
            Projection::Orthographic { radius, lon_p, scale, l0, s0 } => {
                let x = radius * lat.cos() * (lon - lon_p).sin();
                let y = radius * lat.sin();
                (l0 - y / scale, s0 + x / scale)
            }
            Projection::PolarStereographic { radius, lon_p, lat_p, scale, l0, s0 } => {
                let (x, y) = if lat_p > 0.0 {
                    let r = 2.0 * radius * (std::f64::consts::FRAC_PI_4 - lat / 2.0).tan();
                    (r * (lon - lon_p).sin(), -r * (lon - lon_p).cos())
                } else {
                    let r = 2.0 * radius * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan();
                    (r * (lon - lon_p).sin(), r * (lon - lon_p).cos())
                };
                (l0 - y / scale, s0 + x / scale)
            }
            Projection::SimpleCylindrical { lon_p, lat_p, res, l0, s0 } => {
                (l0 - res * (todeg(lat) - todeg(lat_p)), s0 + res * (todeg(lon) - todeg(lon_p)))
            }
            Projection::SphericalCube { face } => {
                let (x, y, z) = match face {
                    0 => (-direction.z, direction.y, direction.x),
                    1 => (direction.z, direction.y, -direction.x),
                    2 => (direction.x, -direction.z, direction.y),
                    3 => (direction.x, direction.z, -direction.y),
                    4 => (direction.x, direction.y, direction.z),
                    _ => (-direction.x, direction.y, -direction.z),
                };
                let a = -x.atan2(z);
                let b = -y.atan2(z);
                let h = self.height as f64;
                let w = self.width as f64;
                (
                    (h - 2.0) * (b + std::f64::consts::FRAC_PI_4) / std::f64::consts::FRAC_PI_2 + 1.0,
                    (w - 2.0) * (a + std::f64::consts::FRAC_PI_4) / std::f64::consts::FRAC_PI_2 + 1.0,
                )
            }
        }
    }

    /// Bilinear filter with partial-hit fallback: if all four surrounding
    /// pixels exist, interpolate; if exactly one does (checked in
    /// `(floor, floor)`, `(floor, ceil)`, `(ceil, floor)`, `(ceil, ceil)`
    /// order), use it directly; if none do, miss.
    fn bilinear(&self, line: f64, sample: f64, out: &mut [f32]) -> bool {
        let ia = line.floor() as i64;
        let ib = line.ceil() as i64;
        let ja = sample.floor() as i64;
        let jb = sample.ceil() as i64;

        let aa = self.pixel(ia, ja);
        let ab = self.pixel(ia, jb);
        let ba = self.pixel(ib, ja);
        let bb = self.pixel(ib, jb);

        match (aa, ab, ba, bb) {
            (Some(aa), Some(ab), Some(ba), Some(bb)) => {
                let u = (line - line.floor()) as f32;
                let v = (sample - sample.floor()) as f32;
                for ch in 0..self.channels {
                    let top = lerp1(aa[ch], ab[ch], v);
                    let bottom = lerp1(ba[ch], bb[ch], v);
                    out[ch] = lerp1(top, bottom, u);
                }
                true
            }
            (Some(aa), _, _, _) => {
                out.copy_from_slice(aa);
                true
            }
            (_, Some(ab), _, _) => {
                out.copy_from_slice(ab);
                true
            }
            (_, _, Some(ba), _) => {
                out.copy_from_slice(ba);
                true
            }
            (_, _, _, Some(bb)) => {
                out.copy_from_slice(bb);
                true
            }
            _ => false,
        }
    }
}

impl ImageSource for RasterImage {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample(&self, direction: Vector3, out: &mut [f32]) -> f32 {
        let lon = tolon(direction.x.atan2(direction.z));
        let lat = direction.y.asin();

        let klat = if self.lat_blend.is_active() {
            blend(self.lat_blend.lo, self.lat_blend.hi, angle(lat, self.lat_blend.center))
        } else {
            1.0
        };
        let klon = if self.lon_blend.is_active() {
            blend(self.lon_blend.lo, self.lon_blend.hi, angle(lon, self.lon_blend.center))
        } else {
            1.0
        };

        let k = klat * klon;
        if k <= 0.0 {
            return 0.0;
        }

        let (line, sample) = self.project(direction, lon, lat);
        if self.bilinear(line, sample, out) {
            k as f32
        } else {
            0.0
        }
    }

    fn locate(&self, direction: Vector3) -> bool {
        let lon = tolon(direction.x.atan2(direction.z));
        let lat = direction.y.asin();
        let (line, sample) = self.project(direction, lon, lat);
        (0.0..self.height as f64).contains(&line) && (0.0..self.width as f64).contains(&sample)
    }
}

fn lerp1(a: f32, b: f32, t: f32) -> f32 {
    b * t + a * (1.0 - t)
}

fn todeg(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

fn tolon(a: f64) -> f64 {
    let b = a.rem_euclid(2.0 * std::f64::consts::PI);
    if b < 0.0 {
        b + 2.0 * std::f64::consts::PI
    } else {
        b
    }
}

/// Smoothstep-like cubic bell between thresholds `a` and `b`, evaluated at
/// `k`: `1.0` on the near side of `a`, `0.0` past `b`, `3t² − 2t³` between.
fn blend(a: f64, b: f64, k: f64) -> f64 {
    if a < b {
        if k < a {
            return 1.0;
        }
        if k > b {
            return 0.0;
        }
        let t = 1.0 - (k - a) / (b - a);
        3.0 * t * t - 2.0 * t * t * t
    } else {
        if k > a {
            return 1.0;
        }
        if k < b {
            return 0.0;
        }
        let t = 1.0 - (a - k) / (a - b);
        3.0 * t * t - 2.0 * t * t * t
    }
}

/// Wraparound-aware angular distance between `a` and `b`.
fn angle(a: f64, b: f64) -> f64 {
    let d = (a - b).abs();
    if d < std::f64::consts::PI {
        d
    } else {
        2.0 * std::f64::consts::PI - d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: usize, height: usize) -> RasterImage {
        let mut pixels = vec![0f32; width * height];
        for i in 0..height {
            for j in 0..width {
                pixels[i * width + j] = ((i + j) % 2) as f32;
            }
        }
        RasterImage::new(width, height, 1, pixels, Projection::Panorama)
    }

    #[test]
    fn panorama_samples_interior_directions() {
        let image = checker(8, 4);
        let mut out = [0f32; 1];
        let weight = image.sample(Vector3::new(0.0, 0.0, 1.0), &mut out);
        assert!(weight > 0.0);
    }

    #[test]
    fn locate_matches_whether_the_projected_point_is_in_bounds() {
        let image = checker(8, 4);
        // The projection is onto the whole sphere for a panorama, so every
        // direction should locate.
        assert!(image.locate(Vector3::new(1.0, 0.0, 0.0).normalized()));
        assert!(image.locate(Vector3::new(0.0, 1.0, 0.0).normalized()));
    }

    #[test]
    fn spherical_cube_face_rotation_places_its_own_face_center_mid_image() {
        let width = 66;
        let height = 66;
        let mut pixels = vec![0.5f32; width * height];
        pixels[33 * width + 33] = 1.0;
        let image = RasterImage::new(width, height, 1, pixels, Projection::SphericalCube { face: 4 });

        let mut out = [0f32; 1];
        let weight = image.sample(Vector3::new(0.0, 0.0, 1.0), &mut out);
        assert!(weight > 0.0);
    }

    #[test]
    fn lat_blend_fades_weight_to_zero_past_the_far_threshold() {
        let mut image = checker(8, 4);
        image.lat_blend = Blend { center: 0.0, lo: 0.1, hi: 0.2 };
        let mut out = [0f32; 1];
        // A direction whose latitude sits well past `hi` should miss entirely.
        let weight = image.sample(Vector3::new(0.1, 0.99, 0.1).normalized(), &mut out);
        assert_eq!(weight, 0.0);
    }

    #[test]
    fn blend_is_one_inside_and_zero_outside_its_thresholds() {
        assert_eq!(blend(0.1, 0.2, 0.0), 1.0);
        assert_eq!(blend(0.1, 0.2, 0.3), 0.0);
        let mid = blend(0.1, 0.2, 0.15);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn angle_wraps_around_the_circle() {
        assert!((angle(0.1, 2.0 * std::f64::consts::PI - 0.1) - 0.2).abs() < 1e-9);
    }
}
