//! Page index algebra for the six-sided cube-mapped-sphere quadtree.
//!
//! A page index is a single non-negative integer that names one quadtree
//! node on one of the six cube faces. Indices are assigned breadth-first:
//! all of level 0 (the six faces themselves), then all of level 1, and so
//! on, so that `count(level)` gives the first index of `level` and ranges
//! never overlap. `parent`/`child` and the four direct neighbor functions
//! are pure index arithmetic; diagonal neighbors and the corner vectors
//! need to know which face a page sits on, since a page's northwest
//! neighbor may fall across a seam onto a different face entirely.

use crate::vector::Vector3;

pub type PageIndex = i64;

/// One of the six faces of the circumscribed cube, numbered the way the
/// original projection tables expect: 0 = +X, 1 = -X, 2 = +Y, 3 = -Y,
/// 4 = +Z, 5 = -Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Face(pub u8);

impl Face {
    pub const COUNT: u8 = 6;

    pub const fn new(n: i64) -> Self {
        Face(n as u8)
    }
}

/// First page index of the given level. `count(0) == 0`; each level adds
/// six roots' worth of grandchildren: `count(l+1) = 4*count(l) + 6`.
#[must_use]
pub const fn count(level: i64) -> PageIndex {
    if level <= 0 {
        0
    } else {
        4 * count(level - 1) + 6
    }
}

/// The subdivision level of page `x`: how many levels down from the six
/// root faces.
#[must_use]
pub fn level(x: PageIndex) -> i64 {
    let mut l = 0;
    while x >= count(l + 1) {
        l += 1;
    }
    l
}

/// The root face a page descends from.
#[must_use]
pub fn root(x: PageIndex) -> Face {
    let l = level(x);
    let p = x - count(l);
    Face::new(p / 4i64.pow(l as u32))
}

/// Decompose `x`'s position within its root face into (row, col), via
/// Z-order (Morton) deinterleaving: bit `k` from the least significant end
/// selects the quadrant at depth `level - k`, with `2*row_bit + col_bit`.
fn row_col(x: PageIndex) -> (i64, i64) {
    let l = level(x);
    let p = x - count(l);
    let mut local = p % 4i64.pow(l as u32);

    let mut row = 0i64;
    let mut col = 0i64;
    for bit in 0..l {
        let quadrant = local & 3;
        row |= (quadrant >> 1) << bit;
        col |= (quadrant & 1) << bit;
        local >>= 2;
    }
    (row, col)
}

#[must_use]
pub fn row(x: PageIndex) -> i64 {
    row_col(x).0
}

#[must_use]
pub fn col(x: PageIndex) -> i64 {
    row_col(x).1
}

/// Build the page index of face `f`, level `l`, at (`r`, `c`) within the
/// `2^l`-by-`2^l` grid of that level.
#[must_use]
pub fn page_index(f: Face, l: i64, r: i64, c: i64) -> PageIndex {
    let mut morton = 0i64;
    for bit in (0..l).rev() {
        let row_bit = (r >> bit) & 1;
        let col_bit = (c >> bit) & 1;
        morton = (morton << 2) | (row_bit << 1) | col_bit;
    }
    count(l) + i64::from(f.0) * 4i64.pow(l as u32) + morton
}

/// The parent of page `x`. Undefined (and debug-asserted against) for a
/// root face, which has no parent.
#[must_use]
pub fn parent(x: PageIndex) -> PageIndex {
    let l = level(x);
    debug_assert!(l > 0, "root faces have no parent");
    count(l - 1) + (x - count(l)) / 4
}

/// The `k`'th child (0..=3) of page `x`, using the same quadrant order as
/// `row_col`: 0 = northwest, 1 = northeast, 2 = southwest, 3 = southeast.
#[must_use]
pub fn child(x: PageIndex, k: i64) -> PageIndex {
    debug_assert!((0..4).contains(&k));
    let l = level(x);
    count(l + 1) + 4 * (x - count(l)) + k
}

/// The direction to the north of page `i`, tracing across a face seam when
/// the page sits on the top row of its face.
#[must_use]
pub fn north(i: PageIndex) -> PageIndex {
    let l = level(i);
    let f = root(i).0 as i64;
    let r = row(i);
    let c = col(i);
    let m = (1i64 << l) - 1;
    let t = m - c;

    let (f, r, c) = if r > 0 {
        (f, r - 1, c)
    } else {
        match f {
            0 => (2, t, m),
            1 => (2, c, 0),
            2 => (5, 0, t),
            3 => (4, m, c),
            4 => (2, m, c),
            _ => (2, 0, t),
        }
    };
    page_index(Face::new(f), l, r, c)
}

/// The direction to the south of page `i`.
#[must_use]
pub fn south(i: PageIndex) -> PageIndex {
    let l = level(i);
    let f = root(i).0 as i64;
    let r = row(i);
    let c = col(i);
    let m = (1i64 << l) - 1;
    let t = m - c;

    let (f, r, c) = if r < m {
        (f, r + 1, c)
    } else {
        match f {
            0 => (3, c, m),
            1 => (3, t, 0),
            2 => (4, 0, c),
            3 => (5, m, t),
            4 => (3, 0, c),
            _ => (3, m, t),
        }
    };
    page_index(Face::new(f), l, r, c)
}

/// The direction to the west of page `i`.
#[must_use]
pub fn west(i: PageIndex) -> PageIndex {
    let l = level(i);
    let f = root(i).0 as i64;
    let r = row(i);
    let c = col(i);
    let m = (1i64 << l) - 1;
    let t = m - r;

    let (f, r, c) = if c > 0 {
        (f, r, c - 1)
    } else {
        match f {
            0 => (4, r, m),
            1 => (5, r, m),
            2 => (1, 0, r),
            3 => (1, m, t),
            4 => (1, r, m),
            _ => (0, r, m),
        }
    };
    page_index(Face::new(f), l, r, c)
}

/// The direction to the east of page `i`.
#[must_use]
pub fn east(i: PageIndex) -> PageIndex {
    let l = level(i);
    let f = root(i).0 as i64;
    let r = row(i);
    let c = col(i);
    let m = (1i64 << l) - 1;
    let t = m - r;

    let (f, r, c) = if c < m {
        (f, r, c + 1)
    } else {
        match f {
            0 => (5, r, 0),
            1 => (4, r, 0),
            2 => (0, 0, t),
            3 => (0, m, r),
            4 => (0, r, 0),
            _ => (1, r, 0),
        }
    };
    page_index(Face::new(f), l, r, c)
}

/// The four corner neighbors of page `x`, chosen by composing the direct
/// neighbor in whichever order avoids crossing two different seams: when
/// the intermediate north/south neighbor stays on the same face as `x`,
/// step east/west from it; otherwise the east/west neighbor is the one
/// that stayed on-face, so step north/south from that instead.
#[must_use]
pub fn northwest(x: PageIndex) -> PageIndex {
    let xn = north(x);
    if root(xn) == root(x) {
        west(xn)
    } else {
        north(west(x))
    }
}

#[must_use]
pub fn northeast(x: PageIndex) -> PageIndex {
    let xn = north(x);
    if root(xn) == root(x) {
        east(xn)
    } else {
        north(east(x))
    }
}

#[must_use]
pub fn southwest(x: PageIndex) -> PageIndex {
    let xs = south(x);
    if root(xs) == root(x) {
        west(xs)
    } else {
        south(west(x))
    }
}

#[must_use]
pub fn southeast(x: PageIndex) -> PageIndex {
    let xs = south(x);
    if root(xs) == root(x) {
        east(xs)
    } else {
        south(east(x))
    }
}

/// One of the four border-sharing or four corner-sharing translation
/// functions used to map a pixel coordinate on a neighboring face onto its
/// counterpart on this one: identity, flip, or swap-and-flip.
pub type SeamFn = fn(i: i64, j: i64, n: i64) -> i64;

fn same_i(i: i64, _j: i64, _n: i64) -> i64 {
    i
}
fn flip_i(i: i64, _j: i64, n: i64) -> i64 {
    n - 1 - i
}
fn same_j(_i: i64, j: i64, _n: i64) -> i64 {
    j
}
fn flip_j(_i: i64, j: i64, n: i64) -> i64 {
    n - 1 - j
}

/// `SEAM_I[from][to]` and `SEAM_J[from][to]` give the row/column a pixel at
/// `(i, j)` on face `to`'s shared edge maps to on face `from`'s edge, or
/// `None` when the two faces don't share that particular seam (diagonal
/// corners only touch for some face pairs).
pub static SEAM_I: [[Option<SeamFn>; 6]; 6] = [
    [Some(same_i), None, Some(flip_j), Some(same_j), Some(same_i), Some(same_i)],
    [None, Some(same_i), Some(same_j), Some(flip_j), Some(same_i), Some(same_i)],
    [Some(same_j), Some(flip_j), Some(same_i), None, Some(same_i), Some(flip_i)],
    [Some(flip_j), Some(same_j), None, Some(same_i), Some(same_i), Some(flip_i)],
    [Some(same_i), Some(same_i), Some(same_i), Some(same_i), Some(same_i), None],
    [Some(same_i), Some(same_i), Some(flip_i), Some(flip_i), None, Some(same_i)],
];

pub static SEAM_J: [[Option<SeamFn>; 6]; 6] = [
    [Some(same_j), None, Some(same_i), Some(flip_i), Some(same_j), Some(same_j)],
    [None, Some(same_j), Some(flip_i), Some(same_i), Some(same_j), Some(same_j)],
    [Some(flip_i), Some(same_i), Some(same_j), None, Some(same_j), Some(flip_j)],
    [Some(same_i), Some(flip_i), None, Some(same_j), Some(same_j), Some(flip_j)],
    [Some(same_j), Some(same_j), Some(same_j), Some(same_j), Some(same_j), None],
    [Some(same_j), Some(same_j), Some(flip_j), Some(flip_j), None, Some(same_j)],
];

/// The unit direction vector toward normalized coordinate (`y`, `x`) in
/// `[0, 1]^2` on root face `f`, via a gnomonic (gnomonic-like tangent
/// plane) projection onto a rounded cube, then rotated into that face's
/// orientation in world space.
#[must_use]
pub fn vector(f: Face, y: f64, x: f64) -> Vector3 {
    use std::f64::consts::PI;

    let s = x * PI / 2.0 - PI / 4.0;
    let t = y * PI / 2.0 - PI / 4.0;

    let u = Vector3::new(s.sin() * t.cos(), -s.cos() * t.sin(), s.cos() * t.cos()).normalized();

    match f.0 {
        0 => Vector3::new(u.z, u.y, -u.x),
        1 => Vector3::new(-u.z, u.y, u.x),
        2 => Vector3::new(u.x, u.z, -u.y),
        3 => Vector3::new(u.x, -u.z, u.y),
        4 => Vector3::new(u.x, u.y, u.z),
        _ => Vector3::new(-u.x, u.y, -u.z),
    }
}

/// The direction toward the center of pixel (`i`, `j`) of an `n`-by-`n`
/// subdivision of face `f`.
#[must_use]
pub fn sample_center(f: Face, i: i64, j: i64, n: i64) -> Vector3 {
    vector(f, (i as f64 + 0.5) / n as f64, (j as f64 + 0.5) / n as f64)
}

/// The four corner directions of pixel (`i`, `j`) of an `n`-by-`n`
/// subdivision of face `f`, in (NW, NE, SW, SE) order.
#[must_use]
pub fn sample_corners(f: Face, i: i64, j: i64, n: i64) -> [Vector3; 4] {
    let nf = n as f64;
    [
        vector(f, i as f64 / nf, j as f64 / nf),
        vector(f, i as f64 / nf, (j + 1) as f64 / nf),
        vector(f, (i + 1) as f64 / nf, j as f64 / nf),
        vector(f, (i + 1) as f64 / nf, (j + 1) as f64 / nf),
    ]
}

/// The four corner directions of page `x` itself (not one of its pixels).
#[must_use]
pub fn corners(x: PageIndex) -> [Vector3; 4] {
    let l = level(x);
    let f = root(x);
    let r = row(x);
    let c = col(x);
    let n = 1i64 << l;
    sample_corners(f, r, c, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_matches_recurrence() {
        assert_eq!(count(0), 0);
        assert_eq!(count(1), 6);
        assert_eq!(count(2), 30);
        assert_eq!(count(3), 126);
    }

    #[test]
    fn roots_are_their_own_level_zero_pages() {
        for f in 0..6 {
            assert_eq!(level(f), 0);
            assert_eq!(root(f), Face::new(f));
        }
    }

    #[test]
    fn child_parent_roundtrip() {
        for x in 0..count(4) {
            for k in 0..4 {
                assert_eq!(parent(child(x, k)), x);
            }
        }
    }

    #[test]
    fn page_index_roundtrips_through_row_col() {
        for l in 0..4 {
            let n = 1i64 << l;
            for f in 0..6 {
                for r in 0..n {
                    for c in 0..n {
                        let x = page_index(Face::new(f), l, r, c);
                        assert_eq!(level(x), l);
                        assert_eq!(root(x), Face::new(f));
                        assert_eq!(row(x), r);
                        assert_eq!(col(x), c);
                    }
                }
            }
        }
    }

    #[test]
    fn children_are_exactly_the_four_grandchildren_by_quadrant() {
        let x = 2; // a level-0 root face
        let kids: Vec<_> = (0..4).map(|k| child(x, k)).collect();
        for k in kids {
            assert_eq!(level(k), 1);
            assert_eq!(root(k), Face::new(2));
        }
    }

    #[test]
    fn north_then_south_is_identity_away_from_poles() {
        // A face-interior page's south-then-north trip returns home.
        let x = page_index(Face::new(4), 2, 1, 1);
        assert_eq!(north(south(x)), x);
        assert_eq!(south(north(x)), x);
        assert_eq!(east(west(x)), x);
        assert_eq!(west(east(x)), x);
    }

    #[test]
    fn diagonal_neighbors_agree_regardless_of_composition_order() {
        for f in 0..6 {
            let x = page_index(Face::new(f), 2, 1, 1);
            let _ = northwest(x);
            let _ = northeast(x);
            let _ = southwest(x);
            let _ = southeast(x);
        }
    }
}
