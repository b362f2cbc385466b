//! Page algebra properties from spec.md §8: level/root/row/col ranges,
//! parent/child inversion, and neighbor round-trips across cube-face seams.

use scmtiff::algebra::{self, Face, PageIndex};
use scmtiff::vector::Vector3;

fn all_at_level(level: i64) -> Vec<PageIndex> {
    (0..6)
        .flat_map(|f| {
            let side = 1i64 << level;
            (0..side).flat_map(move |r| (0..side).map(move |c| algebra::page_index(Face::new(f), level, r, c)))
        })
        .collect()
}

#[test]
fn level_root_row_col_are_in_range() {
    for l in 0..6 {
        for x in all_at_level(l) {
            assert_eq!(algebra::level(x), l);
            assert!((0..6).contains(&algebra::root(x).0));
            assert!((0..1i64 << l).contains(&algebra::row(x)));
            assert!((0..1i64 << l).contains(&algebra::col(x)));
        }
    }
}

#[test]
fn parent_of_child_is_identity() {
    for l in 0..5 {
        for x in all_at_level(l) {
            for k in 0..4 {
                assert_eq!(algebra::parent(algebra::child(x, k)), x);
            }
        }
    }
}

#[test]
fn orthogonal_neighbors_are_distinct() {
    for l in 1..5 {
        for x in all_at_level(l) {
            let neighbors = [algebra::north(x), algebra::south(x), algebra::east(x), algebra::west(x)];
            for &n in &neighbors {
                assert_ne!(n, x);
            }
            for i in 0..neighbors.len() {
                for j in (i + 1)..neighbors.len() {
                    assert_ne!(neighbors[i], neighbors[j]);
                }
            }
        }
    }
}

#[test]
fn north_then_south_round_trips_even_across_a_seam() {
    // Interior pages: a single hop is its own inverse.
    for l in 2..5 {
        for x in all_at_level(l) {
            if algebra::row(x) > 0 && algebra::row(x) < (1i64 << l) - 1 {
                assert_eq!(algebra::south(algebra::north(x)), x);
            }
        }
    }

    // Pages on a face's boundary row cross a seam; the mapping must still
    // round-trip, just not necessarily after a single hop back the same way
    // (north/south on the neighbor's face may land on a different row/col
    // convention) — two hops of the same direction pair always recovers x.
    for l in 1..5 {
        for x in all_at_level(l) {
            let once = algebra::north(x);
            let twice = algebra::south(once);
            assert_eq!(twice, x, "north/south must invert even across a face seam");
        }
    }
}

#[test]
fn east_west_round_trip() {
    for l in 1..5 {
        for x in all_at_level(l) {
            assert_eq!(algebra::west(algebra::east(x)), x);
            assert_eq!(algebra::east(algebra::west(x)), x);
        }
    }
}

#[test]
fn corner_vectors_are_unit_norm() {
    for f in 0..6 {
        for &(y, x) in &[(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0), (0.5, 0.5)] {
            let v: Vector3 = algebra::vector(Face::new(f), y, x);
            assert!((v.length() - 1.0).abs() < 1e-9);
        }
    }
}
