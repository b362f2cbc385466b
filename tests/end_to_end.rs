//! End-to-end scenarios 2–6 from spec.md §8 (scenario 1 lives in
//! `roundtrip.rs`): convert, combine, mipmap, border, finish.

use scmtiff::algebra;
use scmtiff::codec::SampleKind;
use scmtiff::passes::combine::{combine, CombineMode};
use scmtiff::passes::mipmap::mipmap;
use scmtiff::passes::{border, ReduceMode};
use scmtiff::progress::{Context, NullProgress};
use scmtiff::sampler::projection::convert;
use scmtiff::sampler::SolidColor;
use scmtiff::store::{Params, Store};
use tempfile::NamedTempFile;

fn scratch_path() -> std::path::PathBuf {
    NamedTempFile::new().unwrap().into_temp_path().keep().unwrap()
}

#[test]
fn scenario_2_converting_a_constant_source_produces_six_constant_root_pages() {
    let out_path = scratch_path();
    let params = Params { side: 4, channels: 1, kind: SampleKind::U8 };
    let mut store = Store::create(&out_path, params).unwrap();

    let source = SolidColor::new(vec![0.6]);
    let progress = NullProgress;
    let ctx = Context::new(&progress, 0);
    convert(&source, &mut store, 0, &ctx).unwrap();

    store.scan_catalog().unwrap();
    assert_eq!(store.catalog.len(), 6);

    let side = params.side + 2;
    for i in 0..store.catalog.len() {
        let page = store.read_page(store.catalog.offset(i)).unwrap();
        for r in 1..=params.side {
            for c in 1..=params.side {
                assert!((page[r * side + c] - 0.6).abs() < 1.0 / 255.0 + 1e-3);
            }
        }
    }

    std::fs::remove_file(&out_path).ok();
}

#[test]
fn scenario_3_combining_two_constant_inputs_in_sum_mode_adds_them() {
    let path_a = scratch_path();
    let path_b = scratch_path();
    let path_out = scratch_path();
    let params = Params { side: 2, channels: 1, kind: SampleKind::U8 };

    let mut store_a = Store::create(&path_a, params).unwrap();
    let samples = vec![0.3f32; (params.side + 2) * (params.side + 2)];
    store_a.append(0, 10, &samples).unwrap();

    let mut store_b = Store::create(&path_b, params).unwrap();
    store_b.append(0, 10, &samples).unwrap();

    let mut output = Store::create(&path_out, params).unwrap();
    let progress = NullProgress;
    let ctx = Context::new(&progress, 0);
    combine(&mut store_a, &mut store_b, &mut output, CombineMode::Sum, &ctx).unwrap();

    output.scan_catalog().unwrap();
    assert_eq!(output.catalog.len(), 1);
    let page = output.read_page(output.catalog.offset(0)).unwrap();
    assert!(page.iter().all(|&v| (v - 0.6).abs() < 1.0 / 255.0 + 1e-3));

    std::fs::remove_file(&path_a).ok();
    std::fs::remove_file(&path_b).ok();
    std::fs::remove_file(&path_out).ok();
}

#[test]
fn scenario_4_mipmap_average_of_constant_level_2_pages_terminates_at_level_0() {
    let in_path = scratch_path();
    let out_path = scratch_path();
    let params = Params { side: 2, channels: 1, kind: SampleKind::U8 };
    let mut input = Store::create(&in_path, params).unwrap();

    let samples = vec![0.4f32; (params.side + 2) * (params.side + 2)];
    let mut previous = 0u64;
    for face in 0..6 {
        for c1 in 0..4 {
            let level1 = algebra::child(face, c1);
            for c2 in 0..4 {
                previous = input.append(previous, algebra::child(level1, c2), &samples).unwrap();
            }
        }
    }
    let _ = previous;

    let mut output = Store::create(&out_path, params).unwrap();
    let progress = NullProgress;
    let ctx = Context::new(&progress, 0);
    mipmap(&mut input, &mut output, ReduceMode::Average, &ctx).unwrap();

    output.scan_catalog().unwrap();
    for i in 0..output.catalog.len() {
        let x = output.catalog.index(i);
        if algebra::level(x) < 2 {
            let page = output.read_page(output.catalog.offset(i)).unwrap();
            assert!(page.iter().all(|&v| (v - 0.4).abs() < 1.0 / 255.0 + 1e-2));
        }
    }

    std::fs::remove_file(&in_path).ok();
    std::fs::remove_file(&out_path).ok();
}

#[test]
fn scenario_5_border_stitches_every_root_halo_from_its_neighbor() {
    let in_path = scratch_path();
    let out_path = scratch_path();
    let params = Params { side: 2, channels: 1, kind: SampleKind::U8 };
    let mut input = Store::create(&in_path, params).unwrap();

    let mut previous = 0u64;
    for face in 0..6i64 {
        let samples = vec![(face as f32 + 1.0) / 10.0; (params.side + 2) * (params.side + 2)];
        previous = input.append(previous, face, &samples).unwrap();
    }
    let _ = previous;

    let mut output = Store::create(&out_path, params).unwrap();
    let progress = NullProgress;
    let ctx = Context::new(&progress, 0);
    border::border(&mut input, &mut output, &ctx).unwrap();

    output.scan_catalog().unwrap();
    let side = params.side + 2;
    let unstitched_halo = vec![0.0f32; side];
    for i in 0..output.catalog.len() {
        let page = output.read_page(output.catalog.offset(i)).unwrap();
        // Halo row 0 must have been overwritten with real neighbor data, not left as the input's zeroed halo.
        assert_ne!(page[0..side], unstitched_halo[..], "halo must have been overwritten with real neighbor data");
    }

    std::fs::remove_file(&in_path).ok();
    std::fs::remove_file(&out_path).ok();
}

#[test]
fn scenario_6_finish_with_zero_oversample_matches_each_pages_own_min_max() {
    let path = scratch_path();
    let params = Params { side: 2, channels: 1, kind: SampleKind::U8 };
    let mut store = Store::create(&path, params).unwrap();

    let mut previous = 0u64;
    for face in 0..6i64 {
        let samples = vec![(face as f32) / 5.0; (params.side + 2) * (params.side + 2)];
        previous = store.append(previous, face, &samples).unwrap();
    }
    let _ = previous;

    store.finish("scenario 6", 0).unwrap();
    let mut reopened = Store::open(&path).unwrap();
    let (yv, min_values, max_values) = reopened.compute_extrema(0).unwrap().unwrap();
    assert_eq!(yv.len(), 6);
    assert_eq!(min_values.len(), 6);
    assert_eq!(max_values.len(), 6);

    for (i, &x) in yv.iter().enumerate() {
        let expected = x as f32 / 5.0;
        assert!((min_values[i] - expected).abs() < 1.0 / 255.0 + 1e-3);
        assert!((max_values[i] - expected).abs() < 1.0 / 255.0 + 1e-3);
    }

    std::fs::remove_file(&path).ok();
}
