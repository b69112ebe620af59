//! Property-based tests for thinning and the distance transform.

use ligament_net::{BoolGrid, Connectivity, Grid3, NoOpObserver, label_components};
use ligament_skel::{EuclideanDistance, LeeThinning};
use proptest::prelude::*;

fn arb_volume() -> impl Strategy<Value = BoolGrid> {
    prop::array::uniform3(2usize..=9).prop_flat_map(|dims| {
        let len = dims[0] * dims[1] * dims[2];
        prop::collection::vec(prop::bool::weighted(0.55), len)
            .prop_map(move |data| Grid3::from_vec(dims, data).unwrap())
    })
}

fn brute_force(volume: &BoolGrid, x: usize, y: usize, z: usize) -> f64 {
    volume
        .coords_x_major()
        .filter(|&p| !volume[p])
        .map(|[bx, by, bz]| {
            let dx = x as f64 - bx as f64;
            let dy = y as f64 - by as f64;
            let dz = z as f64 - bz as f64;
            (dx * dx + dy * dy + dz * dz).sqrt()
        })
        .fold(f64::INFINITY, f64::min)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn proptest_distance_matches_brute_force(volume in arb_volume()) {
        prop_assume!(volume.count() < volume.len());
        let field = EuclideanDistance.compute(&volume, &NoOpObserver).unwrap();
        for [x, y, z] in volume.coords_x_major() {
            let expected = if volume[[x, y, z]] { brute_force(&volume, x, y, z) } else { 0.0 };
            prop_assert!((field[[x, y, z]] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn proptest_thinning_preserves_components(volume in arb_volume()) {
        let (skeleton, _) = LeeThinning::new().thin(&volume, &NoOpObserver).unwrap();
        prop_assert_eq!(
            label_components(&skeleton, Connectivity::Full).count,
            label_components(&volume, Connectivity::Full).count
        );
        // Thinning only removes voxels.
        for p in volume.coords_x_major() {
            prop_assert!(!skeleton[p] || volume[p]);
        }
    }
}
