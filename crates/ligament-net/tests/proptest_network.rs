//! Property-based tests for the network stages.
//!
//! Run with: cargo test -p ligament-net -- proptest

use ligament_net::labels::label_histogram;
use ligament_net::metrics::{diameter, lengths};
use ligament_net::sphere::ball;
use ligament_net::{
    BoolGrid, Connectivity, DiameterParams, DistanceGrid, Grid3, NEIGHBOR_OFFSETS_26,
    NOISE_THRESHOLD, count_neighbors, label_components, label_ligaments,
    remove_terminal_ligaments,
};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// Random sparse masks up to 8 voxels per side.
fn arb_mask() -> impl Strategy<Value = BoolGrid> {
    prop::array::uniform3(1usize..=8).prop_flat_map(|dims| {
        let len = dims[0] * dims[1] * dims[2];
        prop::collection::vec(prop::bool::weighted(0.3), len)
            .prop_map(move |data| Grid3::from_vec(dims, data).unwrap())
    })
}

/// A mask with a distance field of quarter-voxel steps, both up to 10 per side.
fn arb_mask_and_distance() -> impl Strategy<Value = (BoolGrid, DistanceGrid)> {
    prop::array::uniform3(1usize..=10).prop_flat_map(|dims| {
        let len = dims[0] * dims[1] * dims[2];
        (
            prop::collection::vec(prop::bool::weighted(0.5), len),
            prop::collection::vec(0u32..=24, len),
        )
            .prop_map(move |(mask, steps)| {
                let distance: Vec<f64> = steps.into_iter().map(|s| f64::from(s) / 4.0).collect();
                (
                    Grid3::from_vec(dims, mask).unwrap(),
                    Grid3::from_vec(dims, distance).unwrap(),
                )
            })
    })
}

fn brute_degree(mask: &BoolGrid, x: usize, y: usize, z: usize) -> u8 {
    NEIGHBOR_OFFSETS_26
        .iter()
        .filter(|d| {
            matches!(
                mask.get_signed(x as isize + d[0], y as isize + d[1], z as isize + d[2]),
                Some(true)
            )
        })
        .count() as u8
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn proptest_degree_matches_neighbor_count(mask in arb_mask()) {
        let degrees = count_neighbors(&mask).unwrap();
        for [x, y, z] in mask.coords_x_major() {
            let expected = if mask[[x, y, z]] { brute_degree(&mask, x, y, z) } else { 0 };
            prop_assert_eq!(degrees[[x, y, z]], expected);
        }
    }

    #[test]
    fn proptest_labels_partition_candidates(mask in arb_mask()) {
        let degrees = count_neighbors(&mask).unwrap();
        let labeling = label_ligaments(&degrees);

        for p in mask.coords_x_major() {
            let candidate = degrees[p] == 1 || degrees[p] == 2;
            prop_assert_eq!(labeling.labels[p] != 0, candidate);
        }
        // Ids are dense and every id has at least one voxel.
        let histogram = labeling.histogram();
        prop_assert_eq!(histogram.len(), labeling.count as usize + 1);
        prop_assert!(histogram.iter().skip(1).all(|&c| c > 0));
    }

    #[test]
    fn proptest_neighbouring_voxels_share_component(mask in arb_mask()) {
        let labeling = label_components(&mask, Connectivity::Full);
        for [x, y, z] in mask.coords_x_major() {
            if !mask[[x, y, z]] {
                continue;
            }
            let id = labeling.labels[[x, y, z]];
            for n in mask.neighbors_26(x, y, z) {
                if mask[n] {
                    prop_assert_eq!(labeling.labels[n], id);
                }
            }
        }
    }

    #[test]
    fn proptest_face_labels_refine_full_labels(mask in arb_mask()) {
        let face = label_components(&mask, Connectivity::Face);
        let full = label_components(&mask, Connectivity::Full);
        prop_assert!(face.count >= full.count);
    }

    #[test]
    fn proptest_lengths_conserve_mass(mask in arb_mask(), pixel_size in 0.1f64..5.0) {
        let degrees = count_neighbors(&mask).unwrap();
        let labeling = label_ligaments(&degrees);
        let labeled = label_histogram(&labeling.labels).iter().skip(1).sum::<usize>();

        let measured = lengths(&labeling.labels, pixel_size);
        prop_assert_eq!(measured.len(), labeling.count as usize);
        let total: f64 = measured.iter().sum();
        prop_assert!((total - labeled as f64 * pixel_size).abs() < 1e-9 * (1.0 + total));
    }

    #[test]
    fn proptest_diameter_is_deterministic_and_filtered(
        (mask, distance) in arb_mask_and_distance(),
        pixel_size in 0.1f64..5.0,
    ) {
        let params = DiameterParams::default();
        let first = diameter(&mask, &distance, pixel_size, &params).unwrap();
        let second = diameter(&mask, &distance, pixel_size, &params).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert!(first.len() <= mask.count());
        for &value in &first {
            prop_assert!(value > 0.0);
            prop_assert!(value / pixel_size > NOISE_THRESHOLD);
        }
    }

    #[test]
    fn proptest_terminal_split_covers_labels(mask in arb_mask()) {
        let degrees = count_neighbors(&mask).unwrap();
        let labeling = label_ligaments(&degrees);
        let split = remove_terminal_ligaments(&labeling.labels, &degrees).unwrap();

        for p in mask.coords_x_major() {
            // Junctions always stay connected.
            if degrees[p] > 2 {
                prop_assert!(split.connected[p]);
                prop_assert!(!split.terminal[p]);
            }
            // Nothing outside the skeleton is ever marked.
            if !mask[p] {
                prop_assert!(!split.connected[p] && !split.terminal[p]);
            }
            let id = labeling.labels[p];
            if id != 0 {
                prop_assert_eq!(split.terminal[p], split.is_terminal(id));
            }
        }
    }

    #[test]
    fn proptest_ball_is_symmetric(radius in 0u32..6) {
        let b = ball(radius);
        let side = 2 * radius as usize + 1;
        prop_assert_eq!(b.dims(), [side; 3]);
        for [x, y, z] in b.coords_x_major() {
            let v = b[[x, y, z]];
            prop_assert_eq!(v, b[[side - 1 - x, y, z]]);
            prop_assert_eq!(v, b[[x, side - 1 - y, z]]);
            prop_assert_eq!(v, b[[x, y, side - 1 - z]]);
            prop_assert_eq!(v, b[[y, x, z]]);
            prop_assert_eq!(v, b[[z, y, x]]);
        }
    }

    #[test]
    fn proptest_ball_grows_with_radius(radius in 0u32..6) {
        let small = ball(radius);
        let large = ball(radius + 1);
        prop_assert!(large.count() > small.count());
        // The smaller ball nests in the centre of the larger one.
        for [x, y, z] in small.coords_x_major() {
            if small[[x, y, z]] {
                prop_assert!(large[[x + 1, y + 1, z + 1]]);
            }
        }
    }
}
