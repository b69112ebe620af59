//! End-to-end tests with the real thinning and distance transform.

use std::sync::Mutex;

use approx::assert_relative_eq;
use ligament_net::{
    AnalysisParams, BoolGrid, CancellationToken, Connectivity, DiameterParams, Grid3,
    NoOpObserver, PipelineStage, ProgressObserver, SphereTable, Volume, label_components,
};
use ligament_skel::{EuclideanDistance, LeeThinning, standard_pipeline};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(String, u8)>>,
}

impl ProgressObserver for Recorder {
    fn on_progress(&self, phase: &str, percent: u8) {
        self.events.lock().unwrap().push((phase.to_string(), percent));
    }
}

/// Three square struts of width 3 meeting at the centre of the grid, along x, y and z.
fn strut_junction() -> BoolGrid {
    Grid3::from_fn([25, 25, 25], |x, y, z| {
        let core = |v: usize| (11..14).contains(&v);
        let arm = |v: usize| (3..22).contains(&v);
        (arm(x) && core(y) && core(z)) || (core(x) && arm(y) && core(z)) || (core(x) && core(y) && arm(z))
    })
}

#[test]
fn test_thinning_keeps_component_count() {
    let grid: BoolGrid = Grid3::from_fn([30, 12, 12], |x, y, z| {
        let a = (1..10).contains(&x) && (2..9).contains(&y) && (2..9).contains(&z);
        let b = (14..28).contains(&x) && (4..7).contains(&y) && (4..7).contains(&z);
        let c = x == 12 && y == 6 && z == 6;
        a || b || c
    });
    let before = label_components(&grid, Connectivity::Full).count;
    let (skeleton, _) = LeeThinning::new().thin(&grid, &NoOpObserver).unwrap();
    assert_eq!(label_components(&skeleton, Connectivity::Full).count, before);
    assert_eq!(before, 3);
}

#[test]
fn test_strut_junction_end_to_end() {
    let volume = Volume::new(strut_junction(), 0.1).unwrap();
    let params = AnalysisParams {
        diameter: DiameterParams::untrimmed(),
        ..AnalysisParams::with_node_mask()
    };
    let recorder = Recorder::default();
    let analysis = standard_pipeline(params)
        .run(&volume, &SphereTable::new(), &recorder, &CancellationToken::new())
        .unwrap();

    // Six arms leave the junction.
    assert!(analysis.node_count() >= 1);
    assert!(analysis.ligament_count >= 6);
    assert!(analysis.terminal_count() >= 6);
    assert_eq!(label_components(&analysis.skeleton, Connectivity::Full).count, 1);

    // A width-3 strut has centre-line distance 2, so local diameters are 4 voxels.
    let m = &analysis.measurements;
    assert!(!m.all_diameters.is_empty());
    assert!(m.all_diameters.iter().all(|&d| d > 0.0));
    let mean = m.summary().all_diameter.value().unwrap();
    assert_relative_eq!(mean, 0.4, epsilon = 0.15);

    let mask = analysis.node_mask.as_ref().unwrap();
    assert!(mask[[12, 12, 12]]);

    // Thinning and the distance transform report concurrently; each phase
    // is monotonic on its own and the run ends at 100.
    let events = recorder.events.lock().unwrap();
    for phase in [PipelineStage::Skeletonize, PipelineStage::DistanceTransform] {
        let percents: Vec<u8> = events
            .iter()
            .filter(|(p, _)| p == phase.phase())
            .map(|(_, pct)| *pct)
            .collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }
    let entry = events
        .iter()
        .position(|(p, pct)| p == PipelineStage::DistanceTransform.phase() && *pct == 20)
        .unwrap();
    assert!(events[entry..].windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(events.last().map(|(_, pct)| *pct), Some(100));
}

#[test]
fn test_distance_of_plate() {
    let grid: BoolGrid = Grid3::from_fn([10, 10, 9], |_, _, z| (1..8).contains(&z));
    let field = EuclideanDistance.compute(&grid, &NoOpObserver).unwrap();
    // Middle layer of a 7-thick plate is 4 from either side.
    assert_relative_eq!(field[[5, 5, 4]], 4.0);
    assert_relative_eq!(field[[0, 0, 1]], 1.0);
    assert_eq!(field[[5, 5, 0]], 0.0);
}

#[test]
fn test_fully_solid_volume_fails_the_run() {
    let volume = Volume::new(Grid3::new([6, 6, 6], true), 1.0).unwrap();
    let err = standard_pipeline(AnalysisParams::default())
        .run(&volume, &SphereTable::new(), &NoOpObserver, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(
        err,
        ligament_net::LigamentError::ExternalStageFailure { .. }
    ));
}
