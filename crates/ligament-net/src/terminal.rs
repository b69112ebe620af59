//! Terminal (dangling) ligament detection.
//!
//! A ligament is terminal when any of its voxels is a free end (degree 1).
//! The connected skeleton is `(degree > 1) XOR terminal_mask`: junctions and
//! non-terminal strands survive, terminal strand interiors are removed, and the
//! degree-1 tips of terminal strands end up in the connected mask because they
//! are in the terminal mask but not in `degree > 1`. The tip retention is kept
//! as-is; its voxel count is logged at debug level.

use hashbrown::HashSet;
use tracing::{debug, info};

use crate::error::LigamentResult;
use crate::grid::{BoolGrid, DegreeGrid, LabelGrid};

/// Result of splitting the skeleton into connected and terminal parts.
#[derive(Debug, Clone)]
pub struct TerminalSplit {
    /// Skeleton with terminal ligaments removed.
    pub connected: BoolGrid,
    /// Voxels of every terminal ligament.
    pub terminal: BoolGrid,
    /// Ids of terminal ligaments, ascending.
    pub terminal_ids: Vec<u32>,
}

impl TerminalSplit {
    /// Whether `id` names a terminal ligament.
    pub fn is_terminal(&self, id: u32) -> bool {
        self.terminal_ids.binary_search(&id).is_ok()
    }
}

/// Ids of ligaments that contain at least one degree-1 voxel.
pub fn terminal_ligament_ids(labels: &LabelGrid, degrees: &DegreeGrid) -> LigamentResult<Vec<u32>> {
    let tagged = degrees.zip_map(labels, |&d, &id| if d == 1 { id } else { 0 })?;
    let ids: HashSet<u32> = tagged.iter().copied().filter(|&id| id != 0).collect();
    let mut ids: Vec<u32> = ids.into_iter().collect();
    ids.sort_unstable();
    Ok(ids)
}

/// Split the skeleton into connected and terminal ligament masks.
pub fn remove_terminal_ligaments(
    labels: &LabelGrid,
    degrees: &DegreeGrid,
) -> LigamentResult<TerminalSplit> {
    let terminal_ids = terminal_ligament_ids(labels, degrees)?;
    let lookup: HashSet<u32> = terminal_ids.iter().copied().collect();

    let terminal = labels.map(|id| *id != 0 && lookup.contains(id));
    let connected = degrees.zip_map(&terminal, |&d, &t| (d > 1) ^ t)?;

    let retained_tips = degrees
        .zip_map(&connected, |&d, &c| c && d == 1)?
        .count();
    debug!(
        retained_tips = retained_tips,
        "Terminal tips retained in connected skeleton"
    );
    info!(
        terminal_ligaments = terminal_ids.len(),
        terminal_voxels = terminal.count(),
        connected_voxels = connected.count(),
        "Found terminal ligaments"
    );

    Ok(TerminalSplit {
        connected,
        terminal,
        terminal_ids,
    })
}
