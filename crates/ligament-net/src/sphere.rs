//! Memoized spherical structuring elements.

use std::sync::{Arc, Mutex, MutexGuard};

use hashbrown::HashMap;
use tracing::trace;

use crate::grid::{BoolGrid, Grid3};

/// Build the ball kernel of radius `r`: side `2r + 1`, true where
/// `dx² + dy² + dz² <= r²`.
pub fn ball(radius: u32) -> BoolGrid {
    let r = radius as i64;
    let side = (2 * radius + 1) as usize;
    Grid3::from_fn([side; 3], |x, y, z| {
        let dx = x as i64 - r;
        let dy = y as i64 - r;
        let dz = z as i64 - r;
        dx * dx + dy * dy + dz * dz <= r * r
    })
}

/// Lazy cache of ball kernels keyed by integer radius.
///
/// Entries never change once inserted. Kernels are generated outside the lock;
/// if two threads race on the same radius the first insertion wins and both
/// receive that kernel.
#[derive(Debug, Default)]
pub struct SphereTable {
    entries: Mutex<HashMap<u32, Arc<BoolGrid>>>,
}

impl SphereTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Arc<BoolGrid>>> {
        // The map is only ever inserted into, so a poisoned lock still holds
        // valid entries.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Ball kernel of `radius`, generated on first request.
    pub fn get(&self, radius: u32) -> Arc<BoolGrid> {
        if let Some(kernel) = self.lock().get(&radius) {
            return Arc::clone(kernel);
        }

        let kernel = Arc::new(ball(radius));
        trace!(radius = radius, "Generated sphere kernel");
        Arc::clone(self.lock().entry(radius).or_insert(kernel))
    }

    /// Generate kernels for every radius in `radii`.
    pub fn preload(&self, radii: impl IntoIterator<Item = u32>) {
        for radius in radii {
            self.get(radius);
        }
    }

    /// Number of cached kernels.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no kernel has been generated yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a kernel for `radius` is cached.
    pub fn contains(&self, radius: u32) -> bool {
        self.lock().contains_key(&radius)
    }
}
