//! Local topology of a voxel's 3x3x3 neighborhood.
//!
//! A neighborhood is packed into the low 27 bits of a `u32`, bit
//! `(dx + 1) + 3 (dy + 1) + 9 (dz + 1)` for offset `(dx, dy, dz)`. The center
//! is bit 13.
//!
//! A foreground voxel is simple (removable without changing topology) when
//! both topological numbers equal one (Bertrand & Malandain, 1994):
//!
//! - `T26`: 26-connected foreground components in N26 without the center
//! - `T6`: 6-connected background components in N18 without the center that
//!   touch one of the six face neighbors

use ligament_net::BoolGrid;

/// Bit of the center voxel.
pub const CENTER: u32 = 1 << 13;

const ALL: u32 = (1 << 27) - 1;

const fn offset(i: usize) -> [i32; 3] {
    [(i % 3) as i32 - 1, ((i / 3) % 3) as i32 - 1, (i / 9) as i32 - 1]
}

const fn nonzero(o: [i32; 3]) -> i32 {
    (o[0] != 0) as i32 + (o[1] != 0) as i32 + (o[2] != 0) as i32
}

/// Positions whose offset has at most `max_nonzero` nonzero components, center excluded.
const fn shell(max_nonzero: i32) -> u32 {
    let mut mask = 0u32;
    let mut i = 0;
    while i < 27 {
        let n = nonzero(offset(i));
        if n > 0 && n <= max_nonzero {
            mask |= 1 << i;
        }
        i += 1;
    }
    mask
}

/// Pairwise adjacency inside the cube; `max_nonzero` 1 is 6-adjacency, 3 is 26.
const fn adjacency(max_nonzero: i32) -> [u32; 27] {
    let mut table = [0u32; 27];
    let mut i = 0;
    while i < 27 {
        let a = offset(i);
        let mut j = 0;
        while j < 27 {
            let b = offset(j);
            let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
            let n = nonzero(d);
            if n > 0
                && n <= max_nonzero
                && d[0].abs() <= 1
                && d[1].abs() <= 1
                && d[2].abs() <= 1
            {
                table[i] |= 1 << j;
            }
            j += 1;
        }
        i += 1;
    }
    table
}

const N6: u32 = shell(1);
const N18: u32 = shell(2);
const N26: u32 = shell(3);
const ADJ6: [u32; 27] = adjacency(1);
const ADJ26: [u32; 27] = adjacency(3);

/// Direction offsets of the six face neighbors, in sweep order.
pub const BORDER_DIRECTIONS: [[isize; 3]; 6] = [
    [0, -1, 0],
    [0, 1, 0],
    [1, 0, 0],
    [-1, 0, 0],
    [0, 0, 1],
    [0, 0, -1],
];

/// Pack the neighborhood of `(x, y, z)`; voxels outside the grid read as background.
pub fn neighborhood(grid: &BoolGrid, x: usize, y: usize, z: usize) -> u32 {
    let mut bits = 0u32;
    for i in 0..27 {
        let [dx, dy, dz] = offset(i);
        let on = grid.get_signed(
            x as isize + dx as isize,
            y as isize + dy as isize,
            z as isize + dz as isize,
        );
        if let Some(true) = on {
            bits |= 1 << i;
        }
    }
    bits
}

/// Number of components of `set` under `adjacency` that intersect `touching`.
fn components(set: u32, adjacency: &[u32; 27], touching: u32) -> u32 {
    let mut remaining = set;
    let mut count = 0;
    while remaining != 0 {
        let mut component = 1u32 << remaining.trailing_zeros();
        let mut frontier = component;
        while frontier != 0 {
            let i = frontier.trailing_zeros() as usize;
            frontier &= frontier - 1;
            let grown = adjacency[i] & set & !component;
            component |= grown;
            frontier |= grown;
        }
        remaining &= !component;
        if component & touching != 0 {
            count += 1;
        }
    }
    count
}

/// Foreground topological number `T26`.
pub fn foreground_number(bits: u32) -> u32 {
    components(bits & N26, &ADJ26, ALL)
}

/// Background topological number `T6`.
pub fn background_number(bits: u32) -> u32 {
    components(!bits & N18, &ADJ6, N6)
}

/// Whether removing the center leaves local topology unchanged.
pub fn is_simple(bits: u32) -> bool {
    foreground_number(bits) == 1 && background_number(bits) == 1
}

/// Number of foreground voxels among the 26 neighbors.
pub fn neighbor_count(bits: u32) -> u32 {
    (bits & N26).count_ones()
}

/// Whether the center is the free end of a strand.
pub fn is_endpoint(bits: u32) -> bool {
    neighbor_count(bits) == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligament_net::Grid3;

    fn bit(dx: i32, dy: i32, dz: i32) -> u32 {
        1 << ((dx + 1) + 3 * (dy + 1) + 9 * (dz + 1))
    }

    #[test]
    fn test_shell_sizes() {
        assert_eq!(N6.count_ones(), 6);
        assert_eq!(N18.count_ones(), 18);
        assert_eq!(N26.count_ones(), 26);
        assert_eq!(N26 & CENTER, 0);
        assert_eq!(ADJ6[13].count_ones(), 6);
        assert_eq!(ADJ26[13].count_ones(), 26);
        // Corner of the cube.
        assert_eq!(ADJ26[0].count_ones(), 7);
        assert_eq!(ADJ6[0].count_ones(), 3);
    }

    #[test]
    fn test_isolated_voxel_is_not_simple() {
        assert_eq!(foreground_number(CENTER), 0);
        assert!(!is_simple(CENTER));
    }

    #[test]
    fn test_strand_interior_is_not_simple() {
        let bits = CENTER | bit(-1, 0, 0) | bit(1, 0, 0);
        assert_eq!(foreground_number(bits), 2);
        assert!(!is_simple(bits));
        assert!(!is_endpoint(bits));
    }

    #[test]
    fn test_strand_end_is_simple() {
        let bits = CENTER | bit(1, 0, 0);
        assert!(is_endpoint(bits));
        assert!(is_simple(bits));
    }

    #[test]
    fn test_interior_voxel_is_not_simple() {
        // Fully surrounded: removing it would create a cavity.
        let bits = ALL;
        assert_eq!(background_number(bits), 0);
        assert!(!is_simple(bits));
    }

    #[test]
    fn test_face_of_slab_is_simple() {
        // Center on the top face of a solid half-space.
        let mut bits = 0;
        for i in 0..27 {
            if offset(i)[2] <= 0 {
                bits |= 1 << i;
            }
        }
        assert!(is_simple(bits));
    }

    #[test]
    fn test_ring_voxel_is_not_simple() {
        // A voxel in a 1-thick plate whose removal punches a tunnel.
        let mut bits = 0;
        for i in 0..27 {
            if offset(i)[2] == 0 {
                bits |= 1 << i;
            }
        }
        assert_eq!(background_number(bits), 2);
        assert!(!is_simple(bits));
    }

    #[test]
    fn test_neighborhood_clips_at_border() {
        let grid: BoolGrid = Grid3::new([2, 2, 2], true);
        let bits = neighborhood(&grid, 0, 0, 0);
        assert_eq!(bits.count_ones(), 8);
        assert_ne!(bits & CENTER, 0);
        assert_eq!(neighbor_count(bits), 7);
    }
}
