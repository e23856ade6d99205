//! Fixed 3x3 zone grid.
//!
//! Zones are indexed row-major: `zone = row * 3 + col`, so 0 is top-left and
//! 8 is bottom-right. Positions map to zones by relative position only, so the
//! same physical region yields the same zone at any resolution.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const GRID_SIDE: u32 = 3;
pub const ZONE_COUNT: u8 = 9;

const ALL_ZONES: u16 = (1 << ZONE_COUNT) - 1;

/// Duplicate-free set of zone indices.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ZoneSet(u16);

impl ZoneSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(ALL_ZONES)
    }

    /// Returns false if the zone was already present or is out of range.
    pub fn insert(&mut self, zone: u8) -> bool {
        if zone >= ZONE_COUNT {
            return false;
        }
        let bit = 1u16 << zone;
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    pub fn contains(&self, zone: u8) -> bool {
        zone < ZONE_COUNT && self.0 & (1 << zone) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Zones in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..ZONE_COUNT).filter(move |z| self.contains(*z))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.iter().collect()
    }
}

impl FromIterator<u8> for ZoneSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = ZoneSet::empty();
        for zone in iter {
            set.insert(zone);
        }
        set
    }
}

impl fmt::Debug for ZoneSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for ZoneSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for ZoneSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let zones = Vec::<u8>::deserialize(deserializer)?;
        if let Some(bad) = zones.iter().find(|z| **z >= ZONE_COUNT) {
            return Err(D::Error::custom(format!("zone {} out of range 0..=8", bad)));
        }
        Ok(zones.into_iter().collect())
    }
}

/// Zone containing pixel `(x, y)` of a `width x height` frame.
pub fn zone_for_point(x: u32, y: u32, width: u32, height: u32) -> u8 {
    let col = grid_index(x, width);
    let row = grid_index(y, height);
    (row * GRID_SIDE + col) as u8
}

/// Pixel bounds `(x0, y0, x1, y1)`, end-exclusive, of a zone cell.
///
/// Consistent with `zone_for_point`: every pixel inside the bounds maps back
/// to `zone`. Cells can be empty on frames narrower than three pixels.
pub fn cell_bounds(zone: u8, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let row = zone as u32 / GRID_SIDE;
    let col = zone as u32 % GRID_SIDE;
    (
        grid_edge(col, width),
        grid_edge(row, height),
        grid_edge(col + 1, width),
        grid_edge(row + 1, height),
    )
}

fn grid_index(pos: u32, extent: u32) -> u32 {
    if extent == 0 {
        return 0;
    }
    ((pos as u64 * GRID_SIDE as u64) / extent as u64).min(GRID_SIDE as u64 - 1) as u32
}

// ceil(i * extent / 3)
fn grid_edge(i: u32, extent: u32) -> u32 {
    ((i as u64 * extent as u64 + GRID_SIDE as u64 - 1) / GRID_SIDE as u64) as u32
}
