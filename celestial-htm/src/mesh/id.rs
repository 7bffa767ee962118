//! Packed 32-bit trixel identifiers.
//!
//! | Bits  | Meaning                                        |
//! |-------|------------------------------------------------|
//! | 31    | valid flag                                     |
//! | 30    | hemisphere (0 = north, 1 = south)              |
//! | 29–28 | root quadrant                                  |
//! | 27–24 | depth                                          |
//! | 23–2  | child position, 2 bits per level (level `l` at bits `2l..2l+1`) |
//!
//! This layout is part of the object-store format and must not change.

use std::fmt;

use super::trixel::Hemisphere;

const VALID_BIT: u32 = 1 << 31;
const HEMISPHERE_SHIFT: u32 = 30;
const QUADRANT_SHIFT: u32 = 28;
const DEPTH_SHIFT: u32 = 24;
const DEPTH_MASK: u32 = 0xf;
const POSITION_MASK: u32 = 0x00ff_ffff;

/// Identity of a trixel that survives serialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrixelId(u32);

impl TrixelId {
    pub fn new(hemisphere: Hemisphere, quadrant: u8, depth: u8, position: u32) -> Self {
        Self(
            VALID_BIT
                | (hemisphere.bit() << HEMISPHERE_SHIFT)
                | ((quadrant as u32 & 0x3) << QUADRANT_SHIFT)
                | ((depth as u32 & DEPTH_MASK) << DEPTH_SHIFT)
                | (position & POSITION_MASK),
        )
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 & VALID_BIT != 0
    }

    pub fn hemisphere(self) -> Hemisphere {
        if (self.0 >> HEMISPHERE_SHIFT) & 1 == 0 {
            Hemisphere::North
        } else {
            Hemisphere::South
        }
    }

    pub const fn quadrant(self) -> u8 {
        ((self.0 >> QUADRANT_SHIFT) & 0x3) as u8
    }

    pub const fn depth(self) -> u8 {
        ((self.0 >> DEPTH_SHIFT) & DEPTH_MASK) as u8
    }

    /// The packed per-level child positions.
    pub const fn position(self) -> u32 {
        self.0 & POSITION_MASK
    }

    /// Which of its parent's four children this trixel descends through at `level`.
    pub const fn position_at(self, level: u8) -> u8 {
        ((self.0 >> ((level as u32) << 1)) & 0x3) as u8
    }

    /// Index of the root trixel this id descends from (`N0..N3, S0..S3`).
    pub fn root_index(self) -> usize {
        self.hemisphere().bit() as usize * 4 + self.quadrant() as usize
    }
}

impl fmt::Display for TrixelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.hemisphere().letter(), self.quadrant())?;
        for level in 1..=self.depth() {
            write!(f, ".{}", self.position_at(level))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_id_fields() {
        let id = TrixelId::new(Hemisphere::South, 2, 0, 0);
        assert!(id.is_valid());
        assert_eq!(id.raw(), 0x8000_0000 | 0x4000_0000 | 0x2000_0000);
        assert_eq!(id.hemisphere(), Hemisphere::South);
        assert_eq!(id.quadrant(), 2);
        assert_eq!(id.depth(), 0);
        assert_eq!(id.root_index(), 6);
    }

    #[test]
    fn test_child_positions() {
        // N1, then child 3 at level 1 and child 2 at level 2
        let position = (3 << 2) | (2 << 4);
        let id = TrixelId::new(Hemisphere::North, 1, 2, position);
        assert_eq!(id.depth(), 2);
        assert_eq!(id.position_at(1), 3);
        assert_eq!(id.position_at(2), 2);
        assert_eq!(id.to_string(), "N1.3.2");
    }

    #[test]
    fn test_deepest_level_does_not_touch_depth_bits() {
        let position = 3 << 22;
        let id = TrixelId::new(Hemisphere::North, 0, 11, position);
        assert_eq!(id.depth(), 11);
        assert_eq!(id.position_at(11), 3);
    }

    #[test]
    fn test_invalid_raw_id() {
        assert!(!TrixelId::from_raw(0x0100_0000).is_valid());
    }
}
