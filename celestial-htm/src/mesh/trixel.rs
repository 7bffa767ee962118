use super::id::TrixelId;
use super::{TrixelIndex, VertexIndex};

/// Winding of a trixel's corners as seen from outside the sphere.
///
/// Root trixels in the north are `Up`, in the south `Down`. The central
/// child of a subdivision flips orientation, the three corner children
/// keep their parent's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Up,
    Down,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    pub(crate) fn bit(self) -> u32 {
        match self {
            Self::North => 0,
            Self::South => 1,
        }
    }

    pub(crate) fn letter(self) -> char {
        match self {
            Self::North => 'N',
            Self::South => 'S',
        }
    }
}

/// One triangular cell of the mesh.
#[derive(Debug, Clone)]
pub struct Trixel {
    pub(crate) vertices: [VertexIndex; 3],
    pub(crate) parent: Option<TrixelIndex>,
    pub(crate) first_child: Option<TrixelIndex>,
    pub(crate) orientation: Orientation,
    pub(crate) hemisphere: Hemisphere,
    pub(crate) quadrant: u8,
    pub(crate) depth: u8,
    pub(crate) position: u32,
}

impl Trixel {
    /// Corners `a`, `b`, `c`.
    pub fn vertices(&self) -> [VertexIndex; 3] {
        self.vertices
    }

    pub fn parent(&self) -> Option<TrixelIndex> {
        self.parent
    }

    /// The four children, or `None` at the mesh's deepest level.
    pub fn children(&self) -> Option<[TrixelIndex; 4]> {
        self.first_child
            .map(|first| std::array::from_fn(|k| TrixelIndex(first.0 + k as u32)))
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    pub fn quadrant(&self) -> u8 {
        self.quadrant
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn id(&self) -> TrixelId {
        TrixelId::new(self.hemisphere, self.quadrant, self.depth, self.position)
    }
}
