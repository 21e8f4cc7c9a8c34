//! Anchor records reported by the tracking subsystem

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a tracked anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(pub Uuid);

impl AnchorId {
    /// Generate a fresh random identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a deterministic identity from a small integer (recordings and tests)
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for AnchorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rigid transform of an anchor in world space, column-major 4x4
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose(pub [f32; 16]);

impl Pose {
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Pure translation
    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self::from_translation_yaw_pitch(translation, 0.0, 0.0)
    }

    /// Translation with a rotation of `yaw` around +Y applied after `pitch` around +X.
    ///
    /// Plane anchors lie in their local XZ plane, so a pitch of a quarter turn
    /// stands a plane upright (vertical alignment) and yaw turns it to face
    /// another direction.
    pub fn from_translation_yaw_pitch(translation: [f32; 3], yaw: f32, pitch: f32) -> Self {
        let (sy, cy) = yaw.sin_cos();
        let (sp, cp) = pitch.sin_cos();
        let [x, y, z] = translation;
        Self([
            cy, 0.0, -sy, 0.0, //
            sy * sp, cp, cy * sp, 0.0, //
            sy * cp, -sp, cy * cp, 0.0, //
            x, y, z, 1.0,
        ])
    }

    /// Translation column
    pub fn translation(&self) -> [f32; 3] {
        [self.0[12], self.0[13], self.0[14]]
    }

    pub fn to_cols_array(&self) -> [f32; 16] {
        self.0
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Estimated size of a detected plane, in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneExtent {
    /// Size along the anchor's local X axis
    pub width: f32,
    /// Size along the anchor's local Z axis
    pub height: f32,
}

impl PlaneExtent {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Detailed boundary mesh of a detected plane, in anchor space
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaneGeometry {
    pub vertices: Vec<[f32; 3]>,
    /// Three indices per triangle into `vertices`
    pub triangle_indices: Vec<i16>,
}

impl PlaneGeometry {
    /// Axis-aligned rectangle centered on the anchor origin
    pub fn rectangle(width: f32, depth: f32) -> Self {
        let hw = width * 0.5;
        let hd = depth * 0.5;
        Self {
            vertices: vec![
                [-hw, 0.0, -hd],
                [hw, 0.0, -hd],
                [hw, 0.0, hd],
                [-hw, 0.0, hd],
            ],
            triangle_indices: vec![0, 2, 1, 0, 3, 2],
        }
    }

    /// Regular polygon as a triangle fan around a center vertex.
    ///
    /// Approximates the irregular outlines real planes grow as more of the
    /// surface is observed. `sides` is clamped to at least three.
    pub fn polygon(radius_x: f32, radius_z: f32, sides: usize) -> Self {
        let sides = sides.max(3);
        let mut vertices = Vec::with_capacity(sides + 1);
        vertices.push([0.0, 0.0, 0.0]);
        for i in 0..sides {
            let angle = i as f32 * std::f32::consts::TAU / sides as f32;
            vertices.push([radius_x * angle.cos(), 0.0, radius_z * angle.sin()]);
        }

        let mut triangle_indices = Vec::with_capacity(sides * 3);
        for i in 0..sides {
            let current = (i + 1) as i16;
            let next = ((i + 1) % sides + 1) as i16;
            triangle_indices.extend_from_slice(&[0, next, current]);
        }

        Self {
            vertices,
            triangle_indices,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_indices.len() / 3
    }
}

/// Orientation of a detected plane relative to gravity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneAlignment {
    Horizontal,
    Vertical,
}

/// Semantic label the tracking subsystem assigns to a plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneClassification {
    Ceiling,
    Door,
    Floor,
    Seat,
    Table,
    Wall,
    Window,
    /// Not yet classified, or a label this build does not know
    #[default]
    #[serde(other)]
    Unknown,
}

impl PlaneClassification {
    pub const ALL: [PlaneClassification; 8] = [
        Self::Ceiling,
        Self::Door,
        Self::Floor,
        Self::Seat,
        Self::Table,
        Self::Wall,
        Self::Window,
        Self::Unknown,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ceiling => "ceiling",
            Self::Door => "door",
            Self::Floor => "floor",
            Self::Seat => "seat",
            Self::Table => "table",
            Self::Wall => "wall",
            Self::Window => "window",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PlaneClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A detected flat surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneAnchor {
    pub id: AnchorId,
    pub transform: Pose,
    pub alignment: PlaneAlignment,
    pub extent: PlaneExtent,
    #[serde(default)]
    pub geometry: PlaneGeometry,
    #[serde(default)]
    pub classification: PlaneClassification,
}

impl PlaneAnchor {
    /// New plane with rectangular geometry matching its extent
    pub fn new(
        id: AnchorId,
        transform: Pose,
        alignment: PlaneAlignment,
        extent: PlaneExtent,
        classification: PlaneClassification,
    ) -> Self {
        Self {
            id,
            transform,
            alignment,
            extent,
            geometry: PlaneGeometry::rectangle(extent.width, extent.height),
            classification,
        }
    }
}

/// Any other anchor kind the tracking subsystem reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldAnchor {
    pub id: AnchorId,
    pub name: Option<String>,
    pub transform: Pose,
}

/// Anchor record as delivered to a session delegate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Anchor {
    Plane(PlaneAnchor),
    World(WorldAnchor),
}

impl Anchor {
    pub fn id(&self) -> AnchorId {
        match self {
            Anchor::Plane(plane) => plane.id,
            Anchor::World(world) => world.id,
        }
    }

    pub fn as_plane(&self) -> Option<&PlaneAnchor> {
        match self {
            Anchor::Plane(plane) => Some(plane),
            Anchor::World(_) => None,
        }
    }
}

impl From<PlaneAnchor> for Anchor {
    fn from(plane: PlaneAnchor) -> Self {
        Anchor::Plane(plane)
    }
}

impl From<WorldAnchor> for Anchor {
    fn from(anchor: WorldAnchor) -> Self {
        Anchor::World(anchor)
    }
}
