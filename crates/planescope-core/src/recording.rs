//! Recorded tracking sessions
//!
//! A recording is the anchor notification stream of a tracking session,
//! stored as JSON with the delay before each notification. Playing one back
//! through [`crate::TrackingSession`] reproduces the session for the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};
use std::path::Path;
use thiserror::Error;

use crate::anchor::{
    Anchor, AnchorId, PlaneAlignment, PlaneAnchor, PlaneClassification, PlaneExtent,
    PlaneGeometry, Pose, WorldAnchor,
};
use crate::session::SessionEvent;

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Recording {0} has no steps")]
    Empty(String),
}

/// One notification and the delay before it was delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedStep {
    /// Milliseconds since the previous step
    #[serde(default)]
    pub delay_ms: u64,
    pub event: SessionEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub name: String,
    pub recorded_at: DateTime<Utc>,
    pub steps: Vec<RecordedStep>,
}

impl Recording {
    pub fn new(name: impl Into<String>, steps: Vec<RecordedStep>) -> Self {
        Self {
            name: name.into(),
            recorded_at: Utc::now(),
            steps,
        }
    }

    /// Load a recording from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, RecordingError> {
        let content = std::fs::read_to_string(path)?;
        let recording: Recording = serde_json::from_str(&content)?;
        if recording.steps.is_empty() {
            return Err(RecordingError::Empty(recording.name));
        }
        Ok(recording)
    }

    /// Save the recording as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), RecordingError> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Total playback time at normal speed, in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.delay_ms).sum()
    }

    /// Built-in recording of a small living room.
    ///
    /// Surfaces appear coarse and grow more detailed over time, the way a
    /// tracker refines them while the device moves around. The stream also
    /// contains a non-plane anchor, a late reclassification, a plane merged
    /// into another one (removed), and one update with malformed geometry.
    pub fn demo() -> Self {
        let mut room = DemoRoom::default();

        let floor = room.plane(
            Pose::from_translation([0.0, 0.0, 0.0]),
            PlaneAlignment::Horizontal,
            PlaneClassification::Floor,
        );
        let floor_patch = room.plane(
            Pose::from_translation([1.6, 0.0, 1.2]),
            PlaneAlignment::Horizontal,
            PlaneClassification::Floor,
        );
        let back_wall = room.plane(
            Pose::from_translation_yaw_pitch([0.0, 1.25, -2.0], 0.0, FRAC_PI_2),
            PlaneAlignment::Vertical,
            PlaneClassification::Wall,
        );
        let side_wall = room.plane(
            Pose::from_translation_yaw_pitch([-2.5, 1.25, 0.0], FRAC_PI_2, FRAC_PI_2),
            PlaneAlignment::Vertical,
            PlaneClassification::Wall,
        );
        let door = room.plane(
            Pose::from_translation_yaw_pitch([-2.45, 1.0, 1.0], FRAC_PI_2, FRAC_PI_2),
            PlaneAlignment::Vertical,
            PlaneClassification::Door,
        );
        let window = room.plane(
            Pose::from_translation_yaw_pitch([0.8, 1.5, -1.95], 0.0, FRAC_PI_2),
            PlaneAlignment::Vertical,
            PlaneClassification::Window,
        );
        let table = room.plane(
            Pose::from_translation([0.5, 0.75, -0.4]),
            PlaneAlignment::Horizontal,
            PlaneClassification::Unknown,
        );
        let seat = room.plane(
            Pose::from_translation([-1.0, 0.45, -0.6]),
            PlaneAlignment::Horizontal,
            PlaneClassification::Seat,
        );
        let shelf = room.plane(
            Pose::from_translation([1.8, 1.1, -1.6]),
            PlaneAlignment::Horizontal,
            PlaneClassification::Unknown,
        );
        let ceiling = room.plane(
            Pose::from_translation_yaw_pitch([0.0, 2.5, 0.0], 0.0, PI),
            PlaneAlignment::Horizontal,
            PlaneClassification::Ceiling,
        );
        let marker = Anchor::World(WorldAnchor {
            id: AnchorId::from_u128(0x100),
            name: Some("origin".to_string()),
            transform: Pose::IDENTITY,
        });

        room.add(0, vec![room.coarse(floor, 0.8, 0.8), marker]);
        room.update(400, vec![room.detailed(floor, 1.4, 1.2, 8)]);
        room.add(500, vec![room.coarse(floor_patch, 0.6, 0.5)]);
        room.update(400, vec![room.detailed(floor, 2.2, 1.8, 10)]);
        room.add(600, vec![room.coarse(back_wall, 1.0, 0.8)]);
        room.update(400, vec![
            room.detailed(floor, 3.0, 2.6, 12),
            room.detailed(back_wall, 2.0, 1.4, 4),
        ]);
        room.remove(500, vec![floor_patch]);
        room.add(500, vec![room.coarse(table, 0.6, 0.4)]);
        room.update(400, vec![
            room.detailed(back_wall, 3.6, 2.2, 4),
            room.detailed(table, 0.9, 0.6, 6),
        ]);
        room.add(600, vec![
            room.coarse(side_wall, 1.5, 1.0),
            room.coarse(seat, 0.4, 0.4),
        ]);
        let table_update = room.reclassified(table, 1.2, 0.7, PlaneClassification::Table);
        room.update(500, vec![table_update]);
        room.add(500, vec![
            room.coarse(door, 0.5, 1.2),
            room.coarse(window, 0.6, 0.5),
        ]);
        room.update(400, vec![
            room.detailed(side_wall, 3.8, 2.4, 4),
            room.detailed(door, 0.8, 2.0, 4),
            room.detailed(window, 1.0, 0.9, 4),
            room.detailed(seat, 0.5, 0.5, 8),
        ]);
        room.add(600, vec![
            room.coarse(ceiling, 1.5, 1.5),
            room.coarse(shelf, 0.4, 0.3),
        ]);
        room.update(400, vec![room.malformed(shelf, 0.6, 0.3)]);
        room.update(500, vec![
            room.detailed(ceiling, 4.0, 3.6, 4),
            room.detailed(shelf, 0.8, 0.3, 4),
            room.detailed(floor, 4.2, 3.6, 16),
        ]);

        Recording::new("demo-living-room", room.steps)
    }
}

/// Builder for the demo recording
#[derive(Default)]
struct DemoRoom {
    steps: Vec<RecordedStep>,
    planes: Vec<PlaneAnchor>,
}

impl DemoRoom {
    fn plane(
        &mut self,
        transform: Pose,
        alignment: PlaneAlignment,
        classification: PlaneClassification,
    ) -> usize {
        let index = self.planes.len();
        self.planes.push(PlaneAnchor::new(
            AnchorId::from_u128(index as u128 + 1),
            transform,
            alignment,
            PlaneExtent::new(0.0, 0.0),
            classification,
        ));
        index
    }

    fn coarse(&self, index: usize, width: f32, height: f32) -> Anchor {
        let plane = &self.planes[index];
        PlaneAnchor::new(
            plane.id,
            plane.transform,
            plane.alignment,
            PlaneExtent::new(width, height),
            plane.classification,
        )
        .into()
    }

    fn detailed(&self, index: usize, width: f32, height: f32, sides: usize) -> Anchor {
        let mut plane = self.planes[index].clone();
        plane.extent = PlaneExtent::new(width, height);
        plane.geometry = if sides == 4 {
            PlaneGeometry::rectangle(width, height)
        } else {
            PlaneGeometry::polygon(width * 0.5, height * 0.5, sides)
        };
        plane.into()
    }

    fn reclassified(
        &mut self,
        index: usize,
        width: f32,
        height: f32,
        classification: PlaneClassification,
    ) -> Anchor {
        self.planes[index].classification = classification;
        self.detailed(index, width, height, 4)
    }

    /// Update whose triangle list points past the vertex buffer
    fn malformed(&self, index: usize, width: f32, height: f32) -> Anchor {
        let mut plane = self.planes[index].clone();
        plane.extent = PlaneExtent::new(width, height);
        plane.geometry = PlaneGeometry::rectangle(width, height);
        plane.geometry.triangle_indices.extend_from_slice(&[0, 2, 42]);
        plane.into()
    }

    fn add(&mut self, delay_ms: u64, anchors: Vec<Anchor>) {
        self.push(delay_ms, SessionEvent::AnchorsAdded(anchors));
    }

    fn update(&mut self, delay_ms: u64, anchors: Vec<Anchor>) {
        self.push(delay_ms, SessionEvent::AnchorsUpdated(anchors));
    }

    fn remove(&mut self, delay_ms: u64, indices: Vec<usize>) {
        let anchors: Vec<Anchor> = indices
            .into_iter()
            .map(|i| self.planes[i].clone().into())
            .collect();
        self.push(delay_ms, SessionEvent::AnchorsRemoved(anchors));
    }

    fn push(&mut self, delay_ms: u64, event: SessionEvent) {
        self.steps.push(RecordedStep { delay_ms, event });
    }
}
