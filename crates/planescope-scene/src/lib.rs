//! planescope scene - detected planes as colored meshes
//!
//! This crate turns the anchor notifications of a tracking session into
//! Bevy entities: one render anchor per detected plane, each holding a
//! single mesh styled by the plane's classification.

pub mod appearance;
pub mod camera;
pub mod mesh;
pub mod relay;
pub mod ui;

use bevy::prelude::*;

/// Plugin that sets up the plane relay and viewer controls
pub struct PlaneScenePlugin;

impl Plugin for PlaneScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(relay::PlaneRelayPlugin)
            .add_plugins(camera::CameraPlugin);
    }
}

// Re-export commonly used types
pub use appearance::{debug_color, debug_material, PlaneMaterials, PLANE_ALPHA};
pub use camera::{CameraSettings, MainCamera};
pub use mesh::{coarse_plane_mesh, detailed_plane_mesh, PlaneMeshError};
pub use relay::{
    PendingPlaneRefreshes, PlaneAnchorMap, PlaneModel, PlaneRefresh, PlaneRelayPlugin,
    RelayStats, RenderAnchor, SessionFeed, SessionRelay,
};
pub use ui::LegendPlugin;
