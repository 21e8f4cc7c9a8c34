//! Classification to appearance lookup

use bevy::prelude::*;
use bevy::render::alpha::AlphaMode;
use planescope_core::PlaneClassification;
use std::collections::HashMap;

/// Opacity of every plane fill
pub const PLANE_ALPHA: f32 = 0.9;

/// Base color for a plane classification
pub fn debug_color(classification: PlaneClassification) -> Color {
    match classification {
        PlaneClassification::Ceiling => Color::srgb(0.0, 0.0, 1.0),
        PlaneClassification::Door => Color::srgb(1.0, 0.0, 1.0),
        PlaneClassification::Floor => Color::srgb(1.0, 0.0, 0.0),
        PlaneClassification::Seat => Color::srgb(0.0, 1.0, 0.0),
        PlaneClassification::Table => Color::srgb(1.0, 1.0, 0.0),
        PlaneClassification::Wall => Color::srgb(0.0, 1.0, 1.0),
        PlaneClassification::Window => Color::srgb(1.0, 1.0, 1.0),
        PlaneClassification::Unknown => Color::srgb(0.5, 0.5, 0.5),
    }
}

/// Translucent, non-metallic fill for a plane classification
pub fn debug_material(classification: PlaneClassification) -> StandardMaterial {
    StandardMaterial {
        base_color: debug_color(classification).with_alpha(PLANE_ALPHA),
        metallic: 0.0,
        perceptual_roughness: 0.8,
        alpha_mode: AlphaMode::Blend,
        cull_mode: None, // Visible from below the floor and behind walls
        double_sided: true,
        ..default()
    }
}

/// One shared material per classification
#[derive(Resource, Default)]
pub struct PlaneMaterials {
    handles: HashMap<PlaneClassification, Handle<StandardMaterial>>,
}

impl PlaneMaterials {
    pub fn material_for(
        &mut self,
        classification: PlaneClassification,
        materials: &mut Assets<StandardMaterial>,
    ) -> Handle<StandardMaterial> {
        self.handles
            .entry(classification)
            .or_insert_with(|| materials.add(debug_material(classification)))
            .clone()
    }
}
