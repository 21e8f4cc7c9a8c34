//! Orbit camera for inspecting the detected room

use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::prelude::*;
use bevy_egui::EguiContexts;

/// Camera controller settings
#[derive(Debug, Clone, Resource)]
pub struct CameraSettings {
    pub distance: f32,
    pub target_distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            distance: 6.5,
            target_distance: 6.5,
            azimuth: 0.9,
            elevation: 0.6,
            target: Vec3::new(0.0, 1.0, 0.0),
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
        }
    }
}

impl CameraSettings {
    /// Camera position for the current orbit (Y up)
    pub fn eye(&self) -> Vec3 {
        let x = self.distance * self.azimuth.sin() * self.elevation.cos();
        let y = self.distance * self.elevation.sin();
        let z = self.distance * self.azimuth.cos() * self.elevation.cos();
        self.target + Vec3::new(x, y, z)
    }
}

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Plugin for camera controls
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraSettings>()
            .add_systems(Update, orbit_camera);
    }
}

fn orbit_camera(
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
    mut settings: ResMut<CameraSettings>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    time: Res<Time>,
    mut contexts: EguiContexts,
) {
    // Leave the pointer to the legend when it is hovered
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false);

    let mut total_motion = Vec2::ZERO;
    for motion in mouse_motion.read() {
        total_motion += motion.delta;
    }

    if mouse_button.pressed(MouseButton::Left) && !egui_wants_pointer {
        settings.azimuth -= total_motion.x * settings.sensitivity;
        settings.elevation =
            (settings.elevation + total_motion.y * settings.sensitivity).clamp(-1.4, 1.4);
    }

    for scroll in mouse_wheel.read() {
        if egui_wants_pointer {
            continue;
        }
        let zoom_factor = 1.0 - scroll.y * settings.zoom_speed;
        settings.target_distance = (settings.target_distance * zoom_factor).clamp(0.5, 30.0);
    }

    let dt = time.delta_secs();
    let lerp_factor = 1.0 - (-settings.smooth_factor * 60.0 * dt).exp();
    settings.distance += (settings.target_distance - settings.distance) * lerp_factor;

    if let Ok(mut transform) = camera_query.single_mut() {
        transform.translation = settings.eye();
        transform.look_at(settings.target, Vec3::Y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eye_keeps_distance() {
        let settings = CameraSettings::default();
        let eye = settings.eye();
        assert!((eye.distance(settings.target) - settings.distance).abs() < 1e-4);
        assert!(eye.y > settings.target.y);
    }
}
