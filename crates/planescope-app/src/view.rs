//! View owner: attaches the tracking session and hosts the plane scene

use bevy::prelude::*;
use bevy::winit::WinitSettings;
use bevy_egui::EguiPlugin;
use planescope_core::{
    event_channel, Recording, SessionEvents, SessionOptions, TrackingSession,
    WorldTrackingConfiguration,
};
use planescope_scene::{CameraSettings, LegendPlugin, MainCamera, PlaneScenePlugin, SessionFeed};
use tracing::{error, info};

use crate::config::Config;

/// Settings the view is constructed with
#[derive(Debug, Clone)]
pub struct ViewSettings {
    pub title: String,
    pub keep_awake: bool,
    pub show_legend: bool,
    pub tracking: WorldTrackingConfiguration,
    pub options: SessionOptions,
}

impl From<&Config> for ViewSettings {
    fn from(config: &Config) -> Self {
        Self {
            title: config.display.title.clone(),
            keep_awake: config.display.keep_awake,
            show_legend: config.display.show_legend,
            tracking: config.tracking_configuration(),
            options: config.session_options(),
        }
    }
}

/// Owns the session for the lifetime of the scene
pub struct PlaneView {
    settings: ViewSettings,
    recording: Recording,
}

impl PlaneView {
    pub fn new(settings: ViewSettings, recording: Recording) -> Self {
        Self {
            settings,
            recording,
        }
    }
}

/// Session waiting to be started on attach
#[derive(Resource)]
struct PendingSession {
    recording: Recording,
    tracking: WorldTrackingConfiguration,
    options: SessionOptions,
}

impl Plugin for PlaneView {
    fn build(&self, app: &mut App) {
        let winit = if self.settings.keep_awake {
            WinitSettings::game()
        } else {
            WinitSettings::desktop_app()
        };

        app.insert_resource(winit)
            .insert_resource(PendingSession {
                recording: self.recording.clone(),
                tracking: self.settings.tracking,
                options: self.settings.options,
            })
            .add_plugins(PlaneScenePlugin)
            .add_systems(Startup, (setup_scene, attach_session));

        if self.settings.show_legend {
            app.add_plugins(LegendPlugin);
        }
    }
}

fn setup_scene(mut commands: Commands, camera: Res<CameraSettings>) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_translation(camera.eye()).looking_at(camera.target, Vec3::Y),
        MainCamera,
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 8000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        PointLight {
            intensity: 400_000.0,
            range: 20.0,
            ..default()
        },
        Transform::from_xyz(0.0, 2.4, 0.0),
    ));
}

fn attach_session(world: &mut World) {
    let Some(pending) = world.remove_resource::<PendingSession>() else {
        return;
    };

    info!(
        recording = %pending.recording.name,
        horizontal = pending.tracking.plane_detection.horizontal,
        vertical = pending.tracking.plane_detection.vertical,
        "Attaching tracking session"
    );

    let events = start_tracking(pending);
    world.insert_resource(SessionFeed(events));
}

/// Run the tracking session on its own thread, returning the feed it delivers into
fn start_tracking(pending: PendingSession) -> SessionEvents {
    let (mut delegate, events) = event_channel();

    let spawned = std::thread::Builder::new()
        .name("tracking-session".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(error = %e, "Failed to start tracking runtime");
                    return;
                }
            };

            let mut session = TrackingSession::new(pending.recording, pending.options);
            let summary = runtime.block_on(session.run(pending.tracking, &mut delegate));
            info!(
                steps = summary.steps,
                added = summary.added,
                updated = summary.updated,
                removed = summary.removed,
                "Tracking session ended"
            );
        });

    if let Err(e) = spawned {
        error!(error = %e, "Failed to spawn tracking thread");
    }

    events
}

/// Open the window and run the viewer until it is closed
pub fn run(config: &Config, recording: Recording) -> AppExit {
    let settings = ViewSettings::from(config);

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.08, 0.08, 0.1)))
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: settings.title.clone(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(PlaneView::new(settings, recording))
        .run()
}
