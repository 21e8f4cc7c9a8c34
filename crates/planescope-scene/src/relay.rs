//! Session relay - plane anchor notifications into scene entities
//!
//! Notifications arrive from the tracking thread through [`SessionFeed`].
//! The relay applies them on the main schedule: anchor entities are spawned,
//! moved, and despawned right away, while mesh and material rebuilds are
//! queued on [`PendingPlaneRefreshes`] and applied in a later stage.

use bevy::prelude::*;
use planescope_core::{
    Anchor, AnchorId, PlaneAlignment, PlaneAnchor, PlaneClassification, PlaneGeometry, Pose,
    SessionDelegate, SessionEvents,
};
use std::collections::HashMap;
use tracing::debug;

use crate::appearance::PlaneMaterials;
use crate::mesh::{coarse_plane_mesh, detailed_plane_mesh};

/// Scene entity standing in for one detected plane
#[derive(Component, Debug)]
pub struct RenderAnchor {
    pub anchor_id: AnchorId,
    /// The single mesh child of this anchor
    pub model: Entity,
    pub classification: PlaneClassification,
    pub alignment: PlaneAlignment,
}

/// Marker for the mesh child of a render anchor
#[derive(Component)]
pub struct PlaneModel;

/// Tracking identity to render anchor entity
#[derive(Resource, Default, Debug)]
pub struct PlaneAnchorMap {
    entities: HashMap<AnchorId, Entity>,
}

impl PlaneAnchorMap {
    pub fn get(&self, id: &AnchorId) -> Option<Entity> {
        self.entities.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &AnchorId> {
        self.entities.keys()
    }

    fn insert(&mut self, id: AnchorId, entity: Entity) -> Option<Entity> {
        self.entities.insert(id, entity)
    }

    fn remove(&mut self, id: &AnchorId) -> Option<Entity> {
        self.entities.remove(id)
    }
}

/// Mesh and material rebuild waiting for the scene's update stage
#[derive(Debug, Clone)]
pub struct PlaneRefresh {
    pub anchor_id: AnchorId,
    /// Render anchor the update was relayed to
    pub entity: Entity,
    pub geometry: PlaneGeometry,
    pub classification: PlaneClassification,
}

#[derive(Resource, Default, Debug)]
pub struct PendingPlaneRefreshes {
    queue: Vec<PlaneRefresh>,
}

impl PendingPlaneRefreshes {
    pub fn push(&mut self, refresh: PlaneRefresh) {
        self.queue.push(refresh);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn drain(&mut self) -> Vec<PlaneRefresh> {
        std::mem::take(&mut self.queue)
    }
}

/// Notification queue of the attached tracking session
#[derive(Resource)]
pub struct SessionFeed(pub SessionEvents);

/// Relay counters shown in the legend
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Updates and removals for planes without a render anchor
    pub ignored: usize,
    /// Detailed meshes that could not be built
    pub failed_rebuilds: usize,
}

pub struct PlaneRelayPlugin;

impl Plugin for PlaneRelayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlaneAnchorMap>()
            .init_resource::<PendingPlaneRefreshes>()
            .init_resource::<PlaneMaterials>()
            .init_resource::<RelayStats>()
            .add_systems(PreUpdate, drain_session_feed)
            .add_systems(Update, apply_plane_refreshes);
    }
}

pub fn pose_to_transform(pose: &Pose) -> Transform {
    Transform::from_matrix(Mat4::from_cols_array(&pose.to_cols_array()))
}

/// Session delegate applying notifications directly to the scene world
pub struct SessionRelay<'w> {
    world: &'w mut World,
}

impl<'w> SessionRelay<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self { world }
    }

    fn add_plane(&mut self, plane: &PlaneAnchor) {
        if let Some(previous) = self.world.resource_mut::<PlaneAnchorMap>().remove(&plane.id) {
            debug!(anchor = %plane.id, "Plane added again, replacing its render anchor");
            self.world.despawn(previous);
        }

        let mesh = self
            .world
            .resource_mut::<Assets<Mesh>>()
            .add(coarse_plane_mesh(&plane.extent));
        let material = self.material_for(plane.classification);

        let model = self
            .world
            .spawn((
                PlaneModel,
                Mesh3d(mesh),
                MeshMaterial3d(material),
                Transform::default(),
            ))
            .id();
        let entity = self
            .world
            .spawn((
                RenderAnchor {
                    anchor_id: plane.id,
                    model,
                    classification: plane.classification,
                    alignment: plane.alignment,
                },
                pose_to_transform(&plane.transform),
                Visibility::default(),
            ))
            .add_child(model)
            .id();

        self.world
            .resource_mut::<PlaneAnchorMap>()
            .insert(plane.id, entity);
        self.world.resource_mut::<RelayStats>().added += 1;

        debug!(
            anchor = %plane.id,
            classification = %plane.classification,
            position = ?plane.transform.translation(),
            width = plane.extent.width,
            height = plane.extent.height,
            "Plane added"
        );
    }

    fn update_plane(&mut self, plane: &PlaneAnchor) {
        let Some(entity) = self.world.resource::<PlaneAnchorMap>().get(&plane.id) else {
            self.world.resource_mut::<RelayStats>().ignored += 1;
            debug!(anchor = %plane.id, "Update for unknown plane ignored");
            return;
        };

        if let Some(mut transform) = self.world.get_mut::<Transform>(entity) {
            *transform = pose_to_transform(&plane.transform);
        }

        self.world
            .resource_mut::<PendingPlaneRefreshes>()
            .push(PlaneRefresh {
                anchor_id: plane.id,
                entity,
                geometry: plane.geometry.clone(),
                classification: plane.classification,
            });
        self.world.resource_mut::<RelayStats>().updated += 1;
    }

    fn remove_plane(&mut self, id: AnchorId) {
        let Some(entity) = self.world.resource_mut::<PlaneAnchorMap>().remove(&id) else {
            self.world.resource_mut::<RelayStats>().ignored += 1;
            debug!(anchor = %id, "Removal of unknown plane ignored");
            return;
        };

        // Despawning the anchor takes its mesh child with it
        self.world.despawn(entity);
        self.world.resource_mut::<RelayStats>().removed += 1;
        debug!(anchor = %id, "Plane removed");
    }

    fn material_for(&mut self, classification: PlaneClassification) -> Handle<StandardMaterial> {
        self.world
            .resource_scope(|world, mut palette: Mut<PlaneMaterials>| {
                let mut materials = world.resource_mut::<Assets<StandardMaterial>>();
                palette.material_for(classification, &mut materials)
            })
    }
}

impl SessionDelegate for SessionRelay<'_> {
    fn session_did_add(&mut self, anchors: &[Anchor]) {
        for plane in anchors.iter().filter_map(Anchor::as_plane) {
            self.add_plane(plane);
        }
    }

    fn session_did_update(&mut self, anchors: &[Anchor]) {
        for plane in anchors.iter().filter_map(Anchor::as_plane) {
            self.update_plane(plane);
        }
    }

    fn session_did_remove(&mut self, anchors: &[Anchor]) {
        for plane in anchors.iter().filter_map(Anchor::as_plane) {
            self.remove_plane(plane.id);
        }
    }
}

/// Relay every queued session notification into the world
pub fn drain_session_feed(world: &mut World) {
    let events = match world.get_resource::<SessionFeed>() {
        Some(feed) => feed.0.drain(),
        None => return,
    };

    let mut relay = SessionRelay::new(world);
    for event in &events {
        relay.dispatch(event);
    }
}

/// Rebuild meshes and materials queued by plane updates
fn apply_plane_refreshes(
    mut pending: ResMut<PendingPlaneRefreshes>,
    anchor_map: Res<PlaneAnchorMap>,
    mut anchors: Query<&mut RenderAnchor>,
    mut models: Query<(&mut Mesh3d, &mut MeshMaterial3d<StandardMaterial>), With<PlaneModel>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut palette: ResMut<PlaneMaterials>,
    mut stats: ResMut<RelayStats>,
) {
    for refresh in pending.drain() {
        // The plane may have been removed, or removed and added again, since
        // the update was queued
        if anchor_map.get(&refresh.anchor_id) != Some(refresh.entity) {
            debug!(anchor = %refresh.anchor_id, "Dropping refresh for a replaced plane");
            continue;
        }
        let Ok(mut anchor) = anchors.get_mut(refresh.entity) else {
            continue;
        };
        let Ok((mut mesh, mut material)) = models.get_mut(anchor.model) else {
            continue;
        };

        match detailed_plane_mesh(&refresh.geometry) {
            Ok(detailed) => {
                debug!(
                    anchor = %refresh.anchor_id,
                    triangles = refresh.geometry.triangle_count(),
                    "Plane mesh rebuilt"
                );
                mesh.0 = meshes.add(detailed);
            }
            Err(err) => {
                stats.failed_rebuilds += 1;
                debug!(anchor = %refresh.anchor_id, error = %err, "Keeping previous plane mesh");
            }
        }

        if anchor.classification != refresh.classification {
            debug!(
                anchor = %refresh.anchor_id,
                from = %anchor.classification,
                to = %refresh.classification,
                "Plane reclassified"
            );
            anchor.classification = refresh.classification;
        }
        material.0 = palette.material_for(refresh.classification, &mut materials);
    }
}
