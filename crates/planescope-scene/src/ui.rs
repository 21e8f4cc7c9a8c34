//! Classification legend overlay

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use planescope_core::{PlaneAlignment, PlaneClassification};

use crate::appearance::debug_color;
use crate::relay::{PlaneAnchorMap, RelayStats, RenderAnchor};

/// Plugin drawing the legend panel
pub struct LegendPlugin;

impl Plugin for LegendPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(EguiPrimaryContextPass, legend_system);
    }
}

/// Number of live render anchors per classification, in legend order
pub fn classification_counts<'a>(
    anchors: impl Iterator<Item = &'a RenderAnchor>,
) -> [(PlaneClassification, usize); 8] {
    let mut counts = PlaneClassification::ALL.map(|c| (c, 0));
    for anchor in anchors {
        if let Some(entry) = counts.iter_mut().find(|(c, _)| *c == anchor.classification) {
            entry.1 += 1;
        }
    }
    counts
}

/// Number of live render anchors as (horizontal, vertical)
pub fn alignment_counts<'a>(anchors: impl Iterator<Item = &'a RenderAnchor>) -> (usize, usize) {
    anchors.fold((0, 0), |(horizontal, vertical), anchor| match anchor.alignment {
        PlaneAlignment::Horizontal => (horizontal + 1, vertical),
        PlaneAlignment::Vertical => (horizontal, vertical + 1),
    })
}

fn swatch(classification: PlaneClassification) -> egui::Color32 {
    let srgba = debug_color(classification).to_srgba();
    egui::Color32::from_rgb(
        (srgba.red * 255.0) as u8,
        (srgba.green * 255.0) as u8,
        (srgba.blue * 255.0) as u8,
    )
}

fn legend_system(
    mut contexts: EguiContexts,
    anchors: Query<&RenderAnchor>,
    anchor_map: Res<PlaneAnchorMap>,
    stats: Res<RelayStats>,
) {
    let Ok(ctx) = contexts.ctx_mut() else { return };

    egui::Window::new("Surfaces")
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(12.0, 12.0))
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            for (classification, count) in classification_counts(anchors.iter()) {
                ui.horizontal(|ui| {
                    let (rect, _) =
                        ui.allocate_exact_size(egui::vec2(14.0, 14.0), egui::Sense::hover());
                    ui.painter().rect_filled(rect, 2.0, swatch(classification));
                    ui.label(classification.label());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(count.to_string());
                    });
                });
            }

            ui.separator();
            let (horizontal, vertical) = alignment_counts(anchors.iter());
            ui.label(format!(
                "Tracked planes: {} ({} horizontal, {} vertical)",
                anchor_map.len(),
                horizontal,
                vertical
            ));
            ui.label(
                egui::RichText::new(format!(
                    "+{} ~{} -{}  ignored {}  stale meshes {}",
                    stats.added, stats.updated, stats.removed, stats.ignored, stats.failed_rebuilds
                ))
                .small()
                .color(egui::Color32::GRAY),
            );
        });
}
