//! Plane mesh generation

use bevy::asset::RenderAssetUsages;
use bevy::mesh::Indices;
use bevy::prelude::*;
use bevy::render::render_resource::PrimitiveTopology;
use planescope_core::{PlaneExtent, PlaneGeometry};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaneMeshError {
    #[error("Plane geometry has no vertices")]
    NoVertices,
    #[error("Plane geometry has no triangles")]
    NoTriangles,
    #[error("Triangle index count {0} is not a multiple of three")]
    IncompleteTriangle(usize),
    #[error("Triangle index {index} is outside {vertex_count} vertices")]
    IndexOutOfRange { index: i16, vertex_count: usize },
    #[error("Vertex {0} is not finite")]
    NonFiniteVertex(usize),
}

/// Rough rectangle sized to the plane's estimated extent.
///
/// Lies in the anchor's XZ plane facing +Y, `width` along X and `height`
/// along Z, centered on the anchor origin.
pub fn coarse_plane_mesh(extent: &PlaneExtent) -> Mesh {
    Mesh::from(Plane3d::new(
        Vec3::Y,
        Vec2::new(extent.width * 0.5, extent.height * 0.5),
    ))
}

/// Triangle mesh from the plane's detailed geometry
pub fn detailed_plane_mesh(geometry: &PlaneGeometry) -> Result<Mesh, PlaneMeshError> {
    let vertex_count = geometry.vertices.len();
    if vertex_count == 0 {
        return Err(PlaneMeshError::NoVertices);
    }
    if geometry.triangle_indices.is_empty() {
        return Err(PlaneMeshError::NoTriangles);
    }
    if geometry.triangle_indices.len() % 3 != 0 {
        return Err(PlaneMeshError::IncompleteTriangle(geometry.triangle_indices.len()));
    }
    if let Some(i) = geometry
        .vertices
        .iter()
        .position(|v| v.iter().any(|c| !c.is_finite()))
    {
        return Err(PlaneMeshError::NonFiniteVertex(i));
    }

    let indices = geometry
        .triangle_indices
        .iter()
        .map(|&index| match usize::try_from(index) {
            Ok(i) if i < vertex_count => Ok(i as u32),
            _ => Err(PlaneMeshError::IndexOutOfRange {
                index,
                vertex_count,
            }),
        })
        .collect::<Result<Vec<u32>, _>>()?;

    let positions = geometry.vertices.clone();
    // Plane geometry is flat in anchor space
    let normals: Vec<[f32; 3]> = vec![[0.0, 1.0, 0.0]; vertex_count];
    let uvs: Vec<[f32; 2]> = geometry.vertices.iter().map(|v| [v[0], v[2]]).collect();

    Ok(
        Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
            .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
            .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, normals)
            .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, uvs)
            .with_inserted_indices(Indices::U32(indices)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::mesh::VertexAttributeValues;

    fn span(mesh: &Mesh) -> (f32, f32) {
        let Some(VertexAttributeValues::Float32x3(positions)) =
            mesh.attribute(Mesh::ATTRIBUTE_POSITION)
        else {
            panic!("mesh has no positions");
        };
        let (mut min_x, mut max_x) = (f32::MAX, f32::MIN);
        let (mut min_z, mut max_z) = (f32::MAX, f32::MIN);
        for p in positions {
            assert_eq!(p[1], 0.0);
            min_x = min_x.min(p[0]);
            max_x = max_x.max(p[0]);
            min_z = min_z.min(p[2]);
            max_z = max_z.max(p[2]);
        }
        (max_x - min_x, max_z - min_z)
    }

    #[test]
    fn test_coarse_mesh_matches_extent() {
        let mesh = coarse_plane_mesh(&PlaneExtent::new(2.0, 3.0));
        let (width, depth) = span(&mesh);
        assert!((width - 2.0).abs() < 1e-6);
        assert!((depth - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_detailed_mesh() {
        let geometry = PlaneGeometry::polygon(1.0, 0.5, 8);
        let mesh = detailed_plane_mesh(&geometry).unwrap();

        assert_eq!(mesh.count_vertices(), 9);
        let Some(Indices::U32(indices)) = mesh.indices() else {
            panic!("expected u32 indices");
        };
        assert_eq!(indices.len(), 24);
        let (width, depth) = span(&mesh);
        assert!((width - 2.0).abs() < 1e-5);
        assert!(depth <= 1.0 + 1e-5);
    }

    #[test]
    fn test_malformed_geometry_rejected() {
        let mut geometry = PlaneGeometry::rectangle(1.0, 1.0);
        geometry.triangle_indices.push(0);
        assert_eq!(
            detailed_plane_mesh(&geometry).unwrap_err(),
            PlaneMeshError::IncompleteTriangle(7)
        );

        let mut geometry = PlaneGeometry::rectangle(1.0, 1.0);
        geometry.triangle_indices[4] = 4;
        assert_eq!(
            detailed_plane_mesh(&geometry).unwrap_err(),
            PlaneMeshError::IndexOutOfRange {
                index: 4,
                vertex_count: 4
            }
        );

        let mut geometry = PlaneGeometry::rectangle(1.0, 1.0);
        geometry.triangle_indices[0] = -1;
        assert!(matches!(
            detailed_plane_mesh(&geometry),
            Err(PlaneMeshError::IndexOutOfRange { index: -1, .. })
        ));

        let mut geometry = PlaneGeometry::rectangle(1.0, 1.0);
        geometry.vertices[2][0] = f32::NAN;
        assert_eq!(
            detailed_plane_mesh(&geometry).unwrap_err(),
            PlaneMeshError::NonFiniteVertex(2)
        );
    }

    #[test]
    fn test_empty_geometry_rejected() {
        assert_eq!(
            detailed_plane_mesh(&PlaneGeometry::default()).unwrap_err(),
            PlaneMeshError::NoVertices
        );

        let geometry = PlaneGeometry {
            vertices: vec![[0.0; 3]; 3],
            triangle_indices: Vec::new(),
        };
        assert_eq!(
            detailed_plane_mesh(&geometry).unwrap_err(),
            PlaneMeshError::NoTriangles
        );
    }
}
