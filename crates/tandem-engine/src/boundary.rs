//! Mesh boundary verification.

use tandem_core::{FieldDescriptor, FieldId, GeometryChecker, MeshError, MeshSummary};

/// Check that every boundary edge of `mesh` exists in the geometry and
/// carries a boundary condition for every field.
///
/// Fails on the first field with unassigned edges, listing all of that
/// field's offending edges in ascending order.
pub fn verify_boundaries<'a>(
    mesh: &MeshSummary,
    geometry: &dyn GeometryChecker,
    fields: impl IntoIterator<Item = (FieldId, &'a FieldDescriptor)>,
) -> Result<(), MeshError> {
    let edges = geometry.edge_count();
    if let Some(&marker) = mesh.boundary_markers.iter().find(|&&m| m >= edges) {
        return Err(MeshError::MarkerOutOfRange { marker, edges });
    }

    let mut markers = mesh.boundary_markers.clone();
    markers.sort_unstable();
    markers.dedup();

    for (id, field) in fields {
        let missing: Vec<usize> = markers
            .iter()
            .copied()
            .filter(|&edge| !geometry.boundary_assigned(id, edge))
            .collect();
        if !missing.is_empty() {
            return Err(MeshError::MissingBoundaryMarker {
                field: field.name().to_string(),
                edges: missing,
            });
        }
    }
    Ok(())
}
