//! CPU skinning: linear blend skinning (LBS) for avatar meshes.
//!
//! Forward kinematics lives on `AvatarModel::world_transforms`; this module
//! deforms vertices against the resulting joint matrices.

#![cfg(feature = "native-ui")]

use glam::{Mat4, Vec3, Vec4};

use crate::avatar::AvatarModel;

/// Apply linear blend skinning to vertex positions.
///
/// `mesh_idx`: which mesh to skin
/// `vertices_per_prim`: base positions for each primitive
/// `world_transforms`: from `AvatarModel::world_transforms`
///
/// Returns skinned positions for each primitive. Meshes without a skin pass
/// through unchanged.
pub fn skin_vertices(
    model: &AvatarModel,
    mesh_idx: usize,
    vertices_per_prim: &[Vec<Vec3>],
    world_transforms: &[Mat4],
) -> Vec<Vec<Vec3>> {
    let skin_idx = match model.mesh_skin.get(&mesh_idx) {
        Some(&s) => s,
        None => return vertices_per_prim.to_vec(),
    };

    let skin = &model.skins[skin_idx];

    // Precompute joint matrices: world[joint_node] * inverse_bind_matrix
    let joint_matrices: Vec<Mat4> = skin
        .joints
        .iter()
        .zip(skin.inverse_bind_matrices.iter())
        .map(|(&node_idx, ibm)| world_transforms[node_idx] * *ibm)
        .collect();

    let mesh = &model.meshes[mesh_idx];
    let mut result = Vec::with_capacity(mesh.primitives.len());

    for (prim_idx, prim) in mesh.primitives.iter().enumerate() {
        let base_verts = &vertices_per_prim[prim_idx];
        let mut skinned = vec![Vec3::ZERO; base_verts.len()];

        for (v_idx, pos) in base_verts.iter().enumerate() {
            let j = prim.joints[v_idx];
            let w = prim.weights[v_idx];
            let p = Vec4::new(pos.x, pos.y, pos.z, 1.0);

            let mut result_pos = Vec4::ZERO;
            for k in 0..4 {
                if w[k] < 0.0001 {
                    continue;
                }
                let jm = joint_matrices[j[k] as usize];
                result_pos += w[k] * (jm * p);
            }

            skinned[v_idx] = result_pos.truncate();
        }

        result.push(skinned);
    }

    result
}

/// Convenience: get base (rest) positions for a mesh.
pub fn base_positions(model: &AvatarModel, mesh_idx: usize) -> Vec<Vec<Vec3>> {
    model.meshes[mesh_idx]
        .primitives
        .iter()
        .map(|p| p.positions.clone())
        .collect()
}
