//! GLB/VRM model loader using the `gltf` crate.
//!
//! Extracts meshes, skeleton hierarchy, inverse bind matrices, per-vertex
//! joint weights, and the VRM humanoid bone map from a glTF binary.

use glam::{Mat4, Quat, Vec3};
use std::collections::HashMap;
use std::path::Path;

use crate::error::AvatarError;

/// A loaded avatar model ready for rigging, CPU skinning, and GPU rendering.
pub struct AvatarModel {
    /// Per-mesh geometry
    pub meshes: Vec<MeshData>,
    /// Skeleton: node index → rest-pose local transform
    pub rest_translations: Vec<Vec3>,
    pub rest_rotations: Vec<Quat>,
    pub rest_scales: Vec<Vec3>,
    /// Parent map: child node → parent node (None if root)
    pub parents: Vec<Option<usize>>,
    /// Total number of nodes
    pub node_count: usize,
    /// Skin data (joint lists + inverse bind matrices)
    pub skins: Vec<SkinData>,
    /// Which skin each mesh uses: mesh_index → skin_index
    pub mesh_skin: HashMap<usize, usize>,
    /// VRM humanoid bone name → node index
    pub bone_to_node: HashMap<String, usize>,
}

pub struct SkinData {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// All geometry data for one mesh (potentially multiple primitives).
pub struct MeshData {
    pub primitives: Vec<PrimitiveData>,
}

/// Geometry for a single primitive.
pub struct PrimitiveData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Per-vertex joint indices (4 per vertex)
    pub joints: Vec<[u16; 4]>,
    /// Per-vertex joint weights (4 per vertex)
    pub weights: Vec<[f32; 4]>,
    /// Base color factor from material (RGBA)
    pub base_color: [f32; 4],
}

impl AvatarModel {
    /// Load a GLB/VRM file and extract all data needed for rigging and
    /// rendering.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AvatarError> {
        let path = path.as_ref();
        let (document, buffers, _images) = gltf::import(path)
            .map_err(|e| AvatarError::ModelLoad(format!("Failed to load GLB: {}", e)))?;

        let buf = &buffers;

        // Build parent map
        let node_count = document.nodes().count();
        let mut parents = vec![None; node_count];
        for node in document.nodes() {
            for child in node.children() {
                parents[child.index()] = Some(node.index());
            }
        }

        // Parse rest-pose transforms
        let mut rest_translations = Vec::with_capacity(node_count);
        let mut rest_rotations = Vec::with_capacity(node_count);
        let mut rest_scales = Vec::with_capacity(node_count);
        for node in document.nodes() {
            let (t, r, s) = node.transform().decomposed();
            rest_translations.push(Vec3::from(t));
            rest_rotations.push(Quat::from_array(r));
            rest_scales.push(Vec3::from(s));
        }

        // Parse VRM humanoid bone map from the raw GLB JSON chunk (the gltf
        // crate does not expose VRM extensions)
        let raw = std::fs::read(path)
            .map_err(|e| AvatarError::ModelLoad(format!("Failed to read GLB: {}", e)))?;
        let bone_to_node = parse_humanoid_bones(&raw)?;

        // Parse skins
        let mut skins = Vec::new();
        for skin in document.skins() {
            let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
            let reader = skin.reader(|buffer| Some(&buf[buffer.index()]));
            let ibms: Vec<Mat4> = reader
                .read_inverse_bind_matrices()
                .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
                .unwrap_or_else(|| vec![Mat4::IDENTITY; joints.len()]);

            skins.push(SkinData {
                joints,
                inverse_bind_matrices: ibms,
            });
        }

        // Map mesh → skin
        let mut mesh_skin = HashMap::new();
        for node in document.nodes() {
            if let (Some(mesh), Some(skin)) = (node.mesh(), node.skin()) {
                mesh_skin.insert(mesh.index(), skin.index());
            }
        }

        // Parse meshes
        let mut meshes = Vec::new();
        for mesh in document.meshes() {
            let mut primitives = Vec::new();

            for prim in mesh.primitives() {
                let reader = prim.reader(|buffer| Some(&buf[buffer.index()]));

                let positions: Vec<Vec3> = reader
                    .read_positions()
                    .map(|iter| iter.map(Vec3::from).collect())
                    .unwrap_or_default();

                let normals: Vec<Vec3> = reader
                    .read_normals()
                    .map(|iter| iter.map(Vec3::from).collect())
                    .unwrap_or_else(|| vec![Vec3::Y; positions.len()]);

                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|iter| iter.into_u32().collect())
                    .unwrap_or_default();

                let joints: Vec<[u16; 4]> = reader
                    .read_joints(0)
                    .map(|iter| iter.into_u16().collect())
                    .unwrap_or_else(|| vec![[0; 4]; positions.len()]);

                let weights: Vec<[f32; 4]> = reader
                    .read_weights(0)
                    .map(|iter| iter.into_f32().collect())
                    .unwrap_or_else(|| vec![[1.0, 0.0, 0.0, 0.0]; positions.len()]);

                let pbr = prim.material().pbr_metallic_roughness();
                let base_color = pbr.base_color_factor();

                primitives.push(PrimitiveData {
                    positions,
                    normals,
                    indices,
                    joints,
                    weights,
                    base_color,
                });
            }

            meshes.push(MeshData { primitives });
        }

        Ok(AvatarModel {
            meshes,
            rest_translations,
            rest_rotations,
            rest_scales,
            parents,
            node_count,
            skins,
            mesh_skin,
            bone_to_node,
        })
    }

    /// Node index of a VRM humanoid bone, if the model has it.
    pub fn bone_node(&self, name: &str) -> Option<usize> {
        self.bone_to_node.get(name).copied()
    }

    /// Compute world transforms for all nodes using forward kinematics.
    ///
    /// `local_rotations` / `local_translations`: optional per-node overrides.
    /// Nodes without overrides use their rest-pose transform.
    pub fn world_transforms(
        &self,
        local_rotations: &HashMap<usize, Quat>,
        local_translations: &HashMap<usize, Vec3>,
    ) -> Vec<Mat4> {
        let mut world = vec![Mat4::IDENTITY; self.node_count];
        let mut computed = vec![false; self.node_count];

        for i in 0..self.node_count {
            self.compute_node(local_rotations, local_translations, &mut world, &mut computed, i);
        }

        world
    }

    /// Rest-pose world transforms.
    pub fn rest_world_transforms(&self) -> Vec<Mat4> {
        self.world_transforms(&HashMap::new(), &HashMap::new())
    }

    fn compute_node(
        &self,
        local_rotations: &HashMap<usize, Quat>,
        local_translations: &HashMap<usize, Vec3>,
        world: &mut [Mat4],
        computed: &mut [bool],
        idx: usize,
    ) {
        if computed[idx] {
            return;
        }

        let t = local_translations
            .get(&idx)
            .copied()
            .unwrap_or(self.rest_translations[idx]);
        let r = local_rotations
            .get(&idx)
            .copied()
            .unwrap_or(self.rest_rotations[idx]);
        let s = self.rest_scales[idx];

        let local = Mat4::from_scale_rotation_translation(s, r, t);

        if let Some(parent) = self.parents[idx] {
            self.compute_node(local_rotations, local_translations, world, computed, parent);
            world[idx] = world[parent] * local;
        } else {
            world[idx] = local;
        }
        computed[idx] = true;
    }
}

/// Parse VRM humanoid bone names from raw GLB bytes.
///
/// Reads the JSON chunk directly: GLB is a 12-byte header (magic, version,
/// length) followed by chunks, the first of which is always JSON.
pub(crate) fn parse_humanoid_bones(
    data: &[u8],
) -> Result<HashMap<String, usize>, AvatarError> {
    let json_data = match glb_json_chunk(data) {
        Some(chunk) => chunk,
        None => return Ok(HashMap::new()),
    };

    let root: serde_json::Value = serde_json::from_slice(json_data)
        .map_err(|e| AvatarError::ModelLoad(format!("JSON parse error: {}", e)))?;

    let mut map = HashMap::new();

    // Try VRMC_vrm (VRM 1.0)
    if let Some(vrmc) = root.get("extensions").and_then(|e| e.get("VRMC_vrm")) {
        if let Some(bones) = vrmc
            .get("humanoid")
            .and_then(|h| h.get("humanBones"))
            .and_then(|b| b.as_object())
        {
            for (bone_name, data) in bones {
                if let Some(node_idx) = data.get("node").and_then(|n| n.as_u64()) {
                    map.insert(bone_name.clone(), node_idx as usize);
                }
            }
        }
    }

    // Fallback: VRM 0.x format
    if map.is_empty() {
        if let Some(vrm_ext) = root.get("extensions").and_then(|e| e.get("VRM")) {
            if let Some(bones) = vrm_ext
                .get("humanoid")
                .and_then(|h| h.get("humanBones"))
                .and_then(|b| b.as_array())
            {
                for bone in bones {
                    if let (Some(name), Some(node)) = (
                        bone.get("bone").and_then(|b| b.as_str()),
                        bone.get("node").and_then(|n| n.as_u64()),
                    ) {
                        // VRM 0.x uses PascalCase bone names
                        map.insert(camel_to_lower(name), node as usize);
                    }
                }
            }
        }
    }

    Ok(map)
}

/// Extract the JSON chunk from GLB bytes, if present and well-formed.
fn glb_json_chunk(data: &[u8]) -> Option<&[u8]> {
    // Header: magic(4) + version(4) + length(4)
    // Chunk: length(4) + type(4) + data(length)
    if data.len() < 20 {
        return None;
    }

    let json_length = u32::from_le_bytes([data[12], data[13], data[14], data[15]]) as usize;
    if data.len() < 20 + json_length {
        return None;
    }

    Some(&data[20..20 + json_length])
}

/// Convert VRM 0.x PascalCase bone names to VRM 1.0 format.
fn camel_to_lower(s: &str) -> String {
    // VRM 0.x: "Head" → "head", "LeftUpperArm" → "leftUpperArm"
    let mut result = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        if i == 0 {
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wrap a JSON string in a minimal GLB container.
    fn glb_bytes(json: &str) -> Vec<u8> {
        let json = json.as_bytes();
        let mut data = Vec::new();
        data.extend_from_slice(b"glTF");
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&((20 + json.len()) as u32).to_le_bytes());
        data.extend_from_slice(&(json.len() as u32).to_le_bytes());
        data.extend_from_slice(b"JSON");
        data.extend_from_slice(json);
        data
    }

    #[test]
    fn test_parse_vrm1_bones() {
        let json = r#"{
            "extensions": {
                "VRMC_vrm": {
                    "humanoid": {
                        "humanBones": {
                            "hips": {"node": 3},
                            "leftUpperArm": {"node": 10}
                        }
                    }
                }
            }
        }"#;

        let map = parse_humanoid_bones(&glb_bytes(json)).unwrap();
        assert_eq!(map.get("hips"), Some(&3));
        assert_eq!(map.get("leftUpperArm"), Some(&10));
    }

    #[test]
    fn test_parse_vrm0_bones() {
        let json = r#"{
            "extensions": {
                "VRM": {
                    "humanoid": {
                        "humanBones": [
                            {"bone": "Hips", "node": 1},
                            {"bone": "LeftUpperArm", "node": 7}
                        ]
                    }
                }
            }
        }"#;

        let map = parse_humanoid_bones(&glb_bytes(json)).unwrap();
        assert_eq!(map.get("hips"), Some(&1));
        assert_eq!(map.get("leftUpperArm"), Some(&7));
    }

    #[test]
    fn test_parse_no_vrm_extension() {
        let map = parse_humanoid_bones(&glb_bytes(r#"{"asset":{"version":"2.0"}}"#)).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_parse_truncated_glb() {
        let map = parse_humanoid_bones(b"glTF").unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_camel_to_lower() {
        assert_eq!(camel_to_lower("Head"), "head");
        assert_eq!(camel_to_lower("LeftUpperArm"), "leftUpperArm");
        assert_eq!(camel_to_lower("hips"), "hips");
    }

    /// Three-node chain: root at origin, child offset (0, 1, 0), grandchild
    /// offset (1, 0, 0).
    fn chain_model() -> AvatarModel {
        AvatarModel {
            meshes: vec![],
            rest_translations: vec![
                Vec3::ZERO,
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
            rest_rotations: vec![Quat::IDENTITY; 3],
            rest_scales: vec![Vec3::ONE; 3],
            parents: vec![None, Some(0), Some(1)],
            node_count: 3,
            skins: vec![],
            mesh_skin: HashMap::new(),
            bone_to_node: HashMap::from([("hips".to_string(), 0)]),
        }
    }

    #[test]
    fn test_world_transforms_rest_pose() {
        let model = chain_model();
        let world = model.rest_world_transforms();

        assert_eq!(world.len(), 3);
        assert!(world[1].col(3).truncate().abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-6));
        assert!(world[2].col(3).truncate().abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_world_transforms_rotation_propagates() {
        let model = chain_model();

        // Rotate the middle node 90° about Z: the grandchild's local +X
        // offset should become world +Y.
        let rotations =
            HashMap::from([(1usize, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2))]);
        let world = model.world_transforms(&rotations, &HashMap::new());

        let pos = world[2].col(3).truncate();
        assert!(
            pos.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5),
            "grandchild should rotate with its parent, got {pos:?}"
        );
    }

    #[test]
    fn test_world_transforms_translation_override() {
        let model = chain_model();

        let translations = HashMap::from([(0usize, Vec3::new(0.0, 0.5, 0.0))]);
        let world = model.world_transforms(&HashMap::new(), &translations);

        assert!(world[0].col(3).truncate().abs_diff_eq(Vec3::new(0.0, 0.5, 0.0), 1e-6));
        assert!(world[2].col(3).truncate().abs_diff_eq(Vec3::new(1.0, 1.5, 0.0), 1e-6));
    }

    #[test]
    fn test_bone_node_lookup() {
        let model = chain_model();
        assert_eq!(model.bone_node("hips"), Some(0));
        assert_eq!(model.bone_node("head"), None);
    }
}
