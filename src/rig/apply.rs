//! Damped application of solved rig targets.
//!
//! The solver produces target rotations; this module owns the avatar's
//! current pose and moves it toward those targets one interpolation step per
//! detection result. Rotations advance by spherical interpolation, the hips
//! position by linear interpolation, so jittery tracking never snaps the
//! skeleton.

use glam::{Quat, Vec3};
use std::collections::HashMap;

use crate::avatar::AvatarModel;
use crate::config::RigTuning;
use crate::rig::solver::RigTargets;

/// The avatar's current driven pose.
pub struct BoneRig {
    /// Current local rotation per driven node
    rotations: HashMap<usize, Quat>,
    /// Current hips local translation (None until first solved target)
    hips_translation: Option<Vec3>,
    hips_node: Option<usize>,
}

impl BoneRig {
    pub fn new(model: &AvatarModel) -> Self {
        Self {
            rotations: HashMap::new(),
            hips_translation: None,
            hips_node: model.bone_node("hips"),
        }
    }

    /// Advance the pose one damped step toward the solved targets.
    pub fn advance(&mut self, model: &AvatarModel, targets: &RigTargets, tuning: &RigTuning) {
        for (&node, &target) in &targets.rotations {
            let current = self
                .rotations
                .get(&node)
                .copied()
                .unwrap_or(model.rest_rotations[node]);
            self.rotations
                .insert(node, current.slerp(target, tuning.rotation_lerp));
        }

        if let (Some(target), Some(hips)) = (targets.hips_translation, self.hips_node) {
            let current = self
                .hips_translation
                .unwrap_or(model.rest_translations[hips]);
            self.hips_translation = Some(current.lerp(target, tuning.hips_position_lerp));
        }
    }

    /// Current rotation overrides for forward kinematics.
    pub fn rotations(&self) -> &HashMap<usize, Quat> {
        &self.rotations
    }

    /// Current translation overrides for forward kinematics.
    pub fn translations(&self) -> HashMap<usize, Vec3> {
        match (self.hips_node, self.hips_translation) {
            (Some(node), Some(t)) => HashMap::from([(node, t)]),
            _ => HashMap::new(),
        }
    }

    /// Drop back to the rest pose.
    pub fn reset(&mut self) {
        self.rotations.clear();
        self.hips_translation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_model() -> AvatarModel {
        AvatarModel {
            meshes: vec![],
            rest_translations: vec![Vec3::new(0.0, 0.9, 0.0), Vec3::new(0.0, 0.1, 0.0)],
            rest_rotations: vec![Quat::IDENTITY; 2],
            rest_scales: vec![Vec3::ONE; 2],
            parents: vec![None, Some(0)],
            node_count: 2,
            skins: vec![],
            mesh_skin: HashMap::new(),
            bone_to_node: HashMap::from([
                ("hips".to_string(), 0),
                ("spine".to_string(), 1),
            ]),
        }
    }

    fn target_quat() -> Quat {
        Quat::from_rotation_z(1.0)
    }

    #[test]
    fn test_advance_moves_fraction_toward_target() {
        let model = tiny_model();
        let mut rig = BoneRig::new(&model);
        let tuning = RigTuning::default();

        let targets = RigTargets {
            rotations: HashMap::from([(1usize, target_quat())]),
            hips_translation: None,
        };

        rig.advance(&model, &targets, &tuning);
        let rot = rig.rotations()[&1];
        let angle = Quat::IDENTITY.angle_between(rot);

        // One step covers rotation_lerp of the way from rest
        assert!(
            (angle - 1.0 * tuning.rotation_lerp).abs() < 0.02,
            "expected ~{} rad after one step, got {angle}",
            1.0 * tuning.rotation_lerp
        );
    }

    #[test]
    fn test_advance_converges() {
        let model = tiny_model();
        let mut rig = BoneRig::new(&model);
        let tuning = RigTuning::default();

        let targets = RigTargets {
            rotations: HashMap::from([(1usize, target_quat())]),
            hips_translation: Some(Vec3::new(0.2, 1.0, 0.0)),
        };

        for _ in 0..200 {
            rig.advance(&model, &targets, &tuning);
        }

        let rot = rig.rotations()[&1];
        assert!(
            rot.angle_between(target_quat()) < 1e-2,
            "repeated steps should converge to the target rotation"
        );

        let t = rig.translations()[&0];
        assert!(t.abs_diff_eq(Vec3::new(0.2, 1.0, 0.0), 1e-3));
    }

    #[test]
    fn test_advance_leaves_other_nodes_alone() {
        let model = tiny_model();
        let mut rig = BoneRig::new(&model);

        let targets = RigTargets {
            rotations: HashMap::from([(1usize, target_quat())]),
            hips_translation: None,
        };
        rig.advance(&model, &targets, &RigTuning::default());

        assert!(!rig.rotations().contains_key(&0));
        assert!(rig.translations().is_empty());
    }

    #[test]
    fn test_hips_translation_lerp_rate() {
        let model = tiny_model();
        let mut rig = BoneRig::new(&model);
        let tuning = RigTuning::default();

        let target = Vec3::new(1.0, 0.9, 0.0);
        let targets = RigTargets {
            rotations: HashMap::new(),
            hips_translation: Some(target),
        };

        rig.advance(&model, &targets, &tuning);
        let t = rig.translations()[&0];

        // Starts at rest (0, 0.9, 0); one step covers hips_position_lerp of
        // the distance
        assert!((t.x - tuning.hips_position_lerp).abs() < 1e-5);
        assert!((t.y - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_reset() {
        let model = tiny_model();
        let mut rig = BoneRig::new(&model);

        let targets = RigTargets {
            rotations: HashMap::from([(1usize, target_quat())]),
            hips_translation: Some(Vec3::ONE),
        };
        rig.advance(&model, &targets, &RigTuning::default());
        rig.reset();

        assert!(rig.rotations().is_empty());
        assert!(rig.translations().is_empty());
    }
}
