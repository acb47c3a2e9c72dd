//! Limb-direction rig solver.
//!
//! Converts world-space pose landmarks into VRM bone rotations by comparing
//! tracked limb directions against rest-pose directions. Uses hierarchical
//! solve so that lower segments see the already-rotated upper segment,
//! applies elbow pole-vector correction, and computes torso and hips
//! orientation from shoulder + hip landmarks. Also derives a target hips
//! translation from the image-space hip midpoint.

use glam::{Mat3, Mat4, Quat, Vec3};
use std::collections::HashMap;

use crate::avatar::AvatarModel;
use crate::config::RigTuning;
use crate::tracking::{PoseLandmark, PoseReport};

/// A single limb segment: one bone driven by two landmarks.
struct LimbSegment {
    /// VRM bone name (used for elbow pole-vector identification)
    bone_name: &'static str,
    /// Node index of the bone to rotate
    node: usize,
    /// Parent node index (rotation is computed in parent-local space)
    parent_node: usize,
    /// Landmark for the proximal joint
    from_landmark: PoseLandmark,
    /// Landmark for the distal joint
    to_landmark: PoseLandmark,
    /// Rest-pose limb direction in world space (normalized)
    rest_dir_world: Vec3,
}

/// Torso bone with its dampener selector.
struct TorsoBone {
    node: usize,
    kind: TorsoKind,
}

#[derive(Clone, Copy)]
enum TorsoKind {
    Spine,
    Chest,
}

/// Solved targets for one detection result.
#[derive(Debug, Clone, Default)]
pub struct RigTargets {
    /// Target local rotation per driven node
    pub rotations: HashMap<usize, Quat>,
    /// Target hips local translation
    pub hips_translation: Option<Vec3>,
}

/// Limb segment definitions: (bone_name, from_landmark, to_landmark).
///
/// Upper segments come before lower ones so hierarchical propagation works.
const LIMB_DEFS: &[(&str, PoseLandmark, PoseLandmark)] = &[
    ("leftUpperArm", PoseLandmark::LeftShoulder, PoseLandmark::LeftElbow),
    ("leftLowerArm", PoseLandmark::LeftElbow, PoseLandmark::LeftWrist),
    ("rightUpperArm", PoseLandmark::RightShoulder, PoseLandmark::RightElbow),
    ("rightLowerArm", PoseLandmark::RightElbow, PoseLandmark::RightWrist),
    ("leftUpperLeg", PoseLandmark::LeftHip, PoseLandmark::LeftKnee),
    ("leftLowerLeg", PoseLandmark::LeftKnee, PoseLandmark::LeftAnkle),
    ("rightUpperLeg", PoseLandmark::RightHip, PoseLandmark::RightKnee),
    ("rightLowerLeg", PoseLandmark::RightKnee, PoseLandmark::RightAnkle),
];

/// Mapping from landmark to the VRM bone whose rest world position stands in
/// for it when computing rest limb directions.
const LANDMARK_TO_BONE: &[(PoseLandmark, &str)] = &[
    (PoseLandmark::LeftShoulder, "leftUpperArm"),
    (PoseLandmark::LeftElbow, "leftLowerArm"),
    (PoseLandmark::LeftWrist, "leftHand"),
    (PoseLandmark::RightShoulder, "rightUpperArm"),
    (PoseLandmark::RightElbow, "rightLowerArm"),
    (PoseLandmark::RightWrist, "rightHand"),
    (PoseLandmark::LeftHip, "leftUpperLeg"),
    (PoseLandmark::LeftKnee, "leftLowerLeg"),
    (PoseLandmark::LeftAnkle, "leftFoot"),
    (PoseLandmark::RightHip, "rightUpperLeg"),
    (PoseLandmark::RightKnee, "rightLowerLeg"),
    (PoseLandmark::RightAnkle, "rightFoot"),
];

/// Precomputed solver state for a loaded model.
pub struct RigSolver {
    limb_segments: Vec<LimbSegment>,
    torso_bones: Vec<TorsoBone>,
    hips_node: Option<usize>,
    rest_world: Vec<Mat4>,
    /// Rest-pose shoulder/hip reference positions (world space)
    rest_shoulder_left: Vec3,
    rest_shoulder_right: Vec3,
    rest_hip_left: Vec3,
    rest_hip_right: Vec3,
}

impl RigSolver {
    /// Build the solver from a loaded model.
    ///
    /// Returns `None` if the model lacks the hips bone or every limb bone.
    pub fn from_model(model: &AvatarModel) -> Option<Self> {
        let rest_world = model.rest_world_transforms();

        // Rest-pose world position for each landmark
        let mut landmark_world: HashMap<PoseLandmark, Vec3> = HashMap::new();
        for &(landmark, bone) in LANDMARK_TO_BONE {
            if let Some(node) = model.bone_node(bone) {
                let world_pos = rest_world[node].col(3).truncate();
                landmark_world.insert(landmark, world_pos);
            }
        }

        let mut limb_segments = Vec::new();

        for &(bone_name, from_lm, to_lm) in LIMB_DEFS {
            let node = match model.bone_node(bone_name) {
                Some(n) => n,
                None => continue,
            };

            let parent_node = match model.parents[node] {
                Some(p) => p,
                None => continue,
            };

            let from_world = match landmark_world.get(&from_lm) {
                Some(&p) => p,
                None => continue,
            };

            let to_world = match landmark_world.get(&to_lm) {
                Some(&p) => p,
                None => continue,
            };

            let rest_dir_world = match (to_world - from_world).try_normalize() {
                Some(d) => d,
                None => continue,
            };

            limb_segments.push(LimbSegment {
                bone_name,
                node,
                parent_node,
                from_landmark: from_lm,
                to_landmark: to_lm,
                rest_dir_world,
            });
        }

        if limb_segments.is_empty() {
            tracing::warn!("Model has no mappable limb bones, rig solver disabled");
            return None;
        }

        let hips_node = model.bone_node("hips");
        if hips_node.is_none() {
            tracing::warn!("Model has no hips bone");
        }

        let mut torso_bones = Vec::new();
        for (bone_name, kind) in [("spine", TorsoKind::Spine), ("chest", TorsoKind::Chest)] {
            if let Some(node) = model.bone_node(bone_name) {
                torso_bones.push(TorsoBone { node, kind });
            }
        }

        let rest_shoulder_left = landmark_world
            .get(&PoseLandmark::LeftShoulder)
            .copied()
            .unwrap_or(Vec3::new(0.15, 1.3, 0.0));
        let rest_shoulder_right = landmark_world
            .get(&PoseLandmark::RightShoulder)
            .copied()
            .unwrap_or(Vec3::new(-0.15, 1.3, 0.0));
        let rest_hip_left = landmark_world
            .get(&PoseLandmark::LeftHip)
            .copied()
            .unwrap_or(Vec3::new(0.09, 0.9, 0.0));
        let rest_hip_right = landmark_world
            .get(&PoseLandmark::RightHip)
            .copied()
            .unwrap_or(Vec3::new(-0.09, 0.9, 0.0));

        Some(Self {
            limb_segments,
            torso_bones,
            hips_node,
            rest_world,
            rest_shoulder_left,
            rest_shoulder_right,
            rest_hip_left,
            rest_hip_right,
        })
    }

    /// Solve targets for one detection result.
    ///
    /// Returns target local rotations per node (hips, spine, chest, arms,
    /// legs) plus the target hips translation. Segments whose landmarks fall
    /// below the visibility threshold are skipped for this frame.
    pub fn solve(
        &self,
        model: &AvatarModel,
        report: &PoseReport,
        tuning: &RigTuning,
    ) -> RigTargets {
        let mut targets = RigTargets::default();

        if !report.detected {
            return targets;
        }

        self.solve_hips_rotation(model, report, tuning, &mut targets.rotations);
        self.solve_torso(model, report, tuning, &mut targets.rotations);

        // World transforms with torso/hips targets applied, so limb segments
        // solve against the already-rotated trunk.
        let mut current_world = model.world_transforms(&targets.rotations, &HashMap::new());

        self.solve_limbs(model, report, tuning, &mut targets.rotations, &mut current_world);

        targets.hips_translation = self.solve_hips_translation(report, tuning);

        targets
    }

    /// Hips orientation from the hip line and the hip→shoulder lean.
    fn solve_hips_rotation(
        &self,
        model: &AvatarModel,
        report: &PoseReport,
        tuning: &RigTuning,
        rotations: &mut HashMap<usize, Quat>,
    ) {
        let hips = match self.hips_node {
            Some(n) => n,
            None => return,
        };

        let (lh, rh) = match (
            landmark_vec3(report, PoseLandmark::LeftHip, tuning.visibility_threshold),
            landmark_vec3(report, PoseLandmark::RightHip, tuning.visibility_threshold),
        ) {
            (Some(l), Some(r)) => (l, r),
            _ => return,
        };

        let dyaw = line_yaw(lh, rh) - line_yaw(self.rest_hip_left, self.rest_hip_right);
        let dtilt = line_tilt(lh, rh) - line_tilt(self.rest_hip_left, self.rest_hip_right);

        // Lean needs the shoulders too; without them only yaw/tilt apply
        let dlean = match (
            landmark_vec3(report, PoseLandmark::LeftShoulder, tuning.visibility_threshold),
            landmark_vec3(report, PoseLandmark::RightShoulder, tuning.visibility_threshold),
        ) {
            (Some(ls), Some(rs)) => {
                let tracked = torso_lean((ls + rs) * 0.5, (lh + rh) * 0.5);
                let rest = torso_lean(
                    (self.rest_shoulder_left + self.rest_shoulder_right) * 0.5,
                    (self.rest_hip_left + self.rest_hip_right) * 0.5,
                );
                tracked - rest
            }
            _ => 0.0,
        };

        let world = Quat::from_rotation_y(dyaw)
            * Quat::from_rotation_x(dlean)
            * Quat::from_rotation_z(dtilt);
        let scaled = Quat::IDENTITY.slerp(world, tuning.hips_rotation_damp);
        let local = world_to_parent_local(model, &self.rest_world, hips, scaled);

        rotations.insert(hips, local * model.rest_rotations[hips]);
    }

    /// Torso lean/tilt/twist distributed over spine and chest.
    fn solve_torso(
        &self,
        model: &AvatarModel,
        report: &PoseReport,
        tuning: &RigTuning,
        rotations: &mut HashMap<usize, Quat>,
    ) {
        if self.torso_bones.is_empty() {
            return;
        }

        let (ls, rs) = match (
            landmark_vec3(report, PoseLandmark::LeftShoulder, tuning.visibility_threshold),
            landmark_vec3(report, PoseLandmark::RightShoulder, tuning.visibility_threshold),
        ) {
            (Some(l), Some(r)) => (l, r),
            _ => return,
        };

        let dyaw = line_yaw(ls, rs) - line_yaw(self.rest_shoulder_left, self.rest_shoulder_right);
        let dtilt =
            line_tilt(ls, rs) - line_tilt(self.rest_shoulder_left, self.rest_shoulder_right);

        let mut dlean = 0.0f32;
        if let (Some(lh), Some(rh)) = (
            landmark_vec3(report, PoseLandmark::LeftHip, tuning.visibility_threshold),
            landmark_vec3(report, PoseLandmark::RightHip, tuning.visibility_threshold),
        ) {
            let tracked = torso_lean((ls + rs) * 0.5, (lh + rh) * 0.5);
            let rest = torso_lean(
                (self.rest_shoulder_left + self.rest_shoulder_right) * 0.5,
                (self.rest_hip_left + self.rest_hip_right) * 0.5,
            );
            dlean = tracked - rest;
        }

        let world = Quat::from_rotation_y(dyaw)
            * Quat::from_rotation_x(dlean)
            * Quat::from_rotation_z(dtilt);

        for tb in &self.torso_bones {
            let damp = match tb.kind {
                TorsoKind::Spine => tuning.spine_damp,
                TorsoKind::Chest => tuning.chest_damp,
            };
            let scaled = Quat::IDENTITY.slerp(world, damp);
            let local = world_to_parent_local(model, &self.rest_world, tb.node, scaled);
            rotations.insert(tb.node, local * model.rest_rotations[tb.node]);
        }
    }

    /// Limb IK with hierarchical propagation.
    fn solve_limbs(
        &self,
        model: &AvatarModel,
        report: &PoseReport,
        tuning: &RigTuning,
        rotations: &mut HashMap<usize, Quat>,
        current_world: &mut [Mat4],
    ) {
        for seg in &self.limb_segments {
            let from = match landmark_vec3(report, seg.from_landmark, tuning.visibility_threshold)
            {
                Some(p) => p,
                None => continue,
            };
            let to = match landmark_vec3(report, seg.to_landmark, tuning.visibility_threshold) {
                Some(p) => p,
                None => continue,
            };

            let tracked_dir_world = match (to - from).try_normalize() {
                Some(d) => d,
                None => continue,
            };

            // Use current_world (hierarchically updated) for parent transform
            let parent_inv = current_world[seg.parent_node].inverse();

            let rest_dir_local =
                match parent_inv.transform_vector3(seg.rest_dir_world).try_normalize() {
                    Some(d) => d,
                    None => continue,
                };
            let tracked_dir_local =
                match parent_inv.transform_vector3(tracked_dir_world).try_normalize() {
                    Some(d) => d,
                    None => continue,
                };

            let mut delta = Quat::from_rotation_arc(rest_dir_local, tracked_dir_local);

            // Elbow pole-vector correction for lower arm segments
            if seg.bone_name == "leftLowerArm" || seg.bone_name == "rightLowerArm" {
                delta = correct_elbow_pole(
                    seg,
                    &from,
                    &tracked_dir_world,
                    &tracked_dir_local,
                    delta,
                    report,
                    tuning.visibility_threshold,
                );
            }

            let damped = Quat::IDENTITY.slerp(delta, tuning.limb_damp);

            // Apply delta on top of rest rotation
            let rest_rot = model.rest_rotations[seg.node];
            let target = rest_rot * damped;
            rotations.insert(seg.node, target);

            // Update current_world so child segments see this rotation
            let local = Mat4::from_scale_rotation_translation(
                model.rest_scales[seg.node],
                target,
                model.rest_translations[seg.node],
            );
            current_world[seg.node] = current_world[seg.parent_node] * local;
        }
    }

    /// Target hips translation from the image-space hip midpoint.
    ///
    /// The world landmarks are hip-centered, so lateral/vertical offset comes
    /// from the 2D landmarks: the midpoint is re-centered around the frame
    /// center and scaled to meters, with depth taken from the image-space
    /// depth estimate (negated, toward the viewer).
    fn solve_hips_translation(&self, report: &PoseReport, tuning: &RigTuning) -> Option<Vec3> {
        self.hips_node?;

        let lh = report.image_landmark(PoseLandmark::LeftHip)?;
        let rh = report.image_landmark(PoseLandmark::RightHip)?;
        if lh[3] < tuning.visibility_threshold || rh[3] < tuning.visibility_threshold {
            return None;
        }

        let mid_x = (lh[0] + rh[0]) * 0.5;
        let mid_y = (lh[1] + rh[1]) * 0.5;
        let mid_z = (lh[2] + rh[2]) * 0.5;

        // Image y grows downward; avatar y grows upward
        Some(Vec3::new(
            (0.5 - mid_x) * tuning.position_scale,
            (0.5 - mid_y) * tuning.position_scale + tuning.hips_height,
            -mid_z * tuning.depth_scale,
        ))
    }
}

/// World landmark as a vector, if it clears the visibility threshold.
fn landmark_vec3(report: &PoseReport, lm: PoseLandmark, threshold: f32) -> Option<Vec3> {
    let p = report.world_landmark(lm)?;
    if p[3] < threshold {
        return None;
    }
    Some(Vec3::new(p[0], p[1], p[2]))
}

/// Yaw of the left→right line in the XZ plane (zero when along +X).
fn line_yaw(left: Vec3, right: Vec3) -> f32 {
    let d = left - right;
    (-d.z).atan2(d.x)
}

/// Tilt of the left→right line out of horizontal.
fn line_tilt(left: Vec3, right: Vec3) -> f32 {
    let d = left - right;
    let width = d.length().max(0.01);
    (d.y / width).clamp(-1.0, 1.0).asin()
}

/// Forward/backward lean of the hip→shoulder line.
fn torso_lean(shoulder_mid: Vec3, hip_mid: Vec3) -> f32 {
    let delta = shoulder_mid - hip_mid;
    delta.z.atan2(delta.y.max(0.01))
}

/// Convert a world-space rotation into the parent-local frame of `node`.
/// R_local = P⁻¹ * R_world * P  where P is the parent's rest-pose world rotation.
fn world_to_parent_local(
    model: &AvatarModel,
    rest_world: &[Mat4],
    node: usize,
    rot_world: Quat,
) -> Quat {
    if let Some(parent) = model.parents[node] {
        let parent_rot = Quat::from_mat3(&Mat3::from_mat4(rest_world[parent])).normalize();
        parent_rot.inverse() * rot_world * parent_rot
    } else {
        rot_world
    }
}

/// If the arm-plane normal indicates the elbow is pointing forward, flip by
/// 180° around the limb axis to correct.
fn correct_elbow_pole(
    seg: &LimbSegment,
    elbow_pos: &Vec3,
    tracked_dir_world: &Vec3,
    tracked_dir_local: &Vec3,
    delta: Quat,
    report: &PoseReport,
    visibility_threshold: f32,
) -> Quat {
    let shoulder_lm = if seg.bone_name == "leftLowerArm" {
        PoseLandmark::LeftShoulder
    } else {
        PoseLandmark::RightShoulder
    };

    if let Some(shoulder) = landmark_vec3(report, shoulder_lm, visibility_threshold) {
        if let Some(upper_dir) = (*elbow_pos - shoulder).try_normalize() {
            let bend_normal = upper_dir.cross(*tracked_dir_world);
            // Positive Z → elbow forward → flip
            if bend_normal.length_squared() > 0.0001 && bend_normal.z > 0.0 {
                let flip = Quat::from_axis_angle(*tracked_dir_local, std::f32::consts::PI);
                return flip * delta;
            }
        }
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::landmarks::PosePacket;

    /// Minimal humanoid: hips → spine → chest with T-pose arms along ±X and
    /// straight legs down ±Y.
    fn test_model() -> AvatarModel {
        let nodes: &[(Option<usize>, [f32; 3])] = &[
            (None, [0.0, 0.9, 0.0]),         // 0 hips
            (Some(0), [0.0, 0.1, 0.0]),      // 1 spine
            (Some(1), [0.0, 0.15, 0.0]),     // 2 chest
            (Some(2), [0.15, 0.15, 0.0]),    // 3 leftUpperArm
            (Some(3), [0.25, 0.0, 0.0]),     // 4 leftLowerArm
            (Some(4), [0.22, 0.0, 0.0]),     // 5 leftHand
            (Some(2), [-0.15, 0.15, 0.0]),   // 6 rightUpperArm
            (Some(6), [-0.25, 0.0, 0.0]),    // 7 rightLowerArm
            (Some(7), [-0.22, 0.0, 0.0]),    // 8 rightHand
            (Some(0), [0.09, -0.03, 0.0]),   // 9 leftUpperLeg
            (Some(9), [0.0, -0.4, 0.0]),     // 10 leftLowerLeg
            (Some(10), [0.0, -0.4, 0.0]),    // 11 leftFoot
            (Some(0), [-0.09, -0.03, 0.0]),  // 12 rightUpperLeg
            (Some(12), [0.0, -0.4, 0.0]),    // 13 rightLowerLeg
            (Some(13), [0.0, -0.4, 0.0]),    // 14 rightFoot
        ];

        let bones = [
            ("hips", 0),
            ("spine", 1),
            ("chest", 2),
            ("leftUpperArm", 3),
            ("leftLowerArm", 4),
            ("leftHand", 5),
            ("rightUpperArm", 6),
            ("rightLowerArm", 7),
            ("rightHand", 8),
            ("leftUpperLeg", 9),
            ("leftLowerLeg", 10),
            ("leftFoot", 11),
            ("rightUpperLeg", 12),
            ("rightLowerLeg", 13),
            ("rightFoot", 14),
        ];

        AvatarModel {
            meshes: vec![],
            rest_translations: nodes.iter().map(|(_, t)| Vec3::from(*t)).collect(),
            rest_rotations: vec![Quat::IDENTITY; nodes.len()],
            rest_scales: vec![Vec3::ONE; nodes.len()],
            parents: nodes.iter().map(|(p, _)| *p).collect(),
            node_count: nodes.len(),
            skins: vec![],
            mesh_skin: HashMap::new(),
            bone_to_node: bones
                .iter()
                .map(|(name, idx)| (name.to_string(), *idx))
                .collect(),
        }
    }

    /// Report whose world landmarks match the model's rest pose.
    fn rest_report(model: &AvatarModel) -> PoseReport {
        let rest_world = model.rest_world_transforms();
        let mut world_landmarks = vec![[0.0f32; 4]; PoseLandmark::COUNT];

        for &(lm, bone) in LANDMARK_TO_BONE {
            let node = model.bone_node(bone).unwrap();
            let pos = rest_world[node].col(3).truncate();
            world_landmarks[lm.index()] = [pos.x, pos.y, pos.z, 1.0];
        }

        let mut landmarks = vec![[0.0f32; 4]; PoseLandmark::COUNT];
        landmarks[PoseLandmark::LeftHip.index()] = [0.55, 0.5, 0.0, 1.0];
        landmarks[PoseLandmark::RightHip.index()] = [0.45, 0.5, 0.0, 1.0];

        PosePacket {
            pose_detected: true,
            landmarks,
            world_landmarks,
        }
        .into_report()
        .unwrap()
    }

    #[test]
    fn test_from_model_builds_segments() {
        let model = test_model();
        let solver = RigSolver::from_model(&model).expect("solver should build");

        assert_eq!(solver.limb_segments.len(), 8, "arms + legs, both sides");
        assert_eq!(solver.torso_bones.len(), 2);
        assert_eq!(solver.hips_node, Some(0));

        for seg in &solver.limb_segments {
            let len = seg.rest_dir_world.length();
            assert!(
                (len - 1.0).abs() < 0.01,
                "rest direction should be normalized, got length {len}"
            );
        }
    }

    #[test]
    fn test_from_model_without_limbs() {
        let mut model = test_model();
        model.bone_to_node.clear();
        model.bone_to_node.insert("hips".to_string(), 0);
        assert!(RigSolver::from_model(&model).is_none());
    }

    #[test]
    fn test_solve_rest_pose_is_near_rest() {
        let model = test_model();
        let solver = RigSolver::from_model(&model).unwrap();
        let report = rest_report(&model);

        let targets = solver.solve(&model, &report, &RigTuning::default());

        assert!(!targets.rotations.is_empty());
        for (&node, &rot) in &targets.rotations {
            let rest = model.rest_rotations[node];
            let angle = rest.angle_between(rot);
            assert!(
                angle < 0.1,
                "rest-pose solve should stay near rest for node {node}, angle {angle}"
            );
        }
    }

    #[test]
    fn test_solve_raised_arm_rotates_bone() {
        let model = test_model();
        let solver = RigSolver::from_model(&model).unwrap();
        let mut report = rest_report(&model);

        // Left arm pointing straight up
        let shoulder = report.world_landmarks[PoseLandmark::LeftShoulder.index()];
        report.world_landmarks[PoseLandmark::LeftElbow.index()] =
            [shoulder[0], shoulder[1] + 0.25, shoulder[2], 1.0];
        report.world_landmarks[PoseLandmark::LeftWrist.index()] =
            [shoulder[0], shoulder[1] + 0.5, shoulder[2], 1.0];

        let targets = solver.solve(&model, &report, &RigTuning::default());

        let upper = model.bone_node("leftUpperArm").unwrap();
        let rot = targets.rotations[&upper];
        let angle = model.rest_rotations[upper].angle_between(rot);
        assert!(
            angle > 0.5,
            "a raised arm should rotate the upper arm well away from rest, got {angle}"
        );
    }

    #[test]
    fn test_solve_skips_low_visibility_segments() {
        let model = test_model();
        let solver = RigSolver::from_model(&model).unwrap();
        let mut report = rest_report(&model);

        report.world_landmarks[PoseLandmark::LeftWrist.index()][3] = 0.0;

        let targets = solver.solve(&model, &report, &RigTuning::default());

        let lower = model.bone_node("leftLowerArm").unwrap();
        assert!(
            !targets.rotations.contains_key(&lower),
            "invisible wrist should skip the lower arm segment"
        );
        // Upper arm still solved
        let upper = model.bone_node("leftUpperArm").unwrap();
        assert!(targets.rotations.contains_key(&upper));
    }

    #[test]
    fn test_solve_hips_translation_centered() {
        let model = test_model();
        let solver = RigSolver::from_model(&model).unwrap();
        let report = rest_report(&model);
        let tuning = RigTuning::default();

        let targets = solver.solve(&model, &report, &tuning);
        let t = targets.hips_translation.expect("hips translation solved");

        assert!((t.x - 0.0).abs() < 1e-5);
        assert!((t.y - tuning.hips_height).abs() < 1e-5);
        assert!((t.z - 0.0).abs() < 1e-5);
    }

    #[test]
    fn test_solve_hips_translation_follows_offset() {
        let model = test_model();
        let solver = RigSolver::from_model(&model).unwrap();
        let mut report = rest_report(&model);
        let tuning = RigTuning::default();

        // Subject drifts toward the left edge of the frame
        report.landmarks[PoseLandmark::LeftHip.index()] = [0.25, 0.5, 0.0, 1.0];
        report.landmarks[PoseLandmark::RightHip.index()] = [0.15, 0.5, 0.0, 1.0];

        let targets = solver.solve(&model, &report, &tuning);
        let t = targets.hips_translation.unwrap();

        assert!(t.x > 0.0, "frame-left drift should move the avatar, got {}", t.x);
    }

    #[test]
    fn test_solve_undetected_is_empty() {
        let model = test_model();
        let solver = RigSolver::from_model(&model).unwrap();

        let targets = solver.solve(&model, &PoseReport::default(), &RigTuning::default());
        assert!(targets.rotations.is_empty());
        assert!(targets.hips_translation.is_none());
    }

    #[test]
    fn test_solve_shoulder_tilt_rotates_torso() {
        let model = test_model();
        let solver = RigSolver::from_model(&model).unwrap();
        let mut report = rest_report(&model);

        // Raise the left shoulder, drop the right
        report.world_landmarks[PoseLandmark::LeftShoulder.index()][1] += 0.08;
        report.world_landmarks[PoseLandmark::RightShoulder.index()][1] -= 0.08;

        let targets = solver.solve(&model, &report, &RigTuning::default());

        let spine = model.bone_node("spine").unwrap();
        let rot = targets.rotations[&spine];
        let angle = model.rest_rotations[spine].angle_between(rot);
        assert!(angle > 0.02, "shoulder tilt should rotate the spine, got {angle}");
    }
}
