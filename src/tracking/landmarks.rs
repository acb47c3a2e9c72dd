//! Pose landmark topology and wire types.
//!
//! The tracker reports the standard 33-keypoint body topology. Each packet
//! carries two parallel landmark sets: image-space landmarks (normalized to
//! the capture frame, used by the overlay) and world-space landmarks (meters,
//! origin between the hips, used by the rig solver).

use serde::Deserialize;

use crate::error::TrackingError;

/// The 33 body keypoints, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    /// Number of keypoints in a full pose
    pub const COUNT: usize = 33;

    /// Index into the packet landmark arrays
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Skeleton edges between keypoints, used by the landmark guide overlay.
pub const POSE_CONNECTIONS: [(PoseLandmark, PoseLandmark); 35] = {
    use PoseLandmark::*;
    [
        // Face
        (Nose, LeftEyeInner),
        (LeftEyeInner, LeftEye),
        (LeftEye, LeftEyeOuter),
        (LeftEyeOuter, LeftEar),
        (Nose, RightEyeInner),
        (RightEyeInner, RightEye),
        (RightEye, RightEyeOuter),
        (RightEyeOuter, RightEar),
        (MouthLeft, MouthRight),
        // Arms
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (LeftWrist, LeftPinky),
        (LeftWrist, LeftIndex),
        (LeftWrist, LeftThumb),
        (LeftPinky, LeftIndex),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        (RightWrist, RightPinky),
        (RightWrist, RightIndex),
        (RightWrist, RightThumb),
        (RightPinky, RightIndex),
        // Torso
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        (LeftHip, RightHip),
        // Legs
        (LeftHip, LeftKnee),
        (RightHip, RightKnee),
        (LeftKnee, LeftAnkle),
        (RightKnee, RightAnkle),
        (LeftAnkle, LeftHeel),
        (RightAnkle, RightHeel),
        (LeftHeel, LeftFootIndex),
        (RightHeel, RightFootIndex),
        (LeftAnkle, LeftFootIndex),
        (RightAnkle, RightFootIndex),
    ]
};

/// A single JSON packet from the pose tracker.
///
/// Landmark entries are `[x, y, z, visibility]`.
#[derive(Debug, Clone, Deserialize)]
pub struct PosePacket {
    /// Whether a pose was detected this frame
    pub pose_detected: bool,
    /// Image-space landmarks, normalized to the capture frame
    #[serde(default)]
    pub landmarks: Vec<[f32; 4]>,
    /// World-space landmarks in meters, origin between the hips
    #[serde(default)]
    pub world_landmarks: Vec<[f32; 4]>,
}

impl PosePacket {
    /// Validate the packet and convert it to an application-facing report.
    ///
    /// A detected pose must carry both full landmark sets; an undetected
    /// frame may omit them.
    pub fn into_report(self) -> Result<PoseReport, TrackingError> {
        if !self.pose_detected {
            return Ok(PoseReport::default());
        }

        if self.landmarks.len() != PoseLandmark::COUNT
            || self.world_landmarks.len() != PoseLandmark::COUNT
        {
            return Err(TrackingError::Parse(format!(
                "expected {} landmarks, got {} image / {} world",
                PoseLandmark::COUNT,
                self.landmarks.len(),
                self.world_landmarks.len()
            )));
        }

        Ok(PoseReport {
            detected: true,
            landmarks: self.landmarks,
            world_landmarks: self.world_landmarks,
        })
    }
}

/// A validated pose detection result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseReport {
    /// Whether a pose was detected
    pub detected: bool,
    /// Image-space landmarks (normalized), empty unless detected
    pub landmarks: Vec<[f32; 4]>,
    /// World-space landmarks (meters), empty unless detected
    pub world_landmarks: Vec<[f32; 4]>,
}

impl PoseReport {
    /// Image-space landmark, if the pose was detected.
    pub fn image_landmark(&self, lm: PoseLandmark) -> Option<[f32; 4]> {
        self.landmarks.get(lm.index()).copied()
    }

    /// World-space landmark, if the pose was detected.
    pub fn world_landmark(&self, lm: PoseLandmark) -> Option<[f32; 4]> {
        self.world_landmarks.get(lm.index()).copied()
    }

    /// Whether a landmark clears the visibility threshold.
    pub fn visible(&self, lm: PoseLandmark, threshold: f32) -> bool {
        self.world_landmark(lm)
            .map(|p| p[3] >= threshold)
            .unwrap_or(false)
    }

    /// Number of world landmarks at or above the visibility threshold.
    pub fn visible_count(&self, threshold: f32) -> usize {
        self.world_landmarks
            .iter()
            .filter(|p| p[3] >= threshold)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_packet_json(detected: bool) -> String {
        let point = [0.5f32, 0.5, 0.0, 0.9];
        serde_json::json!({
            "pose_detected": detected,
            "landmarks": vec![point; PoseLandmark::COUNT],
            "world_landmarks": vec![point; PoseLandmark::COUNT],
        })
        .to_string()
    }

    #[test]
    fn test_landmark_indices() {
        assert_eq!(PoseLandmark::Nose.index(), 0);
        assert_eq!(PoseLandmark::LeftShoulder.index(), 11);
        assert_eq!(PoseLandmark::RightHip.index(), 24);
        assert_eq!(PoseLandmark::RightFootIndex.index(), 32);
    }

    #[test]
    fn test_connections_in_range() {
        for (a, b) in POSE_CONNECTIONS {
            assert!(a.index() < PoseLandmark::COUNT);
            assert!(b.index() < PoseLandmark::COUNT);
            assert_ne!(a, b, "connection endpoints must differ");
        }
    }

    #[test]
    fn test_parse_packet() {
        let pkt: PosePacket = serde_json::from_str(&full_packet_json(true)).unwrap();
        assert!(pkt.pose_detected);
        assert_eq!(pkt.landmarks.len(), 33);

        let report = pkt.into_report().unwrap();
        assert!(report.detected);
        assert_eq!(
            report.image_landmark(PoseLandmark::Nose),
            Some([0.5, 0.5, 0.0, 0.9])
        );
    }

    #[test]
    fn test_parse_no_pose() {
        let json = r#"{"pose_detected":false}"#;
        let pkt: PosePacket = serde_json::from_str(json).unwrap();
        assert!(!pkt.pose_detected);

        let report = pkt.into_report().unwrap();
        assert!(!report.detected);
        assert!(report.landmarks.is_empty());
        assert_eq!(report.world_landmark(PoseLandmark::Nose), None);
    }

    #[test]
    fn test_truncated_packet_is_error() {
        let json = serde_json::json!({
            "pose_detected": true,
            "landmarks": [[0.5, 0.5, 0.0, 0.9]],
            "world_landmarks": [[0.5, 0.5, 0.0, 0.9]],
        })
        .to_string();

        let pkt: PosePacket = serde_json::from_str(&json).unwrap();
        assert!(pkt.into_report().is_err());
    }

    #[test]
    fn test_visibility() {
        let mut report: PoseReport = PosePacket {
            pose_detected: true,
            landmarks: vec![[0.0; 4]; PoseLandmark::COUNT],
            world_landmarks: vec![[0.0; 4]; PoseLandmark::COUNT],
        }
        .into_report()
        .unwrap();

        report.world_landmarks[PoseLandmark::LeftWrist.index()] = [0.1, 0.2, 0.3, 0.8];

        assert!(report.visible(PoseLandmark::LeftWrist, 0.5));
        assert!(!report.visible(PoseLandmark::RightWrist, 0.5));
        assert_eq!(report.visible_count(0.5), 1);
    }
}
