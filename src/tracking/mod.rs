//! Pose tracking
//!
//! Consumes body-pose detections from the external tracker process:
//! - Landmark topology shared by the solver and the overlay
//! - JSON-over-UDP receiver
//! - Tracker subprocess management (camera + detector)

pub mod landmarks;
pub mod receiver;
pub mod subprocess;

pub use landmarks::{PoseLandmark, PosePacket, PoseReport, POSE_CONNECTIONS};
pub use receiver::PoseReceiver;
pub use subprocess::TrackerSubprocess;
