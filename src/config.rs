//! Configuration parsing and management for posemirror

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, PosemirrorError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub avatar: AvatarConfig,
    pub rigging: RigTuning,
    pub viewer: ViewerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PosemirrorError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(s: &str) -> Result<Self, PosemirrorError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, PosemirrorError> {
        // Try config paths in order
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PosemirrorError> {
        if self.tracker.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tracker.port".to_string(),
                message: "Port must be greater than 0".to_string(),
            }
            .into());
        }

        if self.tracker.model_complexity > 2 {
            return Err(ConfigError::InvalidValue {
                field: "tracker.model_complexity".to_string(),
                message: "Model complexity must be 0, 1, or 2".to_string(),
            }
            .into());
        }

        for (field, value) in [
            ("tracker.min_detection_confidence", self.tracker.min_detection_confidence),
            ("tracker.min_tracking_confidence", self.tracker.min_tracking_confidence),
            ("rigging.visibility_threshold", self.rigging.visibility_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Must be between 0.0 and 1.0".to_string(),
                }
                .into());
            }
        }

        for (field, value) in [
            ("rigging.rotation_lerp", self.rigging.rotation_lerp),
            ("rigging.hips_position_lerp", self.rigging.hips_position_lerp),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Must be in (0.0, 1.0]".to_string(),
                }
                .into());
            }
        }

        if self.tracker.auto_launch {
            let path = std::path::Path::new(&self.tracker.tracker_script);
            if !path.exists() {
                tracing::warn!(
                    "Tracker auto_launch enabled but tracker script not found at: {}",
                    self.tracker.tracker_script
                );
            }
        }

        Ok(())
    }
}

/// Pose tracker configuration (camera + external detector process)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Enable pose tracking
    pub enabled: bool,
    /// UDP port to receive pose packets on
    pub port: u16,
    /// Listen address for UDP socket
    pub listen_address: String,
    /// Auto-launch the Python tracker subprocess
    pub auto_launch: bool,
    /// Path to pose_tracker.py script
    pub tracker_script: String,
    /// Camera device index
    pub camera_device: u32,
    /// Camera capture width
    pub capture_width: u32,
    /// Camera capture height
    pub capture_height: u32,
    /// Camera capture FPS
    pub capture_fps: u32,
    /// Pose model complexity (0-2, higher = better but slower)
    pub model_complexity: u8,
    /// Minimum detection confidence (0.0 - 1.0)
    pub min_detection_confidence: f32,
    /// Minimum tracking confidence (0.0 - 1.0)
    pub min_tracking_confidence: f32,
    /// Enable the detector's own landmark smoothing
    pub smooth_landmarks: bool,
    /// Auto-restart subprocess on crash
    pub auto_restart: bool,
    /// Delay before restarting crashed subprocess (seconds)
    pub restart_delay_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 12350,
            listen_address: "127.0.0.1".to_string(),
            auto_launch: true,
            tracker_script: "scripts/pose_tracker.py".to_string(),
            camera_device: 0,
            capture_width: 640,
            capture_height: 480,
            capture_fps: 30,
            model_complexity: 1,
            min_detection_confidence: 0.2,
            min_tracking_confidence: 0.2,
            smooth_landmarks: true,
            auto_restart: true,
            restart_delay_secs: 3,
        }
    }
}

/// Avatar model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Path to the VRM/GLB model file
    pub model_path: String,
    /// URL to download the model from if the path does not exist
    pub model_url: Option<String>,
    /// Directory for downloaded model files
    pub cache_dir: PathBuf,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            model_path: "assets/models/avatar.vrm".to_string(),
            model_url: None,
            cache_dir: PathBuf::from("./cache"),
        }
    }
}

/// Viewer window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Window width in logical points
    pub window_width: f32,
    /// Window height in logical points
    pub window_height: f32,
    /// Show the 2D landmark guide overlay
    pub overlay_enabled: bool,
    /// Mirror the landmark guide horizontally (webcam-style)
    pub mirror_overlay: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_width: 960.0,
            window_height: 640.0,
            overlay_enabled: true,
            mirror_overlay: true,
        }
    }
}

/// Rig solve/apply tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RigTuning {
    /// Landmark smoothing algorithm: "spring", "one_euro", or "none"
    #[serde(default = "default_smoothing_mode")]
    pub smoothing_mode: String,

    // --- Landmark filtering ---
    /// Spring halflife for world landmarks (seconds)
    #[serde(default = "default_0_1")]
    pub landmark_halflife: f32,
    /// 1-Euro minimum cutoff for world landmarks
    #[serde(default = "default_1_0")]
    pub landmark_min_cutoff: f32,
    /// 1-Euro speed coefficient for world landmarks
    #[serde(default = "default_0_5")]
    pub landmark_beta: f32,
    /// Deadzone applied to landmark components (meters)
    #[serde(default = "default_0_005")]
    pub landmark_deadzone: f32,
    /// Landmarks below this visibility are ignored for the solve
    #[serde(default = "default_0_3")]
    pub visibility_threshold: f32,

    // --- Interpolation amounts (per detection result) ---
    /// Slerp fraction toward target rotations
    #[serde(default = "default_0_3")]
    pub rotation_lerp: f32,
    /// Lerp fraction toward the target hips position
    #[serde(default = "default_0_07")]
    pub hips_position_lerp: f32,

    // --- Per-bone dampeners ---
    /// Hips rotation dampener
    #[serde(default = "default_0_7")]
    pub hips_rotation_damp: f32,
    /// Spine rotation dampener
    #[serde(default = "default_0_45")]
    pub spine_damp: f32,
    /// Chest rotation dampener
    #[serde(default = "default_0_25")]
    pub chest_damp: f32,
    /// Limb rotation dampener
    #[serde(default = "default_1_0")]
    pub limb_damp: f32,

    // --- Hips translation mapping ---
    /// Base avatar hips height (meters)
    #[serde(default = "default_1_0")]
    pub hips_height: f32,
    /// Scale from normalized image offset to meters
    #[serde(default = "default_0_5")]
    pub position_scale: f32,
    /// Scale applied to the landmark depth estimate
    #[serde(default = "default_0_3")]
    pub depth_scale: f32,
}

fn default_smoothing_mode() -> String { "spring".to_string() }
fn default_1_0() -> f32 { 1.0 }
fn default_0_7() -> f32 { 0.7 }
fn default_0_5() -> f32 { 0.5 }
fn default_0_45() -> f32 { 0.45 }
fn default_0_3() -> f32 { 0.3 }
fn default_0_25() -> f32 { 0.25 }
fn default_0_1() -> f32 { 0.1 }
fn default_0_07() -> f32 { 0.07 }
fn default_0_005() -> f32 { 0.005 }

impl Default for RigTuning {
    fn default() -> Self {
        Self {
            smoothing_mode: default_smoothing_mode(),
            landmark_halflife: default_0_1(),
            landmark_min_cutoff: default_1_0(),
            landmark_beta: default_0_5(),
            landmark_deadzone: default_0_005(),
            visibility_threshold: default_0_3(),
            rotation_lerp: default_0_3(),
            hips_position_lerp: default_0_07(),
            hips_rotation_damp: default_0_7(),
            spine_damp: default_0_45(),
            chest_damp: default_0_25(),
            limb_damp: default_1_0(),
            hips_height: default_1_0(),
            position_scale: default_0_5(),
            depth_scale: default_0_3(),
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("posemirror");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/posemirror");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/posemirror");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("posemirror");
        }
    }

    PathBuf::from(".")
}
