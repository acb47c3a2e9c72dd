//! Tracker subprocess manager
//!
//! Launches the Python pose tracker (camera capture + detector) as a child
//! process with automatic cleanup on drop.

use tokio::process::{Child, Command};

use crate::config::TrackerConfig;
use crate::error::{PosemirrorError, TrackingError};

/// Check whether the tracker helper script and a python3 interpreter exist.
pub fn check_tracker_available(config: &TrackerConfig) -> bool {
    if !std::path::Path::new(&config.tracker_script).exists() {
        return false;
    }
    which_python().is_some()
}

fn which_python() -> Option<std::path::PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join("python3"))
        .find(|candidate| candidate.exists())
}

/// Manages the pose tracker subprocess (scripts/pose_tracker.py)
pub struct TrackerSubprocess {
    child: Option<Child>,
    config: TrackerConfig,
}

impl TrackerSubprocess {
    /// Create a new subprocess manager (does not start the process)
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            child: None,
            config: config.clone(),
        }
    }

    /// Launch the pose tracker subprocess.
    ///
    /// Runs: `python3 <tracker_script> --ip <listen_address> --port <port>
    ///        --capture <camera_device> --width <capture_width>
    ///        --height <capture_height> --fps <capture_fps>
    ///        --model-complexity <model_complexity>
    ///        --min-detection-confidence <..> --min-tracking-confidence <..>`
    pub fn start(&mut self) -> Result<(), PosemirrorError> {
        if self.is_running() {
            return Ok(());
        }

        let mut command = Command::new("python3");
        command
            .arg(&self.config.tracker_script)
            .args(["--ip", &self.config.listen_address])
            .args(["--port", &self.config.port.to_string()])
            .args(["--capture", &self.config.camera_device.to_string()])
            .args(["--width", &self.config.capture_width.to_string()])
            .args(["--height", &self.config.capture_height.to_string()])
            .args(["--fps", &self.config.capture_fps.to_string()])
            .args(["--model-complexity", &self.config.model_complexity.to_string()])
            .args([
                "--min-detection-confidence",
                &self.config.min_detection_confidence.to_string(),
            ])
            .args([
                "--min-tracking-confidence",
                &self.config.min_tracking_confidence.to_string(),
            ]);

        if !self.config.smooth_landmarks {
            command.arg("--no-smoothing");
        }

        let child = command
            .kill_on_drop(true)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| {
                TrackingError::Subprocess(format!(
                    "Failed to launch pose tracker at '{}': {}",
                    self.config.tracker_script, e
                ))
            })?;

        tracing::info!(
            "Pose tracker subprocess started (pid: {:?}, camera: {}, port: {})",
            child.id(),
            self.config.camera_device,
            self.config.port,
        );

        self.child = Some(child);
        Ok(())
    }

    /// Check if the subprocess is still running (non-blocking)
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    tracing::warn!("Pose tracker subprocess exited with: {}", status);
                    self.child = None;
                    false
                }
                Err(e) => {
                    tracing::error!("Failed to check tracker subprocess status: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Stop the subprocess by killing it
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping pose tracker subprocess (pid: {:?})", child.id());
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}
