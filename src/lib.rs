//! posemirror - Webcam pose mirror for VRM avatars
//!
//! Drives a 3D VRM avatar from live body tracking:
//! - Consumes pose landmarks from an external detector (JSON over UDP)
//! - Solves landmark positions into humanoid bone rotations
//! - Applies them with damped interpolation and renders every display frame
//! - Draws a 2D landmark guide overlay for debugging

pub mod avatar;
pub mod config;
pub mod error;
pub mod rig;
pub mod tracking;

#[cfg(feature = "native-ui")]
pub mod ui;

pub use config::Config;
pub use error::{PosemirrorError, Result};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify, RwLock};

use tracking::PoseReport;

/// Application state shared across all components
#[derive(Debug)]
pub struct AppState {
    /// Current configuration
    pub config: RwLock<Config>,
    /// Most recent pose report from the tracker
    pub latest_pose: RwLock<PoseReport>,
    /// Channel for pose report updates
    pub pose_tx: broadcast::Sender<PoseReport>,
    /// Shutdown signal
    pub shutdown_tx: broadcast::Sender<()>,
    /// Whether the tracker subprocess/receiver is delivering data
    pub tracker_alive: AtomicBool,
    /// Tracker restart signal
    pub tracker_restart: Notify,
    /// Config changed signal
    pub config_changed: Notify,
}

impl AppState {
    /// Create a new application state with the given configuration
    pub fn new(config: Config) -> Arc<Self> {
        let (pose_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);

        Arc::new(Self {
            config: RwLock::new(config),
            latest_pose: RwLock::new(PoseReport::default()),
            pose_tx,
            shutdown_tx,
            tracker_alive: AtomicBool::new(false),
            tracker_restart: Notify::new(),
            config_changed: Notify::new(),
        })
    }

    /// Store the latest pose report and broadcast the change
    pub async fn update_pose(&self, report: PoseReport) {
        let mut current = self.latest_pose.write().await;
        *current = report.clone();
        let _ = self.pose_tx.send(report);
    }

    /// Get the most recent pose report
    pub async fn get_pose(&self) -> PoseReport {
        self.latest_pose.read().await.clone()
    }

    /// Subscribe to pose report updates
    pub fn subscribe_pose(&self) -> broadcast::Receiver<PoseReport> {
        self.pose_tx.subscribe()
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Set tracker liveness status
    pub fn set_tracker_alive(&self, alive: bool) {
        self.tracker_alive.store(alive, Ordering::Relaxed);
    }

    /// Whether the tracker is currently delivering data
    pub fn is_tracker_alive(&self) -> bool {
        self.tracker_alive.load(Ordering::Relaxed)
    }

    /// Signal the tracker service to restart
    pub fn signal_tracker_restart(&self) {
        self.tracker_restart.notify_one();
    }

    /// Wait for a tracker restart signal
    pub async fn wait_tracker_restart(&self) {
        self.tracker_restart.notified().await;
    }

    /// Signal that config has changed
    pub fn signal_config_changed(&self) {
        self.config_changed.notify_waiters();
    }

    /// Wait for config change signal
    pub async fn wait_config_changed(&self) {
        self.config_changed.notified().await;
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
