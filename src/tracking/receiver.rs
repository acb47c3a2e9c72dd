//! Pose packet receiver
//!
//! Receives JSON-over-UDP packets from the `scripts/pose_tracker.py` helper.
//! The socket is drained on every call and only the newest packet is kept:
//! when detection runs slower than capture, stale frames are dropped
//! silently.

use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::TrackerConfig;
use crate::error::{PosemirrorError, TrackingError};
use crate::tracking::landmarks::{PosePacket, PoseReport};

/// JSON-over-UDP pose receiver
pub struct PoseReceiver {
    config: TrackerConfig,
    socket: Option<UdpSocket>,
    latest: Arc<RwLock<PoseReport>>,
}

impl PoseReceiver {
    /// Create a new receiver (does not bind yet)
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            latest: Arc::new(RwLock::new(PoseReport::default())),
        }
    }

    /// Bind the UDP socket and start receiving
    pub fn start(&mut self) -> Result<(), PosemirrorError> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.port);

        let socket = UdpSocket::bind(&addr).map_err(|e| {
            TrackingError::Receiver(format!("Failed to bind to {}: {}", addr, e))
        })?;

        socket.set_nonblocking(true).map_err(|e| {
            TrackingError::Receiver(format!("Failed to set non-blocking: {}", e))
        })?;

        socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .ok();

        tracing::info!("Pose receiver listening on {}", addr);
        self.socket = Some(socket);

        Ok(())
    }

    /// Drain pending packets (non-blocking) and return the newest report, if
    /// any packet arrived during this call.
    pub async fn process(&self) -> Result<Option<PoseReport>, PosemirrorError> {
        let socket = match &self.socket {
            Some(s) => s,
            None => return Ok(None),
        };

        let mut buf = [0u8; 65536];
        let mut newest: Option<PoseReport> = None;

        loop {
            match socket.recv(&mut buf) {
                Ok(size) if size > 0 => {
                    let packet: PosePacket =
                        serde_json::from_slice(&buf[..size]).map_err(|e| {
                            TrackingError::Parse(format!("JSON parse error: {}", e))
                        })?;
                    newest = Some(packet.into_report().map_err(PosemirrorError::from)?);
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    return Err(
                        TrackingError::Receiver(format!("Receive error: {}", e)).into(),
                    );
                }
            }
        }

        if let Some(report) = newest {
            let mut latest = self.latest.write().await;
            *latest = report.clone();
            return Ok(Some(report));
        }

        Ok(None)
    }

    /// Get the most recently received report
    pub async fn latest(&self) -> PoseReport {
        self.latest.read().await.clone()
    }

    /// Stop the receiver
    pub fn stop(&mut self) {
        self.socket = None;
        tracing::info!("Pose receiver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::landmarks::PoseLandmark;

    fn test_config(port: u16) -> TrackerConfig {
        TrackerConfig {
            port,
            ..Default::default()
        }
    }

    fn sample_packet() -> String {
        let point = [0.4f32, 0.6, 0.0, 0.95];
        serde_json::json!({
            "pose_detected": true,
            "landmarks": vec![point; PoseLandmark::COUNT],
            "world_landmarks": vec![point; PoseLandmark::COUNT],
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_process_without_start() {
        let receiver = PoseReceiver::new(&test_config(12399));
        let result = receiver.process().await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_receive_packet() {
        let mut receiver = PoseReceiver::new(&test_config(12398));
        receiver.start().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(sample_packet().as_bytes(), "127.0.0.1:12398")
            .unwrap();

        // UDP delivery on loopback is fast but not instant
        let mut report = None;
        for _ in 0..50 {
            if let Some(r) = receiver.process().await.unwrap() {
                report = Some(r);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let report = report.expect("should receive a pose report");
        assert!(report.detected);
        assert_eq!(
            report.image_landmark(PoseLandmark::Nose),
            Some([0.4, 0.6, 0.0, 0.95])
        );

        // The latest cache holds the report too
        assert_eq!(receiver.latest().await, report);
    }

    #[tokio::test]
    async fn test_newest_packet_wins() {
        let mut receiver = PoseReceiver::new(&test_config(12397));
        receiver.start().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(sample_packet().as_bytes(), "127.0.0.1:12397")
            .unwrap();
        sender
            .send_to(br#"{"pose_detected":false}"#, "127.0.0.1:12397")
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut report = None;
        for _ in 0..50 {
            if let Some(r) = receiver.process().await.unwrap() {
                report = Some(r);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Both datagrams drained in one call; the later one is kept
        let report = report.expect("should receive a pose report");
        assert!(!report.detected);
    }
}
