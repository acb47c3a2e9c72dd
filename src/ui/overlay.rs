//! 2D landmark guide overlay.
//!
//! Draws the tracked image-space landmarks and their skeleton connections
//! with the egui painter: connections first, points on top.

use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke};

use crate::tracking::{PoseReport, POSE_CONNECTIONS};

/// Skeleton connection color
const CONNECTION_COLOR: Color32 = Color32::from_rgb(0x00, 0xcf, 0xf7);
/// Landmark point color
const LANDMARK_COLOR: Color32 = Color32::from_rgb(0xff, 0x03, 0x64);

const CONNECTION_WIDTH: f32 = 3.0;
const LANDMARK_RADIUS: f32 = 2.5;

/// Draw the landmark guide into `rect`.
pub fn draw_pose_overlay(
    painter: &Painter,
    rect: Rect,
    report: &PoseReport,
    mirror: bool,
    visibility_threshold: f32,
) {
    painter.rect_filled(rect, 2.0, Color32::from_black_alpha(160));

    if !report.detected {
        return;
    }

    let project = |idx: usize| -> Option<Pos2> {
        let p = report.landmarks.get(idx)?;
        if p[3] < visibility_threshold {
            return None;
        }
        Some(to_rect_pos(p[0], p[1], rect, mirror))
    };

    // Connections under the points
    for (a, b) in POSE_CONNECTIONS {
        if let (Some(pa), Some(pb)) = (project(a.index()), project(b.index())) {
            painter.line_segment([pa, pb], Stroke::new(CONNECTION_WIDTH, CONNECTION_COLOR));
        }
    }

    for idx in 0..report.landmarks.len() {
        if let Some(p) = project(idx) {
            painter.circle_filled(p, LANDMARK_RADIUS, LANDMARK_COLOR);
        }
    }
}

/// Map a normalized image coordinate into the overlay rect.
fn to_rect_pos(x: f32, y: f32, rect: Rect, mirror: bool) -> Pos2 {
    let x = if mirror { 1.0 - x } else { x };
    Pos2::new(
        rect.left() + x.clamp(0.0, 1.0) * rect.width(),
        rect.top() + y.clamp(0.0, 1.0) * rect.height(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Rect {
        Rect::from_min_size(Pos2::new(10.0, 20.0), eframe::egui::Vec2::new(200.0, 100.0))
    }

    #[test]
    fn test_to_rect_pos_corners() {
        let r = rect();
        assert_eq!(to_rect_pos(0.0, 0.0, r, false), Pos2::new(10.0, 20.0));
        assert_eq!(to_rect_pos(1.0, 1.0, r, false), Pos2::new(210.0, 120.0));
    }

    #[test]
    fn test_to_rect_pos_mirrored() {
        let r = rect();
        assert_eq!(to_rect_pos(0.0, 0.0, r, true), Pos2::new(210.0, 20.0));
        assert_eq!(to_rect_pos(0.25, 0.5, r, true), Pos2::new(160.0, 70.0));
    }

    #[test]
    fn test_to_rect_pos_clamps_out_of_frame() {
        let r = rect();
        let p = to_rect_pos(1.5, -0.5, r, false);
        assert_eq!(p, Pos2::new(210.0, 20.0));
    }
}
