//! Native egui UI for posemirror.
//!
//! Provides a desktop window with:
//! - 3D avatar viewport driven by the bone rig
//! - 2D landmark guide overlay
//! - Tracker status panel

mod app;
mod overlay;
mod renderer;
mod skinning;
mod viewport;

pub use app::PoseMirrorApp;
