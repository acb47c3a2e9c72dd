//! Rigging: maps detected pose landmarks onto the avatar skeleton.
//!
//! `solver` turns world-space landmarks into per-bone target rotations and a
//! hips translation; `apply` advances the avatar's pose toward those targets
//! with damped interpolation; `smoothing` filters raw landmarks before the
//! solve.

pub mod apply;
pub mod smoothing;
pub mod solver;

pub use apply::BoneRig;
pub use smoothing::{LandmarkSmoother, SmoothingMode};
pub use solver::{RigSolver, RigTargets};
