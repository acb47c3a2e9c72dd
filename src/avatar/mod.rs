//! Avatar model loading and retrieval

pub mod fetch;
pub mod model;

pub use fetch::ensure_model;
pub use model::AvatarModel;
