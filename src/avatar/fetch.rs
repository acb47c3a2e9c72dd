//! Avatar model retrieval.
//!
//! Resolves the avatar file for loading: a local path wins; otherwise the
//! configured URL is downloaded once into the cache directory and reused on
//! subsequent runs.

use std::path::{Path, PathBuf};

use crate::config::AvatarConfig;
use crate::error::AvatarError;

/// Resolve the avatar model file, downloading it if necessary.
///
/// Performs blocking network IO; call from a blocking context
/// (`tokio::task::spawn_blocking` in async code).
pub fn ensure_model(config: &AvatarConfig) -> Result<PathBuf, AvatarError> {
    let path = PathBuf::from(&config.model_path);
    if path.exists() {
        return Ok(path);
    }

    let url = config.model_url.as_deref().ok_or_else(|| {
        AvatarError::ModelLoad(format!(
            "Model not found at {} and no model_url configured",
            path.display()
        ))
    })?;

    let cached = cache_path(&config.cache_dir, url);
    if cached.exists() {
        tracing::info!("Using cached avatar model: {}", cached.display());
        return Ok(cached);
    }

    download(url, &cached)?;
    Ok(cached)
}

/// Cache location for a model URL: cache_dir + the URL's file name.
fn cache_path(cache_dir: &Path, url: &str) -> PathBuf {
    let name = url
        .split('/')
        .next_back()
        .map(|segment| segment.split(['?', '#']).next().unwrap_or(segment))
        .filter(|name| !name.is_empty())
        .unwrap_or("avatar.vrm");

    cache_dir.join(name)
}

fn download(url: &str, dest: &Path) -> Result<(), AvatarError> {
    tracing::info!("Downloading avatar model from {}", url);

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AvatarError::Fetch(format!("Failed to create cache dir: {}", e)))?;
    }

    let response = reqwest::blocking::get(url)
        .map_err(|e| AvatarError::Fetch(format!("{}: {}", url, e)))?
        .error_for_status()
        .map_err(|e| AvatarError::Fetch(format!("{}: {}", url, e)))?;

    let bytes = response
        .bytes()
        .map_err(|e| AvatarError::Fetch(format!("Failed to read response body: {}", e)))?;

    std::fs::write(dest, &bytes)
        .map_err(|e| AvatarError::Fetch(format!("Failed to write {}: {}", dest.display(), e)))?;

    tracing::info!(
        "Avatar model saved to {} ({} bytes)",
        dest.display(),
        bytes.len()
    );
    Ok(())
}
