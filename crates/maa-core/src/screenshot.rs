//! Screenshot persistence
//!
//! `screencap` hands the agent a file path instead of inline image data so the
//! agent decides when to spend tokens on reading it. Every file written by a
//! store is remembered and removed again by [`ScreenshotStore::cleanup`], which
//! runs at shutdown.

use crate::AutomationError;
use chrono::Local;
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Default directory: `<local data dir>/maa-mcp/screenshots`
pub fn default_screenshot_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("maa-mcp")
        .join("screenshots")
}

/// Timestamped file name, unique down to the microsecond
pub fn generate_filename() -> String {
    format!("screenshot_{}.png", Local::now().format("%Y%m%d_%H%M%S_%6f"))
}

pub struct ScreenshotStore {
    dir: PathBuf,
    saved: Mutex<Vec<PathBuf>>,
}

impl Default for ScreenshotStore {
    fn default() -> Self {
        Self::new(default_screenshot_dir())
    }
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `image` as PNG and return its absolute path
    pub fn save(&self, image: &RgbaImage) -> Result<PathBuf, AutomationError> {
        fs::create_dir_all(&self.dir)?;
        let path = std::path::absolute(self.dir.join(generate_filename()))?;
        image.save_with_format(&path, ImageFormat::Png)?;

        info!(
            "[screenshot] Saved {}x{} frame to {}",
            image.width(),
            image.height(),
            path.display()
        );
        self.saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.clone());
        Ok(path)
    }

    /// Paths written by this store and not yet cleaned up
    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Delete every file saved so far, returning how many were removed
    pub fn cleanup(&self) -> usize {
        let paths: Vec<PathBuf> = self
            .saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();

        let mut removed = 0;
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("[screenshot] Already gone: {}", path.display());
                }
                Err(e) => warn!("[screenshot] Failed to remove {}: {}", path.display(), e),
            }
        }
        if removed > 0 {
            info!("[screenshot] Removed {} screenshot(s)", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_filename() {
        let name = generate_filename();
        assert!(name.starts_with("screenshot_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_default_dir_is_namespaced() {
        let dir = default_screenshot_dir();
        assert!(dir.to_string_lossy().contains("maa-mcp"));
        assert!(dir.ends_with("screenshots"));
    }

    #[test]
    fn test_save_and_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::new(tmp.path().join("shots"));
        let image = RgbaImage::from_pixel(4, 3, image::Rgba([255, 0, 0, 255]));

        let path = store.save(&image).unwrap();
        assert!(path.is_absolute());
        assert!(path.exists());
        assert_eq!(image::open(&path).unwrap().width(), 4);
        assert_eq!(store.saved(), vec![path.clone()]);

        assert_eq!(store.cleanup(), 1);
        assert!(!path.exists());
        assert!(store.saved().is_empty());
        assert_eq!(store.cleanup(), 0);
    }
}
