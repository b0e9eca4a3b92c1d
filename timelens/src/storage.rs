use crate::error::TimelensError;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

/// Writes finished strips as PNG files
#[derive(Debug, Clone)]
pub struct StripStore {
    base_path: Arc<PathBuf>,
}

impl StripStore {
    /// Create a new store rooted at the given directory
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: Arc::new(path.into()),
        }
    }

    /// Save the strip of `video_id` as `<video_id>.png` in the store directory.
    pub async fn save(&self, video_id: &str, strip: &RgbaImage) -> Result<PathBuf, TimelensError> {
        let path = self.base_path.join(format!("{}.png", video_id));
        write_png(&path, strip).await?;
        Ok(path)
    }
}

/// Encode `image` as PNG and write it to `path`, creating parent directories.
pub async fn write_png(path: &Path, image: &RgbaImage) -> Result<(), TimelensError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(TimelensError::StorageError(format!(
            "{}: empty strip",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            error!("Failed to create directory {}: {}", parent.display(), e);
            TimelensError::StorageError(format!("Failed to create directory: {}", e))
        })?;
    }

    let mut content = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut content), ImageFormat::Png)
        .map_err(|e| TimelensError::StorageError(format!("Failed to encode png: {}", e)))?;

    tokio::fs::write(path, content).await.map_err(|e| {
        error!("Failed to write file {}: {}", path.display(), e);
        TimelensError::StorageError(format!("Failed to write file: {}", e))
    })?;

    debug!("Successfully wrote file: {}", path.display());
    Ok(())
}
