use crate::error::TimelensError;
use crate::mosaic::{Compositor, Mosaic};
use crate::page::{Document, Overlay};
use crate::storyboard::{InfoSource, Storyboard};
use crate::video_id;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one `ensure` call
#[derive(Debug)]
pub enum Ensure {
    /// The location does not point at a video
    NoVideo,
    /// The mounted overlay already belongs to the current video
    Unchanged,
    /// A build for the current video is already running
    InFlight,
    /// The page moved to another video while this one was being built
    Stale { video_id: String },
    /// A new overlay was mounted; its sheets may still be loading
    Built {
        video_id: String,
        frames: u32,
        removed: usize,
        mosaic: Mosaic,
    },
}

/// Keeps the mounted overlay in sync with the video the page shows.
pub struct OverlayManager {
    source: Arc<dyn InfoSource + Send + Sync>,
    compositor: Compositor,
    in_flight: Mutex<Option<String>>,
}

impl OverlayManager {
    pub fn new(source: Arc<dyn InfoSource + Send + Sync>, compositor: Compositor) -> Self {
        Self {
            source,
            compositor,
            in_flight: Mutex::new(None),
        }
    }

    /// Make sure the overlay matches the current video, rebuilding it if needed.
    ///
    /// On error the previously mounted overlay stays in place.
    pub async fn ensure(&self, document: &Document) -> Result<Ensure, TimelensError> {
        let video_id = match video_id::extract(&document.location()) {
            Some(video_id) => video_id,
            None => return Ok(Ensure::NoVideo),
        };

        let bar = document
            .progress_bar()
            .ok_or_else(|| TimelensError::Dom("progress bar not found".to_string()))?;

        if let Some(current) = bar.overlay() {
            if current.video_id() == video_id {
                debug!("overlay for {} is up to date", video_id);
                return Ok(Ensure::Unchanged);
            }
        }

        let result = {
            let _building = match BuildGuard::acquire(&self.in_flight, &video_id) {
                Some(guard) => guard,
                None => {
                    debug!("overlay for {} is already being built", video_id);
                    return Ok(Ensure::InFlight);
                }
            };
            self.build(&video_id).await
        };

        let (overlay, mosaic) = result?;
        if video_id::extract(&document.location()).as_deref() != Some(video_id.as_str()) {
            info!("discarding overlay for {}: page moved on", video_id);
            return Ok(Ensure::Stale { video_id });
        }

        let frames = overlay.canvas().width();
        let removed = bar.replace_overlays(overlay);
        info!(
            "overlay mounted for {}: {} frames, {} removed",
            video_id, frames, removed
        );

        Ok(Ensure::Built {
            video_id,
            frames,
            removed,
            mosaic,
        })
    }

    async fn build(&self, video_id: &str) -> Result<(Overlay, Mosaic), TimelensError> {
        let payload = self.source.video_info(video_id).await?;
        let storyboard = Storyboard::from_info(&payload)?;
        let level = storyboard
            .best_level()
            .ok_or_else(|| TimelensError::ParseError("storyboard has no levels".to_string()))?;

        debug!(
            "{}: {}s, {} levels, using {}x{} tiles",
            video_id,
            storyboard.length_seconds,
            storyboard.levels.len(),
            level.tile_width,
            level.tile_height
        );

        let mosaic = self.compositor.compose(level);
        let overlay = Overlay::new(video_id, mosaic.canvas());
        Ok((overlay, mosaic))
    }
}

/// Marks a video as being built until dropped, including on unwind.
struct BuildGuard<'a> {
    in_flight: &'a Mutex<Option<String>>,
    video_id: &'a str,
}

impl<'a> BuildGuard<'a> {
    fn acquire(in_flight: &'a Mutex<Option<String>>, video_id: &'a str) -> Option<Self> {
        let mut current = in_flight.lock();
        if current.as_deref() == Some(video_id) {
            return None;
        }
        *current = Some(video_id.to_string());

        Some(Self {
            in_flight,
            video_id,
        })
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        let mut current = self.in_flight.lock();
        if current.as_deref() == Some(self.video_id) {
            *current = None;
        }
    }
}
