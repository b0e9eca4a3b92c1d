use crate::alignment::AlignmentObserver;
use crate::overlay::{Ensure, OverlayManager};
use crate::page::Document;
use crate::storage::StripStore;
use crate::style::OverlayStyle;
use std::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Fixed-interval loop that keeps the overlay and its alignment up to date
pub struct Driver {
    document: Arc<Document>,
    manager: Arc<OverlayManager>,
    interval: Duration,
    store: Option<StripStore>,
}

impl Driver {
    pub fn new(document: Arc<Document>, manager: Arc<OverlayManager>, interval: Duration) -> Self {
        Self {
            document,
            manager,
            interval,
            store: None,
        }
    }

    /// Persist every finished strip into `store`.
    pub fn with_store(mut self, store: StripStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_style(self, style: &OverlayStyle) -> Self {
        self.document.inject_stylesheet(style.stylesheet());
        self
    }

    /// Tick until `shutdown` is notified.
    ///
    /// Every tick starts an overlay check without waiting for the previous
    /// one, and starts the alignment observer once the page has time labels.
    pub async fn run(self, shutdown: Arc<Notify>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut signal = pin::pin!(shutdown.notified());
        let mut observer: Option<AlignmentObserver> = None;

        info!("driver: checking every {:?}", self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                _ = &mut signal => {
                    info!("driver: shutdown");
                    break;
                }
            }

            self.spawn_ensure();

            if observer.as_ref().map_or(true, |o| !o.is_active()) {
                match AlignmentObserver::new(self.document.clone()) {
                    Ok(started) => observer = Some(started),
                    Err(e) => debug!("driver: {}", e),
                }
            }
        }

        if let Some(mut observer) = observer {
            observer.destroy();
        }
    }

    fn spawn_ensure(&self) {
        let manager = self.manager.clone();
        let document = self.document.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            match manager.ensure(&document).await {
                Ok(Ensure::Built {
                    video_id, mosaic, ..
                }) => {
                    let canvas = mosaic.canvas();
                    let report = mosaic.finish().await;
                    info!(
                        "strip for {}: {}/{} sheets loaded",
                        video_id, report.loaded, report.sheets
                    );

                    if let Some(store) = store {
                        match store.save(&video_id, &canvas.snapshot()).await {
                            Ok(path) => info!("strip for {} saved to {}", video_id, path.display()),
                            Err(e) => error!("strip for {}: {}", video_id, e),
                        }
                    }
                }
                Ok(outcome) => debug!("driver: {:?}", outcome),
                Err(e) => error!("timelens: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimelensError;
    use crate::mosaic::{Compositor, SheetLoader};
    use crate::storyboard::InfoSource;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};

    struct Fixed;

    #[async_trait]
    impl InfoSource for Fixed {
        async fn video_info(&self, _video_id: &str) -> Result<String, TimelensError> {
            let json = serde_json::json!({
                "videoDetails": { "lengthSeconds": "600" },
                "storyboards": { "playerStoryboardSpecRenderer": {
                    "spec": "mem://sb/$L/$N|4#3#6#3#1#0#default#s"
                } },
            })
            .to_string();

            Ok(url::form_urlencoded::Serializer::new(String::new())
                .append_pair("player_response", &json)
                .finish())
        }
    }

    #[async_trait]
    impl SheetLoader for Fixed {
        async fn load(&self, _url: &str) -> Result<RgbaImage, TimelensError> {
            Ok(RgbaImage::from_pixel(12, 3, Rgba([5, 6, 7, 255])))
        }
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn run_builds_aligns_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let document = Arc::new(Document::new());
        document.navigate("https://www.youtube.com/watch?v=abc");
        document.ensure_progress_bar().set_value_max("600");

        let source = Arc::new(Fixed);
        let manager = Arc::new(OverlayManager::new(
            source.clone(),
            Compositor::new(source),
        ));
        let driver = Driver::new(document.clone(), manager, Duration::from_millis(10))
            .with_store(StripStore::new(dir.path()))
            .with_style(&OverlayStyle::default());
        assert!(document.stylesheet().is_some());

        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(driver.run(shutdown.clone()));

        wait_for(|| document.overlay().is_some()).await;
        let png = dir.path().join("abc.png");
        wait_for(|| png.exists()).await;

        let (left, right) = document.ensure_time_labels("0:00", "10:00");
        let overlay = document.overlay().unwrap();
        left.set_text("1:00");
        // the observer only sees changes made after a tick picked up the labels
        wait_for(|| {
            right.set_text("3:00");
            overlay
                .transform()
                .is_some_and(|t| (t.scale_x - 5.0).abs() < 1e-12)
        })
        .await;

        shutdown.notify_waiters();
        handle.await.unwrap();
    }
}
