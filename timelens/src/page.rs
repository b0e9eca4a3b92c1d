//! Headless model of the player page: location, progress bar, time labels
//! and the overlay element mounted into the bar.

use crate::alignment::Transform;
use crate::error::TimelensError;
use crate::mosaic::Canvas;
use crate::storyboard::parse_int;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use tokio::sync::watch;

/// The page the overlay lives in
#[derive(Debug, Default)]
pub struct Document {
    location: RwLock<String>,
    progress_bar: RwLock<Option<ProgressBar>>,
    time_labels: RwLock<Option<(TextNode, TextNode)>>,
    stylesheet: RwLock<Option<String>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location(&self) -> String {
        self.location.read().clone()
    }

    pub fn navigate(&self, location: impl Into<String>) {
        *self.location.write() = location.into();
    }

    pub fn progress_bar(&self) -> Option<ProgressBar> {
        self.progress_bar.read().clone()
    }

    /// Returns the progress bar, creating an empty one if the page has none.
    pub fn ensure_progress_bar(&self) -> ProgressBar {
        self.progress_bar
            .write()
            .get_or_insert_with(ProgressBar::new)
            .clone()
    }

    /// The left and right bound time labels, once both are present.
    pub fn time_labels(&self) -> Option<(TextNode, TextNode)> {
        self.time_labels.read().clone()
    }

    /// Returns the time labels, creating them with the given text if missing.
    pub fn ensure_time_labels(&self, left: &str, right: &str) -> (TextNode, TextNode) {
        self.time_labels
            .write()
            .get_or_insert_with(|| (TextNode::new(left), TextNode::new(right)))
            .clone()
    }

    /// Removes the player controls, as happens when the page leaves a video.
    pub fn clear_player(&self) {
        self.progress_bar.write().take();
        self.time_labels.write().take();
    }

    /// The overlay currently mounted in the progress bar.
    pub fn overlay(&self) -> Option<Overlay> {
        self.progress_bar().and_then(|bar| bar.overlay())
    }

    pub fn inject_stylesheet(&self, css: String) {
        *self.stylesheet.write() = Some(css);
    }

    pub fn stylesheet(&self) -> Option<String> {
        self.stylesheet.read().clone()
    }
}

/// A text node whose changes can be subscribed to
#[derive(Debug, Clone)]
pub struct TextNode {
    tx: Arc<watch::Sender<String>>,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(text.into());
        Self { tx: Arc::new(tx) }
    }

    pub fn text(&self) -> String {
        self.tx.borrow().clone()
    }

    /// Replace the content and notify every subscriber.
    pub fn set_text(&self, text: impl Into<String>) {
        self.tx.send_replace(text.into());
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}

/// The scrub bar container the overlay is mounted into
#[derive(Debug, Clone)]
pub struct ProgressBar {
    inner: Arc<ProgressBarInner>,
}

#[derive(Debug, Default)]
struct ProgressBarInner {
    value_max: RwLock<Option<String>>,
    hovered: AtomicBool,
    dragging: AtomicBool,
    overlays: Mutex<Vec<Overlay>>,
    mutations: AtomicU64,
}

impl ProgressBar {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProgressBarInner::default()),
        }
    }

    /// Raw `aria-valuemax` attribute
    pub fn value_max(&self) -> Option<String> {
        self.inner.value_max.read().clone()
    }

    pub fn set_value_max(&self, value: impl Into<String>) {
        *self.inner.value_max.write() = Some(value.into());
    }

    /// Total video length in seconds, read from `aria-valuemax`.
    pub fn length(&self) -> Result<u64, TimelensError> {
        let value = self
            .value_max()
            .ok_or_else(|| TimelensError::Dom("progress bar has no aria-valuemax".to_string()))?;

        parse_int(&value)
            .ok_or_else(|| TimelensError::ParseError(format!("invalid aria-valuemax: {:?}", value)))
    }

    pub fn set_hovered(&self, hovered: bool) {
        self.inner.hovered.store(hovered, Relaxed);
    }

    pub fn set_dragging(&self, dragging: bool) {
        self.inner.dragging.store(dragging, Relaxed);
    }

    /// The overlay is only shown while the bar is hovered or dragged.
    pub fn overlay_visible(&self) -> bool {
        let shown = self.inner.hovered.load(Relaxed) || self.inner.dragging.load(Relaxed);
        shown && self.overlay().is_some()
    }

    pub fn overlay(&self) -> Option<Overlay> {
        self.inner.overlays.lock().first().cloned()
    }

    pub fn overlay_count(&self) -> usize {
        self.inner.overlays.lock().len()
    }

    /// Remove every mounted overlay, then mount `overlay`.
    /// Returns the number of overlays removed.
    pub fn replace_overlays(&self, overlay: Overlay) -> usize {
        let mut overlays = self.inner.overlays.lock();
        let removed = overlays.len();
        overlays.clear();
        overlays.push(overlay);
        self.inner.mutations.fetch_add(removed as u64 + 1, Relaxed);
        removed
    }

    /// Number of child insertions and removals so far
    pub fn mutations(&self) -> u64 {
        self.inner.mutations.load(Relaxed)
    }
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

/// The timeline strip element, tagged with the video it was built for
#[derive(Debug, Clone)]
pub struct Overlay {
    inner: Arc<OverlayInner>,
}

#[derive(Debug)]
struct OverlayInner {
    video_id: String,
    canvas: Canvas,
    transform: Mutex<Option<Transform>>,
}

impl Overlay {
    pub fn new(video_id: impl Into<String>, canvas: Canvas) -> Self {
        Self {
            inner: Arc::new(OverlayInner {
                video_id: video_id.into(),
                canvas,
                transform: Mutex::new(None),
            }),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.inner.video_id
    }

    pub fn canvas(&self) -> &Canvas {
        &self.inner.canvas
    }

    pub fn transform(&self) -> Option<Transform> {
        *self.inner.transform.lock()
    }

    pub fn set_transform(&self, transform: Transform) {
        *self.inner.transform.lock() = Some(transform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_overlays_counts_removals() {
        let bar = ProgressBar::new();
        assert_eq!(bar.replace_overlays(Overlay::new("a", Canvas::new(1, 1))), 0);
        assert_eq!(bar.mutations(), 1);

        assert_eq!(bar.replace_overlays(Overlay::new("b", Canvas::new(1, 1))), 1);
        assert_eq!(bar.mutations(), 3);
        assert_eq!(bar.overlay_count(), 1);
        assert_eq!(bar.overlay().unwrap().video_id(), "b");
    }

    #[test]
    fn length_reads_value_max() {
        let bar = ProgressBar::new();
        assert!(matches!(bar.length(), Err(TimelensError::Dom(_))));

        bar.set_value_max("600");
        assert_eq!(bar.length().unwrap(), 600);

        bar.set_value_max("n/a");
        assert!(matches!(bar.length(), Err(TimelensError::ParseError(_))));
    }

    #[test]
    fn overlay_visible_on_hover_or_drag() {
        let bar = ProgressBar::new();
        bar.set_hovered(true);
        assert!(!bar.overlay_visible());

        bar.replace_overlays(Overlay::new("a", Canvas::new(1, 1)));
        assert!(bar.overlay_visible());

        bar.set_hovered(false);
        assert!(!bar.overlay_visible());

        bar.set_dragging(true);
        assert!(bar.overlay_visible());
    }

    #[test]
    fn text_node_notifies_subscribers() {
        let node = TextNode::new("0:00");
        let mut rx = node.subscribe();
        node.set_text("1:00");
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), "1:00");
        assert_eq!(node.text(), "1:00");
    }

    #[test]
    fn clear_player_drops_controls() {
        let document = Document::new();
        document.ensure_progress_bar();
        document.ensure_time_labels("0:00", "1:00");
        assert!(document.time_labels().is_some());

        document.clear_player();
        assert!(document.progress_bar().is_none());
        assert!(document.time_labels().is_none());
    }
}
