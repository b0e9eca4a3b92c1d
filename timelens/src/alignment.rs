use crate::error::TimelensError;
use crate::page::Document;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Horizontal transform applied to the overlay, anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale_x: f64,
    pub translate_x_percent: f64,
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scaleX({}) translateX({}%)",
            self.scale_x, self.translate_x_percent
        )
    }
}

/// The part of the video currently shown by the progress bar, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressWindow {
    pub length: u64,
    pub start: u64,
    pub end: u64,
}

impl ProgressWindow {
    pub fn offset(&self) -> f64 {
        self.start as f64 / self.length as f64
    }

    pub fn zoom(&self) -> f64 {
        self.length as f64 / (self.end as f64 - self.start as f64)
    }

    /// None for an empty video or an empty window.
    pub fn transform(&self) -> Option<Transform> {
        if self.length == 0 || self.end <= self.start {
            return None;
        }

        Some(Transform {
            scale_x: self.zoom(),
            translate_x_percent: -self.offset() * 100.0,
        })
    }
}

/// Parse a `[[[d:]h:]m:]s` time label into seconds.
///
/// Fields are read right to left. Hours are scaled by 60 like minutes, days by
/// a full day.
pub fn parse_time(text: &str) -> Result<u64, TimelensError> {
    let mut values = text.trim().split(':').rev().map(|field| {
        field
            .trim()
            .parse::<u64>()
            .map_err(|_| TimelensError::ParseError(format!("invalid time label: {:?}", text)))
    });

    let mut seconds = match values.next() {
        Some(value) => value?,
        None => return Err(TimelensError::ParseError("empty time label".to_string())),
    };
    for scale in [60, 60, 60 * 60 * 24] {
        let value = match values.next() {
            Some(value) => value?,
            None => break,
        };
        seconds = value
            .checked_mul(scale)
            .and_then(|scaled| scaled.checked_add(seconds))
            .ok_or_else(|| {
                TimelensError::ParseError(format!("time label out of range: {:?}", text))
            })?;
    }

    Ok(seconds)
}

/// Keeps the overlay aligned with the progress bar's visible window.
///
/// Watches the two bound time labels and re-applies the overlay transform on
/// every change. Stops when destroyed or dropped.
pub struct AlignmentObserver {
    document: Arc<Document>,
    left: watch::Receiver<String>,
    right: watch::Receiver<String>,
    task: Option<JoinHandle<()>>,
}

impl AlignmentObserver {
    /// Fails with `ObserverInit` until both time labels exist.
    pub fn new(document: Arc<Document>) -> Result<Self, TimelensError> {
        let (left, right) = document
            .time_labels()
            .ok_or_else(|| TimelensError::ObserverInit("no video loaded yet".to_string()))?;

        let left = left.subscribe();
        let right = right.subscribe();
        let task = tokio::spawn(watch_labels(
            document.clone(),
            left.clone(),
            right.clone(),
        ));

        info!("alignment observer started");
        Ok(Self {
            document,
            left,
            right,
            task: Some(task),
        })
    }

    /// Recompute the window and apply it to the mounted overlay.
    pub fn realign(&self) -> Result<Option<Transform>, TimelensError> {
        let left = self.left.borrow().clone();
        let right = self.right.borrow().clone();
        apply(&self.document, &left, &right)
    }

    /// False once destroyed or once the watched labels are gone.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn destroy(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("alignment observer stopped");
        }
    }
}

impl Drop for AlignmentObserver {
    fn drop(&mut self) {
        self.destroy();
    }
}

async fn watch_labels(
    document: Arc<Document>,
    mut left: watch::Receiver<String>,
    mut right: watch::Receiver<String>,
) {
    loop {
        let changed = tokio::select! {
            changed = left.changed() => changed,
            changed = right.changed() => changed,
        };
        if changed.is_err() {
            debug!("time labels detached");
            return;
        }

        let start = left.borrow_and_update().clone();
        let end = right.borrow_and_update().clone();
        match apply(&document, &start, &end) {
            Ok(Some(transform)) => debug!("overlay transform: {}", transform),
            Ok(None) => {}
            Err(e) => debug!("realign: {}", e),
        }
    }
}

fn apply(document: &Document, start: &str, end: &str) -> Result<Option<Transform>, TimelensError> {
    let bar = match document.progress_bar() {
        Some(bar) => bar,
        None => return Ok(None),
    };
    let overlay = match bar.overlay() {
        Some(overlay) => overlay,
        None => return Ok(None),
    };

    let window = ProgressWindow {
        length: bar.length()?,
        start: parse_time(start)?,
        end: parse_time(end)?,
    };

    let transform = window.transform();
    if let Some(transform) = transform {
        overlay.set_transform(transform);
    }

    Ok(transform)
}
