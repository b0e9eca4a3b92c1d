use crate::error::TimelensError;
use crate::storyboard::StoryboardLevel;
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Loads and decodes one sprite sheet.
#[async_trait]
pub trait SheetLoader {
    async fn load(&self, url: &str) -> Result<RgbaImage, TimelensError>;
}

/// Shared RGBA drawing surface. Clones draw into the same pixels.
#[derive(Clone)]
pub struct Canvas {
    pixels: Arc<Mutex<RgbaImage>>,
    width: u32,
    height: u32,
}

impl Canvas {
    /// Create a fully transparent canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: Arc::new(Mutex::new(RgbaImage::new(width, height))),
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Copy `column` onto the canvas with its left edge at `x`.
    pub fn draw_column(&self, x: u32, column: &RgbaImage) {
        if x >= self.width {
            return;
        }

        let mut pixels = self.pixels.lock();
        imageops::replace(&mut *pixels, column, x as i64, 0);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        let pixels = self.pixels.lock();
        pixels.get_pixel_checked(x, y).copied()
    }

    pub fn snapshot(&self) -> RgbaImage {
        self.pixels.lock().clone()
    }
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Builds timeline strips from storyboard sheets
#[derive(Clone)]
pub struct Compositor {
    loader: Arc<dyn SheetLoader + Send + Sync>,
}

impl Compositor {
    pub fn new(loader: Arc<dyn SheetLoader + Send + Sync>) -> Self {
        Self { loader }
    }

    /// Start drawing `level` into a new canvas with one column per frame.
    ///
    /// Every sheet is loaded and drawn by its own task. Sheets own disjoint
    /// column ranges, so they may complete in any order and a failed sheet
    /// only leaves its own columns blank. Must be called within a tokio runtime.
    pub fn compose(&self, level: &StoryboardLevel) -> Mosaic {
        let canvas = Canvas::new(level.frame_count, level.tile_height);
        let level = Arc::new(level.clone());
        let sheets = level.sheet_count();

        let mut pending = JoinSet::new();
        for sheet in 0..sheets {
            let loader = self.loader.clone();
            let level = level.clone();
            let canvas = canvas.clone();
            pending.spawn(async move {
                match draw_sheet(loader.as_ref(), &level, sheet, &canvas).await {
                    Ok(frames) => {
                        debug!("sheet {}: {} frames drawn", sheet, frames);
                        true
                    }
                    Err(e) => {
                        warn!("sheet {}: {}", sheet, e);
                        false
                    }
                }
            });
        }

        Mosaic {
            canvas,
            sheets: sheets as usize,
            pending,
        }
    }
}

/// A strip whose sheets are still being drawn.
///
/// Dropping it without `finish` leaves the sheet tasks running.
pub struct Mosaic {
    canvas: Canvas,
    sheets: usize,
    pending: JoinSet<bool>,
}

/// Outcome of all sheet loads of a mosaic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicReport {
    pub sheets: usize,
    pub loaded: usize,
    pub failed: usize,
}

impl Mosaic {
    /// The live surface; columns appear as their sheets complete.
    pub fn canvas(&self) -> Canvas {
        self.canvas.clone()
    }

    /// Wait for every sheet task.
    pub async fn finish(mut self) -> MosaicReport {
        let mut report = MosaicReport {
            sheets: self.sheets,
            loaded: 0,
            failed: 0,
        };

        while let Some(joined) = self.pending.join_next().await {
            match joined {
                Ok(true) => report.loaded += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    warn!("sheet task: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

impl fmt::Debug for Mosaic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mosaic")
            .field("canvas", &self.canvas)
            .field("sheets", &self.sheets)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Drop for Mosaic {
    fn drop(&mut self) {
        self.pending.detach_all();
    }
}

async fn draw_sheet(
    loader: &(dyn SheetLoader + Send + Sync),
    level: &StoryboardLevel,
    sheet: u32,
    canvas: &Canvas,
) -> Result<usize, TimelensError> {
    let image = loader.load(&level.sheet_url(sheet)).await?;

    let mut drawn = 0;
    for frame in level.frames(sheet) {
        let tile = level.tile(frame);
        let column = sample_column(
            &image,
            tile.x,
            tile.y,
            level.tile_width,
            level.tile_height,
        );

        if let Some(column) = column {
            canvas.draw_column(frame, &column);
            drawn += 1;
        }
    }

    Ok(drawn)
}

/// Squeeze the `width` x `height` tile at (`x`, `y`) into a single column.
/// The tile is clipped to the sheet bounds and the column keeps only the
/// clipped rows, leaving the rest of the strip height blank.
fn sample_column(sheet: &RgbaImage, x: u32, y: u32, width: u32, height: u32) -> Option<RgbaImage> {
    if x >= sheet.width() || y >= sheet.height() || height == 0 {
        return None;
    }

    let width = width.min(sheet.width() - x);
    let clipped = height.min(sheet.height() - y);
    if width == 0 || clipped == 0 {
        return None;
    }

    let tile = imageops::crop_imm(sheet, x, y, width, clipped).to_image();
    Some(imageops::resize(&tile, 1, clipped, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storyboard::Storyboard;
    use std::collections::HashSet;

    const TILE_WIDTH: u32 = 4;
    const TILE_HEIGHT: u32 = 3;

    fn level(count: u32, columns: u32, rows: u32) -> StoryboardLevel {
        let spec = format!(
            "mem://sheets/L$L/$N|{}#{}#{}#{}#{}#0#default#sig",
            TILE_WIDTH, TILE_HEIGHT, count, columns, rows
        );
        Storyboard::from_spec(60, &spec).unwrap().levels.remove(0)
    }

    fn color(frame: u32) -> Rgba<u8> {
        Rgba([(frame * 7 % 256) as u8, (frame * 13 % 256) as u8, 200, 255])
    }

    /// Paints every tile in the color of the frame it holds.
    struct SyntheticSheets {
        columns: u32,
        rows: u32,
        failing: HashSet<u32>,
    }

    impl SyntheticSheets {
        fn sheet_index(url: &str) -> u32 {
            let name = url.rsplit('/').next().unwrap();
            let name = name.split('&').next().unwrap();
            name.parse().unwrap()
        }
    }

    #[async_trait]
    impl SheetLoader for SyntheticSheets {
        async fn load(&self, url: &str) -> Result<RgbaImage, TimelensError> {
            let sheet = Self::sheet_index(url);
            if self.failing.contains(&sheet) {
                return Err(TimelensError::ImageLoadError(format!("{}: 404", url)));
            }

            let size = self.columns * self.rows;
            Ok(RgbaImage::from_fn(
                self.columns * TILE_WIDTH,
                self.rows * TILE_HEIGHT,
                |x, y| {
                    let frame = sheet * size + (y / TILE_HEIGHT) * self.columns + x / TILE_WIDTH;
                    color(frame)
                },
            ))
        }
    }

    fn compositor(columns: u32, rows: u32, failing: &[u32]) -> Compositor {
        Compositor::new(Arc::new(SyntheticSheets {
            columns,
            rows,
            failing: failing.iter().copied().collect(),
        }))
    }

    fn assert_close(actual: Rgba<u8>, expected: Rgba<u8>) {
        for (a, e) in actual.0.iter().zip(expected.0.iter()) {
            assert!(a.abs_diff(*e) <= 1, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn sample_column_squeezes_tile() {
        let sheet = RgbaImage::from_pixel(8, 6, Rgba([10, 20, 30, 255]));
        let column = sample_column(&sheet, 4, 3, 4, 3).unwrap();
        assert_eq!(column.dimensions(), (1, 3));
        assert_close(*column.get_pixel(0, 2), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn sample_column_outside_sheet() {
        let sheet = RgbaImage::new(8, 6);
        assert!(sample_column(&sheet, 8, 0, 4, 3).is_none());
        assert!(sample_column(&sheet, 0, 6, 4, 3).is_none());
    }

    #[test]
    fn sample_column_keeps_clipped_rows() {
        let sheet = RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255]));
        let column = sample_column(&sheet, 0, 3, 4, 3).unwrap();
        assert_eq!(column.dimensions(), (1, 1));

        let canvas = Canvas::new(1, 3);
        canvas.draw_column(0, &column);
        assert_close(canvas.pixel(0, 0).unwrap(), Rgba([10, 20, 30, 255]));
        assert_eq!(canvas.pixel(0, 1), Some(Rgba([0, 0, 0, 0])));
        assert_eq!(canvas.pixel(0, 2), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn canvas_ignores_columns_past_the_edge() {
        let canvas = Canvas::new(2, 2);
        let column = RgbaImage::from_pixel(1, 2, Rgba([1, 2, 3, 255]));
        canvas.draw_column(5, &column);
        canvas.draw_column(1, &column);
        assert_eq!(canvas.pixel(0, 0), Some(Rgba([0, 0, 0, 0])));
        assert_eq!(canvas.pixel(1, 1), Some(Rgba([1, 2, 3, 255])));
        assert_eq!(canvas.pixel(2, 0), None);
    }

    #[tokio::test]
    async fn compose_places_every_frame() {
        let level = level(25, 2, 2);
        let mosaic = compositor(2, 2, &[]).compose(&level);
        let canvas = mosaic.canvas();
        assert_eq!((canvas.width(), canvas.height()), (25, TILE_HEIGHT));

        let report = mosaic.finish().await;
        assert_eq!(report.sheets, 7);
        assert_eq!(report.loaded, 7);
        assert_eq!(report.failed, 0);

        for frame in 0..25 {
            assert_close(canvas.pixel(frame, 0).unwrap(), color(frame));
            assert_close(canvas.pixel(frame, TILE_HEIGHT - 1).unwrap(), color(frame));
        }
    }

    #[tokio::test]
    async fn compose_frame_on_later_sheet() {
        let level = level(250, 10, 10);
        let mosaic = compositor(10, 10, &[]).compose(&level);
        let canvas = mosaic.canvas();
        let report = mosaic.finish().await;
        assert_eq!(report.sheets, 3);

        assert_close(canvas.pixel(105, 1).unwrap(), color(105));
        assert_close(canvas.pixel(249, 1).unwrap(), color(249));
    }

    #[tokio::test]
    async fn failed_sheet_leaves_its_columns_blank() {
        let level = level(10, 2, 2);
        let mosaic = compositor(2, 2, &[1]).compose(&level);
        let canvas = mosaic.canvas();

        let report = mosaic.finish().await;
        assert_eq!(report.sheets, 3);
        assert_eq!(report.loaded, 2);
        assert_eq!(report.failed, 1);

        for frame in 4..8 {
            assert_eq!(canvas.pixel(frame, 0), Some(Rgba([0, 0, 0, 0])));
        }
        assert_close(canvas.pixel(3, 0).unwrap(), color(3));
        assert_close(canvas.pixel(8, 0).unwrap(), color(8));
    }

    #[tokio::test]
    async fn compose_empty_level() {
        let level = level(0, 2, 2);
        let mosaic = compositor(2, 2, &[]).compose(&level);
        assert_eq!(mosaic.canvas().width(), 0);

        let report = mosaic.finish().await;
        assert_eq!(report.sheets, 0);
    }

    #[tokio::test]
    async fn dropped_mosaic_keeps_drawing() {
        let level = level(8, 2, 2);
        let canvas = compositor(2, 2, &[]).compose(&level).canvas();

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while canvas.pixel(7, 0) == Some(Rgba([0, 0, 0, 0])) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_close(canvas.pixel(7, 0).unwrap(), color(7));
    }
}
