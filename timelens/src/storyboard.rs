use crate::error::TimelensError;
use async_trait::async_trait;
use serde::Deserialize;
use std::ops::Range;

/// Placeholder for the sheet index inside a level URL.
pub const SHEET_PLACEHOLDER: &str = "$M";

const LEVEL_MARKER: &str = "$L";
const SHEET_NAME_MARKER: &str = "$N";
const DEFAULT_SHEET_TOKEN: &str = "default";

/// Fetches the raw info payload for a video.
#[async_trait]
pub trait InfoSource {
    async fn video_info(&self, video_id: &str) -> Result<String, TimelensError>;
}

/// Thumbnail sprite-sheet description of a whole video
#[derive(Debug, Clone, PartialEq)]
pub struct Storyboard {
    pub length_seconds: u64,
    /// Ordered from the lowest to the highest resolution
    pub levels: Vec<StoryboardLevel>,
}

/// One resolution tier of a storyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryboardLevel {
    pub tile_width: u32,
    pub tile_height: u32,
    pub frame_count: u32,
    pub columns: u32,
    pub rows: u32,
    pub sheet_token: String,
    pub signature: String,
    /// Sheet URL template; `$M` stands for the sheet index
    pub url: String,
}

/// Position of a single frame inside the sheet grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLocation {
    pub sheet: u32,
    pub row: u32,
    pub col: u32,
    pub x: u32,
    pub y: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    video_details: Option<VideoDetails>,
    storyboards: Option<Storyboards>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    length_seconds: Seconds,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Text(String),
    Number(u64),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Storyboards {
    player_storyboard_spec_renderer: Option<SpecRenderer>,
}

#[derive(Deserialize)]
struct SpecRenderer {
    spec: String,
}

impl Storyboard {
    /// Parse the form-encoded info payload returned for a video.
    pub fn from_info(payload: &str) -> Result<Self, TimelensError> {
        let player_response = url::form_urlencoded::parse(payload.as_bytes())
            .find(|(key, _)| key == "player_response")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| {
                TimelensError::ParseError("payload has no player_response field".to_string())
            })?;

        let response: PlayerResponse = serde_json::from_str(&player_response)
            .map_err(|e| TimelensError::ParseError(format!("player_response: {}", e)))?;

        let details = response
            .video_details
            .ok_or_else(|| TimelensError::ParseError("no video details".to_string()))?;
        let length_seconds = match details.length_seconds {
            Seconds::Number(n) => n,
            Seconds::Text(text) => parse_int(&text).ok_or_else(|| {
                TimelensError::ParseError(format!("invalid video length: {:?}", text))
            })?,
        };

        let spec = response
            .storyboards
            .and_then(|s| s.player_storyboard_spec_renderer)
            .map(|r| r.spec)
            .ok_or_else(|| TimelensError::ParseError("no storyboard data".to_string()))?;

        Self::from_spec(length_seconds, &spec)
    }

    /// Parse a `|` separated storyboard spec string.
    pub fn from_spec(length_seconds: u64, spec: &str) -> Result<Self, TimelensError> {
        let mut parts = spec.split('|');
        let base_url = parts
            .next()
            .filter(|base| !base.is_empty())
            .ok_or_else(|| TimelensError::ParseError("empty storyboard spec".to_string()))?;

        let levels = parts
            .enumerate()
            .map(|(i, part)| StoryboardLevel::from_segment(base_url, i, part))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            length_seconds,
            levels,
        })
    }

    /// The highest resolution level.
    pub fn best_level(&self) -> Option<&StoryboardLevel> {
        self.levels.last()
    }
}

impl StoryboardLevel {
    /// Build a level from one `#` separated spec segment.
    /// Expected fields: width#height#count#columns#rows#unused#token#signature
    fn from_segment(base_url: &str, idx: usize, segment: &str) -> Result<Self, TimelensError> {
        let params: Vec<&str> = segment.split('#').collect();
        if params.len() < 8 {
            return Err(TimelensError::ParseError(format!(
                "level {}: expected 8 fields, got {}",
                idx,
                params.len()
            )));
        }

        let number = |field: usize, name: &str| {
            parse_int(params[field])
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    TimelensError::ParseError(format!(
                        "level {}: invalid {}: {:?}",
                        idx, name, params[field]
                    ))
                })
        };

        let tile_width = number(0, "width")?;
        let tile_height = number(1, "height")?;
        let frame_count = number(2, "count")?;
        let columns = number(3, "columns")?;
        let rows = number(4, "rows")?;
        if columns == 0 || rows == 0 {
            return Err(TimelensError::ParseError(format!(
                "level {}: empty sheet grid {}x{}",
                idx, columns, rows
            )));
        }

        // sheet grid, tile offsets and the strip buffer must fit in u32
        let fits = columns.checked_mul(rows).is_some()
            && (columns - 1).checked_mul(tile_width).is_some()
            && (rows - 1).checked_mul(tile_height).is_some()
            && frame_count
                .checked_mul(tile_height)
                .and_then(|n| n.checked_mul(4))
                .is_some();
        if !fits {
            return Err(TimelensError::ParseError(format!(
                "level {}: geometry out of range: {} frames of {}x{} on {}x{} sheets",
                idx, frame_count, tile_width, tile_height, columns, rows
            )));
        }

        let sheet_token = if params[6] == DEFAULT_SHEET_TOKEN {
            SHEET_PLACEHOLDER.to_string()
        } else {
            params[6].to_string()
        };
        let signature = params[7].to_string();

        let url = format!(
            "{}&sigh={}",
            base_url
                .replacen(LEVEL_MARKER, &idx.to_string(), 1)
                .replacen(SHEET_NAME_MARKER, &sheet_token, 1),
            signature
        );

        Ok(Self {
            tile_width,
            tile_height,
            frame_count,
            columns,
            rows,
            sheet_token,
            signature,
            url,
        })
    }

    /// Number of tiles on one sheet
    pub fn sheet_size(&self) -> u32 {
        self.columns.saturating_mul(self.rows).max(1)
    }

    pub fn sheet_count(&self) -> u32 {
        self.frame_count.div_ceil(self.sheet_size())
    }

    pub fn sheet_url(&self, sheet: u32) -> String {
        self.url.replacen(SHEET_PLACEHOLDER, &sheet.to_string(), 1)
    }

    /// Frame indices stored on the given sheet
    pub fn frames(&self, sheet: u32) -> Range<u32> {
        let size = self.sheet_size();
        let start = sheet.saturating_mul(size).min(self.frame_count);
        let end = self.frame_count.min(start.saturating_add(size));
        start..end
    }

    pub fn tile(&self, frame: u32) -> TileLocation {
        let columns = self.columns.max(1);
        let rows = self.rows.max(1);
        let absolute_row = frame / columns;
        let row = absolute_row % rows;
        let col = frame % columns;

        TileLocation {
            sheet: absolute_row / rows,
            row,
            col,
            x: col.saturating_mul(self.tile_width),
            y: row.saturating_mul(self.tile_height),
        }
    }
}

/// Reads the leading decimal digits of `text`, ignoring surrounding whitespace.
pub(crate) fn parse_int(text: &str) -> Option<u64> {
    let text = text.trim();
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end].parse().ok()
}
