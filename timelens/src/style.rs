use serde::Deserialize;
use std::time::Duration;

/// Visual rules for the overlay element
#[derive(Debug, Clone, Deserialize)]
pub struct OverlayStyle {
    /// Display height in pixels
    #[serde(default = "OverlayStyle::default_height")]
    pub height: u32,
    /// Opacity fade duration
    #[serde(default = "OverlayStyle::default_transition", with = "humantime_serde")]
    pub transition: Duration,
    /// How far the hover preview tooltip is lifted above the strip, in pixels
    #[serde(default = "OverlayStyle::default_preview_lift")]
    pub preview_lift: u32,
}

impl OverlayStyle {
    fn default_height() -> u32 {
        40
    }

    fn default_transition() -> Duration {
        Duration::from_millis(200)
    }

    fn default_preview_lift() -> u32 {
        35
    }

    /// Stylesheet injected into the page. The strip sits right above the
    /// progress bar and only shows while the bar is hovered or dragged.
    pub fn stylesheet(&self) -> String {
        format!(
            r#"#timelens {{
	position: absolute;
	left: 0;
	bottom: 100%;
	width: 100%;
	height: {height}px;
	opacity: 0;
	transition: opacity {transition}s;
	image-rendering: smooth;
	transform-origin: 0 0;
}}
.ytp-progress-bar:hover #timelens,
.ytp-progress-bar-container.ytp-drag #timelens {{
	opacity: 1;
	display: block;
}}
.ytp-tooltip.ytp-preview {{
	transform: translateY(-{lift}px);
}}
"#,
            height = self.height,
            transition = self.transition.as_secs_f64(),
            lift = self.preview_lift,
        )
    }
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            height: Self::default_height(),
            transition: Self::default_transition(),
            preview_lift: Self::default_preview_lift(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_uses_configured_values() {
        let css = OverlayStyle::default().stylesheet();
        assert!(css.contains("height: 40px;"));
        assert!(css.contains("transition: opacity 0.2s;"));
        assert!(css.contains("translateY(-35px)"));
    }
}
