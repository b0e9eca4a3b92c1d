use crate::style::OverlayStyle;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for timelens
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub driver: Driver,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub style: OverlayStyle,
}

#[derive(Debug, Default, Deserialize)]
pub struct Runtime {
    pub threads: Option<usize>,
}

/// Where storyboard information is fetched from
#[derive(Debug, Deserialize)]
pub struct Source {
    #[serde(default = "Source::default_info_url")]
    pub info_url: String,
    #[serde(default = "Source::default_user_agent")]
    pub user_agent: String,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Source {
    fn default_info_url() -> String {
        "https://www.youtube.com/get_video_info".to_string()
    }

    fn default_user_agent() -> String {
        "timelens/1.0".to_string()
    }
}

impl Default for Source {
    fn default() -> Self {
        Self {
            info_url: Self::default_info_url(),
            user_agent: Self::default_user_agent(),
            timeout: None,
        }
    }
}

/// Polling loop configuration
#[derive(Debug, Deserialize)]
pub struct Driver {
    #[serde(default = "Driver::default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Driver {
    fn default_interval() -> Duration {
        Duration::from_secs(2)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            interval: Self::default_interval(),
        }
    }
}

/// Storage for finished strips
#[derive(Debug, Deserialize)]
pub struct Output {
    #[serde(default = "Output::default_path")]
    pub path: String,
}

impl Output {
    fn default_path() -> String {
        "timelens".to_string()
    }
}

impl Default for Output {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}
