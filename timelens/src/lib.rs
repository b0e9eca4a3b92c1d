pub mod alignment;
pub mod config;
pub mod driver;
pub mod error;
pub mod feed;
pub mod http;
pub mod mosaic;
pub mod overlay;
pub mod page;
pub mod storage;
pub mod storyboard;
pub mod style;
pub mod video_id;
