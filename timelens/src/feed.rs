//! Line protocol that drives the headless page in watch mode.
//!
//! ```text
//! navigate https://www.youtube.com/watch?v=dQw4w9WgXcQ
//! bar 212
//! labels 0:30 1:45
//! left 0:40
//! hover on
//! clear
//! ```

use crate::page::Document;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Navigate(String),
    Bar(String),
    Labels(String, String),
    Left(String),
    Right(String),
    Hover(bool),
    Drag(bool),
    Clear,
}

impl Command {
    /// Parse one line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let command = match parts.as_slice() {
            ["navigate", location] => Command::Navigate(location.to_string()),
            ["bar", value_max] => Command::Bar(value_max.to_string()),
            ["labels", left, right] => Command::Labels(left.to_string(), right.to_string()),
            ["left", text] => Command::Left(text.to_string()),
            ["right", text] => Command::Right(text.to_string()),
            ["hover", state] => Command::Hover(parse_switch(state)?),
            ["drag", state] => Command::Drag(parse_switch(state)?),
            ["clear"] => Command::Clear,
            [name, ..] => return Err(format!("Invalid command: {}", name)),
            [] => return Ok(None),
        };

        Ok(Some(command))
    }

    pub fn apply(&self, document: &Document) {
        match self {
            Command::Navigate(location) => document.navigate(location.clone()),
            Command::Bar(value_max) => document.ensure_progress_bar().set_value_max(value_max.clone()),
            Command::Labels(left, right) => {
                let (left_node, right_node) = document.ensure_time_labels(left, right);
                left_node.set_text(left.clone());
                right_node.set_text(right.clone());
            }
            Command::Left(text) => {
                let (node, _) = document.ensure_time_labels(text, "0");
                node.set_text(text.clone());
            }
            Command::Right(text) => {
                let (_, node) = document.ensure_time_labels("0", text);
                node.set_text(text.clone());
            }
            Command::Hover(state) => document.ensure_progress_bar().set_hovered(*state),
            Command::Drag(state) => document.ensure_progress_bar().set_dragging(*state),
            Command::Clear => document.clear_player(),
        }
    }
}

fn parse_switch(state: &str) -> Result<bool, String> {
    match state {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(format!("Invalid switch: {} (expected on or off)", state)),
    }
}

/// Apply commands read line by line from `reader` until it is exhausted.
pub async fn run<R>(document: Arc<Document>, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("feed: read: {}", e);
                break;
            }
        };

        match Command::parse(&line) {
            Ok(Some(command)) => {
                debug!("feed: {:?}", command);
                command.apply(&document);
                if let Some(bar) = document.progress_bar() {
                    debug!("feed: overlay visible: {}", bar.overlay_visible());
                }
            }
            Ok(None) => {}
            Err(e) => warn!("feed: {}", e),
        }
    }

    info!("feed: input closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(
            Command::parse("navigate https://youtu.be/abc").unwrap(),
            Some(Command::Navigate("https://youtu.be/abc".to_string()))
        );
        assert_eq!(
            Command::parse("  labels 1:00 3:00 ").unwrap(),
            Some(Command::Labels("1:00".to_string(), "3:00".to_string()))
        );
        assert_eq!(Command::parse("hover on").unwrap(), Some(Command::Hover(true)));
        assert_eq!(Command::parse("drag off").unwrap(), Some(Command::Drag(false)));
        assert_eq!(Command::parse("clear").unwrap(), Some(Command::Clear));
    }

    #[test]
    fn parse_skips_blank_and_comments() {
        assert_eq!(Command::parse("").unwrap(), None);
        assert_eq!(Command::parse("# player state").unwrap(), None);
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(Command::parse("seek 10").is_err());
        assert!(Command::parse("hover maybe").is_err());
        assert!(Command::parse("labels 1:00").is_err());
    }

    #[test]
    fn apply_updates_document() {
        let document = Document::new();
        Command::Navigate("https://youtu.be/abc".to_string()).apply(&document);
        Command::Bar("600".to_string()).apply(&document);
        Command::Labels("1:00".to_string(), "3:00".to_string()).apply(&document);
        Command::Right("4:00".to_string()).apply(&document);

        assert_eq!(document.location(), "https://youtu.be/abc");
        assert_eq!(document.progress_bar().unwrap().length().unwrap(), 600);
        let (left, right) = document.time_labels().unwrap();
        assert_eq!(left.text(), "1:00");
        assert_eq!(right.text(), "4:00");

        Command::Clear.apply(&document);
        assert!(document.progress_bar().is_none());
    }

    #[tokio::test]
    async fn run_applies_every_line() {
        let document = Arc::new(Document::new());
        let input: &[u8] = b"navigate https://youtu.be/abc\nbogus\nbar 90\n";
        run(document.clone(), input).await;

        assert_eq!(document.location(), "https://youtu.be/abc");
        assert_eq!(document.progress_bar().unwrap().value_max().as_deref(), Some("90"));
    }
}
