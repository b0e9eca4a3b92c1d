use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^.*(?:(?:youtu\.be/|v/|vi/|u/\w/|embed/)|(?:(?:watch)?\?vi?=|&vi?=))([^#&?]*).*",
        )
        .expect("video id pattern is valid")
    })
}

/// Extracts the video identifier from a page location.
///
/// Recognised shapes are `youtu.be/<id>`, `/v/<id>`, `/vi/<id>`, `/u/<n>/<id>`,
/// `/embed/<id>` and a `v` or `vi` query parameter. The last marker in the
/// location wins; an empty identifier is treated as no video.
pub fn extract(location: &str) -> Option<String> {
    pattern()
        .captures(location)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
