use std::sync::LazyLock;

use regex::Regex;

static ITEM_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Item No\.\s*\d+").expect("item marker regex"));
static RESOLUTION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Resolution with respect to[:\-]?\s*(.+)").expect("resolution heading regex")
});

/// Structural markers found in one normalized unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub item_id: Option<String>,
    pub resolution_label: Option<String>,
}

/// Finds an agenda item marker (kept verbatim, e.g. `"Item No. 12"`) and a
/// resolution heading label. Either, both or neither may be present.
pub fn detect(text: &str) -> Segment {
    let item_id = ITEM_MARKER.find(text).map(|m| m.as_str().to_string());
    let resolution_label = RESOLUTION_HEADING
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|label| !label.is_empty());

    Segment {
        item_id,
        resolution_label,
    }
}
