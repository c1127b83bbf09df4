//! Bulleted-text encoding of outline documents.
//!
//! Each item is one line: two spaces per level, a bullet, a space and the text.
//! Decoding accepts `-`, `•` and `*` bullets; encoding always writes `•`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{OutlineDocument, OutlineItem, MAX_LEVEL};

const INDENT_UNIT: &str = "  ";
const BULLET: &str = "•";

static BULLET_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*)[-•*](?: (.*))?$").expect("bullet line pattern is valid")
});

/// What to do with a non-blank line that is not a bullet item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodePolicy {
    /// Silently discard the line.
    #[default]
    DropUnmatched,
    /// Keep the trimmed line as a top-level item.
    PreserveAsText,
}

pub fn decode(text: &str) -> OutlineDocument {
    decode_with(text, DecodePolicy::default())
}

/// Parses `text` into a document. May return an empty document; callers that
/// display it should follow up with [`OutlineDocument::ensure_non_empty`].
pub fn decode_with(text: &str, policy: DecodePolicy) -> OutlineDocument {
    let mut items = Vec::new();
    let mut dropped = 0usize;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match BULLET_LINE.captures(line) {
            Some(caps) => {
                let indent = caps.get(1).map_or(0, |m| m.as_str().chars().count());
                let level = (indent / 2).min(MAX_LEVEL as usize) as u8;
                let text = caps.get(2).map_or("", |m| m.as_str());
                items.push(OutlineItem::new(text, level));
            }
            None => match policy {
                DecodePolicy::DropUnmatched => dropped += 1,
                DecodePolicy::PreserveAsText => items.push(OutlineItem::new(line.trim(), 0)),
            },
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "dropped non-bullet lines while decoding outline");
    }
    OutlineDocument::from_items(items)
}

pub fn encode(doc: &OutlineDocument) -> String {
    doc.iter()
        .map(|item| {
            format!(
                "{}{BULLET} {}",
                INDENT_UNIT.repeat(item.level as usize),
                item.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_levels_from_leading_spaces() {
        let doc = decode("• root\n  - child\n    * grandchild\n   • odd indent");
        assert_eq!(
            doc.shape(),
            vec![(0, "root"), (1, "child"), (2, "grandchild"), (1, "odd indent")]
        );
    }

    #[test]
    fn empty_input_decodes_to_nothing_until_caller_fills_it() {
        let mut doc = decode("");
        assert!(doc.is_empty());
        doc.ensure_non_empty();
        assert_eq!(doc.shape(), vec![(0, "")]);
    }

    #[test]
    fn unmatched_lines_are_dropped_by_default() {
        let doc = decode("# Heading\n• kept\nplain prose\n\n  -no space");
        assert_eq!(doc.shape(), vec![(0, "kept")]);
    }

    #[test]
    fn unmatched_lines_can_be_preserved_as_top_level_text() {
        let doc = decode_with(
            "# Heading\n  • kept\n   plain prose  ",
            DecodePolicy::PreserveAsText,
        );
        assert_eq!(
            doc.shape(),
            vec![(0, "# Heading"), (1, "kept"), (0, "plain prose")]
        );
    }

    #[test]
    fn levels_beyond_max_are_clamped() {
        let doc = decode("              • far too deep");
        assert_eq!(doc.shape(), vec![(MAX_LEVEL, "far too deep")]);
    }

    #[test]
    fn bare_bullet_is_an_empty_item() {
        let doc = decode("• \n  -");
        assert_eq!(doc.shape(), vec![(0, ""), (1, "")]);
    }

    #[test]
    fn encode_normalizes_bullets() {
        let doc = decode("- alpha\n  * beta\n    • gamma\n  - delta");
        insta::assert_snapshot!(encode(&doc), @r###"
        • alpha
          • beta
            • gamma
          • delta
        "###);
    }

    #[test]
    fn round_trip_preserves_levels_and_text() {
        let mut pairs = Vec::new();
        let texts = ["", "plain", "  leading", "trailing  ", "• bullet-like", "- dash", "多字节"];
        for level in 0..=MAX_LEVEL {
            for text in texts {
                pairs.push((level, text.to_string()));
            }
        }
        let doc = OutlineDocument::from_pairs(pairs);
        let decoded = decode(&encode(&doc));
        assert!(decoded.content_eq(&doc), "round trip changed {:?}", decoded.shape());
    }

    #[test]
    fn crlf_input_is_accepted() {
        let doc = decode("• one\r\n  • two\r\n");
        assert_eq!(doc.shape(), vec![(0, "one"), (1, "two")]);
    }
}
