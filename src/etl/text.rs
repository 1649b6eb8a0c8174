//! Heuristic text splitting shared by the metadata extractors.
//!
//! Both helpers keep their exact historical behavior, including the known
//! failure modes (anchor labels reappearing inside section content, names
//! with internal capitals). They are heuristics tied to one source's markup,
//! not general-purpose parsers.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Splits `s` into sections keyed by anchor label.
///
/// Anchors absent from `s` map to `None` up front. Present anchors keep their
/// original relative order; each section starts after the first occurrence of
/// its own label and stops at the *last* occurrence of the next present
/// label. The final section runs to end of string. The first/last asymmetry
/// minimizes cross-contamination when a label substring reappears inside
/// section content.
#[must_use]
pub fn substrings_after_anchors<'a>(
    s: &str,
    anchors: &[&'a str],
) -> HashMap<&'a str, Option<String>> {
    let mut details = HashMap::new();
    let mut present = Vec::new();
    for &anchor in anchors {
        if s.contains(anchor) {
            present.push(anchor);
        } else {
            details.insert(anchor, None);
        }
    }

    for (num, &anchor) in present.iter().enumerate() {
        // contains() above guarantees the find() hits
        let left = s.find(anchor).unwrap_or(0) + anchor.len();
        let section = if let Some(&next) = present.get(num + 1) {
            let right = s.rfind(next).unwrap_or(0);
            if right > left { &s[left..right] } else { "" }
        } else {
            &s[left..]
        };
        details.insert(anchor, Some(section.to_string()));
    }

    details
}

/// Splits a run of concatenated proper-noun phrases on capital-letter
/// boundaries: `"United StatesUnited Kingdom"` becomes
/// `["United States", "United Kingdom"]`.
///
/// A token ending in a space continues the current entity; any other ending
/// closes it. Names with internal capitals ("McDonald") mis-split; that
/// ambiguity is inherent to the source format and deliberately not fixed.
#[must_use]
pub fn split_with_capital_letter(raw: Option<&str>) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new("[A-Z][^A-Z]*").expect("Invalid regex"));

    let Some(raw) = raw else {
        return Vec::new();
    };

    let mut entities = Vec::new();
    let mut entity = String::new();
    for token in re.find_iter(raw).map(|m| m.as_str()) {
        let stripped = token.trim();
        if !entity.is_empty() {
            entity.push(' ');
        }
        entity.push_str(stripped);
        if !token.ends_with(' ') {
            entities.push(std::mem::take(&mut entity));
        }
    }
    entities
}
