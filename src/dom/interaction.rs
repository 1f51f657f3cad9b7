use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Capability exposed by a DOM node, not state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Click,
    Type,
    Hover,
    Scroll,
}

/// Set of interaction capabilities for one element
pub type InteractionSet = BTreeSet<InteractionType>;

/// Mapping from xpath to the interactions its element supports.
///
/// Keys are unique within one DOM traversal and ordered by traversal order.
/// Rebuilt on every retrieval call, never persisted.
pub type PossibleInteractionsByXpath = IndexMap<String, InteractionSet>;

/// Scroll direction with its sign on each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Fraction of the container dimension scrolled per action
pub const SCROLL_FACTOR: f64 = 0.75;

impl ScrollDirection {
    /// Signed (x, y) unit vector for this direction
    pub fn signs(&self) -> (i64, i64) {
        match self {
            ScrollDirection::Up => (0, -1),
            ScrollDirection::Down => (0, 1),
            ScrollDirection::Left => (-1, 0),
            ScrollDirection::Right => (1, 0),
        }
    }

    /// Parse a direction from a model-provided value such as "DOWN"
    pub fn from_value(value: &str) -> Option<ScrollDirection> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UP" => Some(ScrollDirection::Up),
            "DOWN" => Some(ScrollDirection::Down),
            "LEFT" => Some(ScrollDirection::Left),
            "RIGHT" => Some(ScrollDirection::Right),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signs() {
        assert_eq!(ScrollDirection::Down.signs(), (0, 1));
        assert_eq!(ScrollDirection::Left.signs(), (-1, 0));
    }

    #[test]
    fn test_from_value() {
        assert_eq!(
            ScrollDirection::from_value(" down "),
            Some(ScrollDirection::Down)
        );
        assert_eq!(ScrollDirection::from_value("UP"), Some(ScrollDirection::Up));
        assert_eq!(ScrollDirection::from_value("sideways"), None);
    }

    #[test]
    fn test_interaction_type_serde() {
        let json = serde_json::to_string(&InteractionType::Click).unwrap();
        assert_eq!(json, "\"click\"");
        let back: InteractionType = serde_json::from_str("\"type\"").unwrap();
        assert_eq!(back, InteractionType::Type);
    }

    #[test]
    fn test_interactions_map_preserves_order() {
        let mut map = PossibleInteractionsByXpath::new();
        map.insert("/html/body/a".to_string(), InteractionSet::new());
        map.insert("/html/body/button".to_string(), InteractionSet::new());
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["/html/body/a", "/html/body/button"]);
    }
}
