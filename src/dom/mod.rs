//! DOM interaction model: element tree snapshots, synthetic xpath
//! addressing and interaction capability detection.

pub mod element;
pub mod interaction;
pub mod snapshot;

pub use element::{BoundingBox, ElementNode, SHADOW_ROOT_TAG};
pub use interaction::{
    InteractionSet, InteractionType, PossibleInteractionsByXpath, ScrollDirection, SCROLL_FACTOR,
};
pub use snapshot::DomSnapshot;
