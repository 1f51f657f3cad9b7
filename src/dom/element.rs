use crate::dom::interaction::{InteractionSet, InteractionType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Bounding box coordinates for an element, in page pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Center point of the box
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the box has a meaningful on-screen footprint
    pub fn has_size(&self) -> bool {
        self.width + self.height >= 5.0
    }

    /// Signature used to dedupe stacked elements (icon inside its clickable
    /// wrapper): two elements with the same signature occupy the same box
    pub fn signature(&self) -> (i64, i64, i64, i64) {
        (
            self.x.round() as i64,
            self.y.round() as i64,
            self.width.round() as i64,
            self.height.round() as i64,
        )
    }
}

/// A DOM element as reported by the extraction script.
///
/// The tree includes same-origin iframe content (spliced under the `iframe`
/// node as an `html` child) and shadow DOM content (under a synthetic
/// `#shadow-root` container node).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// HTML tag name, lowercase ("div", "button", "input"), or the
    /// `#shadow-root` marker for shadow containers
    pub tag_name: String,

    /// Element attributes in document order
    #[serde(default)]
    pub attributes: IndexMap<String, String>,

    /// Direct text content of the element, not including descendants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Child elements (iframe content documents and shadow containers
    /// appear here too)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,

    /// Whether the element passed the visibility checks (not display:none,
    /// nonzero size, checkVisibility())
    #[serde(default)]
    pub is_visible: bool,

    /// Whether the element center, after iframe offsets, lies inside the
    /// viewport rectangle
    #[serde(default)]
    pub in_viewport: bool,

    /// Whether the element is the topmost element at its center point
    /// (point-based hit test, walking up iframe boundaries)
    #[serde(default = "default_true")]
    pub topmost: bool,

    /// Bounding box after iframe offset accumulation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

fn default_true() -> bool {
    true
}

/// Tag marking a spliced shadow DOM subtree
pub const SHADOW_ROOT_TAG: &str = "#shadow-root";

/// Tags rendered without children or closing tag
const VOID_TAGS: [&str; 8] = ["input", "br", "img", "hr", "meta", "link", "area", "col"];

const INTERACTIVE_TAGS: [&str; 3] = ["a", "button", "select"];
const CLICKABLE_ROLES: [&str; 5] = ["button", "link", "tab", "menuitem", "checkbox"];
const CLICKABLE_INPUT_TYPES: [&str; 7] =
    ["submit", "checkbox", "radio", "color", "file", "image", "reset"];

impl ElementNode {
    /// Create a new element with the given tag
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
            is_visible: false,
            in_viewport: false,
            topmost: true,
            bounding_box: None,
        }
    }

    /// Builder method: set one attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder method: set direct text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder method: set children
    pub fn with_children(mut self, children: Vec<ElementNode>) -> Self {
        self.children = children;
        self
    }

    /// Builder method: mark visible and in viewport
    pub fn visible(mut self) -> Self {
        self.is_visible = true;
        self.in_viewport = true;
        self
    }

    /// Builder method: mark visible but scrolled out of the viewport
    pub fn visible_offscreen(mut self) -> Self {
        self.is_visible = true;
        self.in_viewport = false;
        self
    }

    /// Builder method: mark covered by another element at its center point
    pub fn covered(mut self) -> Self {
        self.topmost = false;
        self
    }

    /// Builder method: set the bounding box
    pub fn with_bounding_box(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounding_box = Some(BoundingBox::new(x, y, width, height));
        self
    }

    /// Add a child element
    pub fn add_child(&mut self, child: ElementNode) {
        self.children.push(child);
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Element ID attribute
    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
    }

    /// Check the tag name, case-insensitive
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// Whether this node is a spliced shadow DOM container
    pub fn is_shadow_root(&self) -> bool {
        self.tag_name == SHADOW_ROOT_TAG
    }

    fn has_event_attribute(&self, event: &str) -> bool {
        self.attributes.contains_key(&format!("on{event}"))
    }

    fn style_contains(&self, needle: &str) -> bool {
        self.get_attribute("style")
            .map(|s| s.replace(' ', "").contains(needle))
            .unwrap_or(false)
    }

    /// Whether the element is excluded from interaction outright
    /// (disabled, readonly, hidden input, aria-hidden)
    pub fn is_inert(&self) -> bool {
        self.attributes.contains_key("disabled")
            || self.attributes.contains_key("readonly")
            || self.get_attribute("aria-hidden") == Some("true")
            || self.get_attribute("aria-disabled") == Some("true")
            || (self.is_tag("input") && self.get_attribute("type") == Some("hidden"))
    }

    /// Compute the interaction capabilities this element exposes.
    ///
    /// Mirrors the in-page heuristics so that offline-built snapshots behave
    /// like live extractions: tag/role based rules, inline event handlers,
    /// `cursor: pointer`, clickable input types and label-for association.
    pub fn interactions(&self) -> InteractionSet {
        let mut set = InteractionSet::new();
        if !self.is_visible || self.is_inert() || self.is_tag("body") || self.is_shadow_root() {
            return set;
        }
        if let Some(bbox) = &self.bounding_box {
            if !bbox.has_size() {
                return set;
            }
        }

        let tag = self.tag_name.as_str();
        let role = self.get_attribute("role").unwrap_or("");
        let input_type = self.get_attribute("type").unwrap_or("");
        let clickable_input = self.is_tag("input") && CLICKABLE_INPUT_TYPES.contains(&input_type);

        let typing = self.has_event_attribute("keydown")
            || self.has_event_attribute("keyup")
            || self.has_event_attribute("input")
            || self.attributes.contains_key("contenteditable")
            || ((self.is_tag("input")
                || self.is_tag("textarea")
                || role == "searchbox"
                || role == "input")
                && !clickable_input);
        if typing {
            set.insert(InteractionType::Type);
        }

        let clicking = INTERACTIVE_TAGS.contains(&tag)
            || CLICKABLE_ROLES.contains(&role)
            || self.has_event_attribute("click")
            || self.has_event_attribute("mousedown")
            || self.has_event_attribute("mouseup")
            || self.style_contains("cursor:pointer")
            || self.attributes.contains_key("aria-haspopup")
            || clickable_input
            || (self.is_tag("label") && self.attributes.contains_key("for"));
        if clicking {
            set.insert(InteractionType::Click);
        }

        if self.has_event_attribute("mouseover") || self.has_event_attribute("mouseenter") {
            set.insert(InteractionType::Hover);
        }

        if self.style_contains("overflow:auto") || self.style_contains("overflow:scroll") {
            set.insert(InteractionType::Scroll);
        }

        set
    }

    /// Whether the element supports any interaction at all
    pub fn is_interactive(&self) -> bool {
        !self.interactions().is_empty()
    }

    /// Render this element and its subtree back to HTML.
    ///
    /// Shadow containers render as their content only; the synthetic tag
    /// never appears in output.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        if self.is_shadow_root() {
            for child in &self.children {
                child.render_into(out);
            }
            return;
        }
        out.push('<');
        out.push_str(&self.tag_name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&value.replace('"', "&quot;"));
            out.push('"');
        }
        if VOID_TAGS.contains(&self.tag_name.as_str()) {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in &self.children {
            child.render_into(out);
        }
        out.push_str("</");
        out.push_str(&self.tag_name);
        out.push('>');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let el = ElementNode::new("button")
            .with_attribute("id", "go")
            .with_text("Go")
            .visible();
        assert_eq!(el.tag_name, "button");
        assert_eq!(el.id(), Some("go"));
        assert!(el.is_visible);
        assert!(el.in_viewport);
    }

    #[test]
    fn test_interactions_button() {
        let el = ElementNode::new("button").with_text("Go").visible();
        assert!(el.interactions().contains(&InteractionType::Click));
    }

    #[test]
    fn test_interactions_input() {
        let el = ElementNode::new("input").visible();
        let set = el.interactions();
        assert!(set.contains(&InteractionType::Type));
        assert!(!set.contains(&InteractionType::Click));
    }

    #[test]
    fn test_interactions_submit_input_is_click_only() {
        let el = ElementNode::new("input")
            .with_attribute("type", "submit")
            .visible();
        let set = el.interactions();
        assert!(set.contains(&InteractionType::Click));
        assert!(!set.contains(&InteractionType::Type));
    }

    #[test]
    fn test_interactions_invisible_element_has_none() {
        let el = ElementNode::new("button").with_text("Hidden");
        assert!(el.interactions().is_empty());
    }

    #[test]
    fn test_interactions_disabled_element_has_none() {
        let el = ElementNode::new("button")
            .with_attribute("disabled", "")
            .visible();
        assert!(el.interactions().is_empty());
    }

    #[test]
    fn test_interactions_cursor_pointer_div() {
        let el = ElementNode::new("div")
            .with_attribute("style", "cursor: pointer")
            .visible();
        assert!(el.interactions().contains(&InteractionType::Click));
    }

    #[test]
    fn test_interactions_role_button() {
        let el = ElementNode::new("div")
            .with_attribute("role", "button")
            .visible();
        assert!(el.interactions().contains(&InteractionType::Click));
    }

    #[test]
    fn test_interactions_tiny_element_has_none() {
        let el = ElementNode::new("button")
            .visible()
            .with_bounding_box(0.0, 0.0, 2.0, 2.0);
        assert!(el.interactions().is_empty());
    }

    #[test]
    fn test_outer_html() {
        let el = ElementNode::new("div")
            .with_attribute("id", "box")
            .with_text("Hello")
            .with_children(vec![ElementNode::new("span").with_text("world")]);
        assert_eq!(
            el.outer_html(),
            "<div id=\"box\">Hello<span>world</span></div>"
        );
    }

    #[test]
    fn test_outer_html_void_tag() {
        let el = ElementNode::new("input").with_attribute("name", "q");
        assert_eq!(el.outer_html(), "<input name=\"q\"/>");
    }

    #[test]
    fn test_shadow_container_renders_content_only() {
        let shadow = ElementNode::new(SHADOW_ROOT_TAG)
            .with_children(vec![ElementNode::new("p").with_text("inside")]);
        let host = ElementNode::new("my-widget").with_children(vec![shadow]);
        assert_eq!(host.outer_html(), "<my-widget><p>inside</p></my-widget>");
    }

    #[test]
    fn test_bounding_box_signature_dedupe() {
        let a = BoundingBox::new(10.0, 10.0, 30.0, 20.0);
        let b = BoundingBox::new(10.2, 9.8, 30.1, 20.0);
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_serde_roundtrip() {
        let el = ElementNode::new("a")
            .with_attribute("href", "/page")
            .with_text("Link")
            .visible();
        let json = serde_json::to_string(&el).unwrap();
        let back: ElementNode = serde_json::from_str(&json).unwrap();
        assert_eq!(el, back);
    }
}
