use crate::dom::element::ElementNode;
use crate::dom::interaction::{InteractionType, PossibleInteractionsByXpath};
use crate::error::{Result, WebpilotError};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// A full-document snapshot with synthetic xpath addressing.
///
/// Xpaths use sibling-index disambiguation (`/div[3]`). Iframe content
/// continues the path through the `iframe` segment (`.../iframe[2]/html/body/...`),
/// shadow DOM content is separated from its host by `//`
/// (`.../my-widget//button`). Every xpath produced by a snapshot resolves to
/// exactly one element.
#[derive(Debug, Clone, PartialEq)]
pub struct DomSnapshot {
    /// Root element, usually `html`
    pub root: ElementNode,
}

impl DomSnapshot {
    pub fn new(root: ElementNode) -> Self {
        Self { root }
    }

    /// Parse the JSON document produced by the in-page extraction script
    pub fn from_json_str(json: &str) -> Result<Self> {
        let root: ElementNode = serde_json::from_str(json)
            .map_err(|e| WebpilotError::DomParseFailed(e.to_string()))?;
        Ok(Self::new(root))
    }

    /// Visit every element with its synthetic xpath, in document order
    pub fn for_each_xpath<'a, F>(&'a self, mut visit: F)
    where
        F: FnMut(&'a ElementNode, &str),
    {
        let root_path = format!("/{}", self.root.tag_name);
        walk(&self.root, &root_path, &mut visit);
    }

    /// Find the element addressed by an xpath
    pub fn find(&self, xpath: &str) -> Option<&ElementNode> {
        let mut found = None;
        self.for_each_xpath(|node, path| {
            if path == xpath {
                found = Some(node);
            }
        });
        found
    }

    /// Resolve an xpath to its element, demanding a unique match.
    ///
    /// Unlike [`find`](Self::find) this walks the path segment by segment:
    /// an un-indexed segment matching several same-tag siblings is reported
    /// as [`WebpilotError::Ambiguous`] instead of silently missing. Snapshot
    /// paths always index repeated tags, so this only trips on hand-written
    /// or model-written paths.
    pub fn resolve(&self, xpath: &str) -> Result<&ElementNode> {
        let virtual_root = std::slice::from_ref(&self.root);
        let mut node: Option<&ElementNode> = None;
        for (part_idx, part) in xpath.split("//").enumerate() {
            if part_idx > 0 {
                // The part after `//` matches inside the host's shadow root
                let host = node.ok_or_else(|| WebpilotError::NoElement(xpath.to_string()))?;
                node = Some(
                    host.children
                        .iter()
                        .find(|c| c.is_shadow_root())
                        .ok_or_else(|| WebpilotError::NoElement(xpath.to_string()))?,
                );
            }
            for segment in part.split('/').filter(|s| !s.is_empty()) {
                let siblings = match node {
                    Some(n) => n.children.as_slice(),
                    None => virtual_root,
                };
                node = Some(match_segment(siblings, segment, xpath)?);
            }
        }
        node.ok_or_else(|| WebpilotError::NoElement(xpath.to_string()))
    }

    /// Whether the element addressed by the xpath currently passes the
    /// visibility checks
    pub fn is_visible(&self, xpath: &str) -> bool {
        self.find(xpath).map(|n| n.is_visible).unwrap_or(false)
    }

    /// Compute the interactions map for the whole document.
    ///
    /// `in_viewport` keeps only elements whose center point lies inside the
    /// viewport; `foreground_only` additionally requires the element to be
    /// topmost at its center point. `types` restricts the result to elements
    /// supporting at least one of the given interaction types (empty slice =
    /// no restriction). Elements sharing a bounding-box signature are deduped,
    /// first occurrence wins.
    pub fn possible_interactions(
        &self,
        in_viewport: bool,
        foreground_only: bool,
        types: &[InteractionType],
    ) -> PossibleInteractionsByXpath {
        let mut map = PossibleInteractionsByXpath::new();
        let mut seen_boxes: HashSet<(i64, i64, i64, i64)> = HashSet::new();
        self.for_each_xpath(|node, xpath| {
            let interactions = node.interactions();
            if interactions.is_empty() {
                return;
            }
            if in_viewport && !node.in_viewport {
                return;
            }
            if in_viewport && foreground_only && !node.topmost {
                return;
            }
            if !types.is_empty() && !types.iter().any(|t| interactions.contains(t)) {
                return;
            }
            if let Some(bbox) = &node.bounding_box {
                if !seen_boxes.insert(bbox.signature()) {
                    return;
                }
            }
            map.insert(xpath.to_string(), interactions);
        });
        map
    }

    /// Render the whole document back to HTML
    pub fn to_html(&self) -> String {
        self.root.outer_html()
    }

    /// Render the document, injecting an `xpath` attribute on every element
    /// whose xpath is a key of the interactions map
    pub fn to_annotated_html(&self, interactions: &PossibleInteractionsByXpath) -> String {
        // Nodes are matched by pointer identity so two structurally equal
        // elements with different xpaths stay distinguishable
        let mut by_ptr: HashMap<*const ElementNode, String> = HashMap::new();
        self.for_each_xpath(|node, xpath| {
            if interactions.contains_key(xpath) {
                by_ptr.insert(node as *const ElementNode, xpath.to_string());
            }
        });
        let mut out = String::new();
        render_annotated(&self.root, &by_ptr, &mut out);
        out
    }

    /// All shadow root subtrees, mapped by host element xpath, rendered as
    /// HTML so retrieval needs no special-case shadow handling
    pub fn shadow_roots(&self) -> IndexMap<String, String> {
        let mut roots = IndexMap::new();
        collect_shadow_roots(&self.root, &format!("/{}", self.root.tag_name), &mut roots);
        roots
    }

    /// Total number of elements, shadow containers excluded
    pub fn count_elements(&self) -> usize {
        fn count(node: &ElementNode) -> usize {
            let own = usize::from(!node.is_shadow_root());
            own + node.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }

    /// Number of elements exposing at least one interaction
    pub fn count_interactive(&self) -> usize {
        self.possible_interactions(false, false, &[]).len()
    }
}

/// Pick the sibling a `tag` or `tag[n]` segment addresses
fn match_segment<'a>(
    siblings: &'a [ElementNode],
    segment: &str,
    xpath: &str,
) -> Result<&'a ElementNode> {
    let (tag, index) = match segment.split_once('[') {
        Some((tag, rest)) => {
            let idx = rest
                .strip_suffix(']')
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| WebpilotError::NoElement(xpath.to_string()))?;
            (tag, Some(idx.max(1)))
        }
        None => (segment, None),
    };
    let mut matches = siblings.iter().filter(|c| c.tag_name == tag);
    match index {
        Some(idx) => matches
            .nth(idx - 1)
            .ok_or_else(|| WebpilotError::NoElement(xpath.to_string())),
        None => {
            let first = matches
                .next()
                .ok_or_else(|| WebpilotError::NoElement(xpath.to_string()))?;
            if matches.next().is_some() {
                return Err(WebpilotError::Ambiguous(xpath.to_string()));
            }
            Ok(first)
        }
    }
}

/// Xpath segment for each child, indexed only when the tag repeats among
/// siblings; indices are 1-based and assigned to every repeated tag,
/// including the first occurrence, so each segment matches a single node
pub(crate) fn child_segments(children: &[ElementNode]) -> Vec<String> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for child in children {
        *totals.entry(child.tag_name.as_str()).or_insert(0) += 1;
    }
    let mut counters: HashMap<&str, usize> = HashMap::new();
    children
        .iter()
        .map(|child| {
            let tag = child.tag_name.as_str();
            let n = counters.entry(tag).or_insert(0);
            *n += 1;
            if totals[tag] > 1 {
                format!("{}[{}]", tag, n)
            } else {
                tag.to_string()
            }
        })
        .collect()
}

fn walk<'a, F>(node: &'a ElementNode, xpath: &str, visit: &mut F)
where
    F: FnMut(&'a ElementNode, &str),
{
    if !node.is_shadow_root() {
        visit(node, xpath);
    }
    let segments = child_segments(&node.children);
    for (child, segment) in node.children.iter().zip(segments) {
        if child.is_shadow_root() {
            // Children of the shadow container hang off the host with a
            // double-slash separator
            let shadow_base = format!("{}/", xpath);
            let inner_segments = child_segments(&child.children);
            for (inner, inner_segment) in child.children.iter().zip(inner_segments) {
                let child_path = format!("{}/{}", shadow_base, inner_segment);
                walk(inner, &child_path, visit);
            }
        } else {
            let child_path = format!("{}/{}", xpath, segment);
            walk(child, &child_path, visit);
        }
    }
}

fn collect_shadow_roots(
    node: &ElementNode,
    xpath: &str,
    roots: &mut IndexMap<String, String>,
) {
    let segments = child_segments(&node.children);
    for (child, segment) in node.children.iter().zip(segments) {
        if child.is_shadow_root() {
            roots.insert(xpath.to_string(), child.outer_html());
            let shadow_base = format!("{}/", xpath);
            let inner_segments = child_segments(&child.children);
            for (inner, inner_segment) in child.children.iter().zip(inner_segments) {
                collect_shadow_roots(inner, &format!("{}/{}", shadow_base, inner_segment), roots);
            }
        } else {
            collect_shadow_roots(child, &format!("{}/{}", xpath, segment), roots);
        }
    }
}

const VOID_TAGS: [&str; 8] = ["input", "br", "img", "hr", "meta", "link", "area", "col"];

pub(crate) fn render_annotated(
    node: &ElementNode,
    annotations: &HashMap<*const ElementNode, String>,
    out: &mut String,
) {
    if node.is_shadow_root() {
        for child in &node.children {
            render_annotated(child, annotations, out);
        }
        return;
    }
    out.push('<');
    out.push_str(&node.tag_name);
    for (key, value) in &node.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&value.replace('"', "&quot;"));
        out.push('"');
    }
    if let Some(xpath) = annotations.get(&(node as *const ElementNode)) {
        out.push_str(" xpath=\"");
        out.push_str(xpath);
        out.push('"');
    }
    if VOID_TAGS.contains(&node.tag_name.as_str()) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if let Some(text) = &node.text {
        out.push_str(text);
    }
    for child in &node.children {
        render_annotated(child, annotations, out);
    }
    out.push_str("</");
    out.push_str(&node.tag_name);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::element::SHADOW_ROOT_TAG;

    fn search_page() -> DomSnapshot {
        let body = ElementNode::new("body").with_children(vec![
            ElementNode::new("input").with_attribute("id", "q").visible(),
            ElementNode::new("button").with_text("Go").visible(),
            ElementNode::new("div").with_text("decorative"),
        ]);
        DomSnapshot::new(ElementNode::new("html").with_children(vec![body]))
    }

    #[test]
    fn test_xpath_synthesis_simple() {
        let snapshot = search_page();
        let mut paths = Vec::new();
        snapshot.for_each_xpath(|_, p| paths.push(p.to_string()));
        assert!(paths.contains(&"/html/body/input".to_string()));
        assert!(paths.contains(&"/html/body/button".to_string()));
    }

    #[test]
    fn test_xpath_sibling_indices() {
        let body = ElementNode::new("body").with_children(vec![
            ElementNode::new("div"),
            ElementNode::new("div"),
            ElementNode::new("span"),
            ElementNode::new("div"),
        ]);
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
        let mut paths = Vec::new();
        snapshot.for_each_xpath(|_, p| paths.push(p.to_string()));
        assert!(paths.contains(&"/html/body/div[1]".to_string()));
        assert!(paths.contains(&"/html/body/div[2]".to_string()));
        assert!(paths.contains(&"/html/body/div[3]".to_string()));
        assert!(paths.contains(&"/html/body/span".to_string()));
    }

    #[test]
    fn test_xpath_uniqueness() {
        let body = ElementNode::new("body").with_children(vec![
            ElementNode::new("div").with_children(vec![
                ElementNode::new("a").visible(),
                ElementNode::new("a").visible(),
            ]),
            ElementNode::new("div").with_children(vec![ElementNode::new("a").visible()]),
        ]);
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
        let mut paths = Vec::new();
        snapshot.for_each_xpath(|_, p| paths.push(p.to_string()));
        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
    }

    #[test]
    fn test_possible_interactions() {
        let snapshot = search_page();
        let map = snapshot.possible_interactions(false, false, &[]);
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("/html/body/input"));
        assert!(map.contains_key("/html/body/button"));
    }

    #[test]
    fn test_possible_interactions_empty_document() {
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![
            ElementNode::new("body").with_children(vec![ElementNode::new("p").with_text("text")]),
        ]));
        assert!(snapshot.possible_interactions(true, true, &[]).is_empty());
    }

    #[test]
    fn test_viewport_filter() {
        let body = ElementNode::new("body").with_children(vec![
            ElementNode::new("button").with_text("Visible").visible(),
            ElementNode::new("button")
                .with_text("Below the fold")
                .visible_offscreen(),
        ]);
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
        assert_eq!(snapshot.possible_interactions(false, false, &[]).len(), 2);
        assert_eq!(snapshot.possible_interactions(true, false, &[]).len(), 1);
    }

    #[test]
    fn test_foreground_filter_excludes_covered() {
        let body = ElementNode::new("body").with_children(vec![
            ElementNode::new("button").with_text("Behind modal").visible().covered(),
            ElementNode::new("button").with_text("Modal ok").visible(),
        ]);
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
        let map = snapshot.possible_interactions(true, true, &[]);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("/html/body/button[2]"));
    }

    #[test]
    fn test_type_filter() {
        let snapshot = search_page();
        let map = snapshot.possible_interactions(false, false, &[InteractionType::Type]);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("/html/body/input"));
    }

    #[test]
    fn test_bounding_box_dedupe_keeps_outer() {
        let body = ElementNode::new("body").with_children(vec![
            ElementNode::new("button")
                .visible()
                .with_bounding_box(10.0, 10.0, 40.0, 20.0)
                .with_children(vec![ElementNode::new("span")
                    .with_attribute("style", "cursor: pointer")
                    .visible()
                    .with_bounding_box(10.0, 10.0, 40.0, 20.0)]),
        ]);
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
        let map = snapshot.possible_interactions(false, false, &[]);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("/html/body/button"));
    }

    #[test]
    fn test_iframe_xpath_continues_through_frame() {
        let inner_body =
            ElementNode::new("body").with_children(vec![ElementNode::new("button").visible()]);
        let iframe = ElementNode::new("iframe")
            .with_children(vec![ElementNode::new("html").with_children(vec![inner_body])]);
        let body = ElementNode::new("body").with_children(vec![iframe]);
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
        let map = snapshot.possible_interactions(false, false, &[]);
        assert!(map.contains_key("/html/body/iframe/html/body/button"));
    }

    #[test]
    fn test_shadow_root_xpath_separator() {
        let shadow = ElementNode::new(SHADOW_ROOT_TAG)
            .with_children(vec![ElementNode::new("button").with_text("Inside").visible()]);
        let host = ElementNode::new("my-widget").with_children(vec![shadow]);
        let body = ElementNode::new("body").with_children(vec![host]);
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
        let map = snapshot.possible_interactions(false, false, &[]);
        assert!(map.contains_key("/html/body/my-widget//button"));
    }

    #[test]
    fn test_shadow_roots_flattening() {
        let shadow = ElementNode::new(SHADOW_ROOT_TAG)
            .with_children(vec![ElementNode::new("p").with_text("inside")]);
        let host = ElementNode::new("my-widget").with_children(vec![shadow]);
        let body = ElementNode::new("body").with_children(vec![host]);
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
        let roots = snapshot.shadow_roots();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots["/html/body/my-widget"], "<p>inside</p>");
    }

    #[test]
    fn test_annotated_html() {
        let snapshot = search_page();
        let map = snapshot.possible_interactions(false, false, &[]);
        let html = snapshot.to_annotated_html(&map);
        assert!(html.contains("xpath=\"/html/body/input\""));
        assert!(html.contains("xpath=\"/html/body/button\""));
        // Non-interactive elements stay unannotated
        assert!(!html.contains("<div xpath"));
    }

    #[test]
    fn test_resolve_unique_segment() {
        let snapshot = search_page();
        let node = snapshot.resolve("/html/body/button").unwrap();
        assert_eq!(node.text.as_deref(), Some("Go"));
        assert!(matches!(
            snapshot.resolve("/html/body/nothing"),
            Err(WebpilotError::NoElement(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_ambiguous_segment() {
        let body = ElementNode::new("body").with_children(vec![
            ElementNode::new("div").with_text("first"),
            ElementNode::new("div").with_text("second"),
        ]);
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
        assert!(matches!(
            snapshot.resolve("/html/body/div"),
            Err(WebpilotError::Ambiguous(_))
        ));
        let node = snapshot.resolve("/html/body/div[2]").unwrap();
        assert_eq!(node.text.as_deref(), Some("second"));
        assert!(matches!(
            snapshot.resolve("/html/body/div[3]"),
            Err(WebpilotError::NoElement(_))
        ));
    }

    #[test]
    fn test_resolve_crosses_iframe_and_shadow() {
        let shadow = ElementNode::new(SHADOW_ROOT_TAG)
            .with_children(vec![ElementNode::new("button").with_text("Inside").visible()]);
        let host = ElementNode::new("my-widget").with_children(vec![shadow]);
        let inner_body = ElementNode::new("body").with_children(vec![host]);
        let iframe = ElementNode::new("iframe")
            .with_children(vec![ElementNode::new("html").with_children(vec![inner_body])]);
        let body = ElementNode::new("body").with_children(vec![iframe]);
        let snapshot = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
        let node = snapshot
            .resolve("/html/body/iframe/html/body/my-widget//button")
            .unwrap();
        assert_eq!(node.text.as_deref(), Some("Inside"));
    }

    #[test]
    fn test_find() {
        let snapshot = search_page();
        let node = snapshot.find("/html/body/button").unwrap();
        assert_eq!(node.text.as_deref(), Some("Go"));
        assert!(snapshot.find("/html/body/nothing").is_none());
    }

    #[test]
    fn test_counts() {
        let snapshot = search_page();
        assert_eq!(snapshot.count_elements(), 5);
        assert_eq!(snapshot.count_interactive(), 2);
    }
}
