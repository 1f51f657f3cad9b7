use crate::dom::{DomSnapshot, PossibleInteractionsByXpath};
use crate::retrieval::Chunk;

/// Seeds the retrieval pipeline: computes the interactions map for a
/// snapshot and renders the document with `xpath` attributes injected on
/// every interactive element.
///
/// Iframe content is already spliced into the snapshot tree at the iframe
/// position and shadow content under its host, so one annotated rendering
/// covers the whole page.
#[derive(Debug, Clone)]
pub struct XpathAnnotator {
    /// Restrict annotation to elements in the foreground of the viewport
    pub foreground_only: bool,
}

impl Default for XpathAnnotator {
    fn default() -> Self {
        Self {
            foreground_only: true,
        }
    }
}

impl XpathAnnotator {
    /// Interactions map for the snapshot, honoring the viewport restriction
    pub fn interactions(
        &self,
        snapshot: &DomSnapshot,
        viewport_only: bool,
    ) -> PossibleInteractionsByXpath {
        snapshot.possible_interactions(viewport_only, viewport_only && self.foreground_only, &[])
    }

    /// The whole annotated document as a single chunk
    pub fn annotate(&self, snapshot: &DomSnapshot, viewport_only: bool) -> Chunk {
        let interactions = self.interactions(snapshot, viewport_only);
        let html = snapshot.to_annotated_html(&interactions);
        Chunk::new(html, interactions.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementNode;

    fn page() -> DomSnapshot {
        let body = ElementNode::new("body").with_children(vec![
            ElementNode::new("a")
                .with_attribute("href", "/docs")
                .with_text("Docs")
                .visible(),
            ElementNode::new("button").with_text("Hidden").visible_offscreen(),
        ]);
        DomSnapshot::new(ElementNode::new("html").with_children(vec![body]))
    }

    #[test]
    fn test_annotate_full_page() {
        let chunk = XpathAnnotator::default().annotate(&page(), false);
        assert!(chunk.html.contains("xpath=\"/html/body/a\""));
        assert!(chunk.html.contains("xpath=\"/html/body/button\""));
        assert_eq!(chunk.xpaths.len(), 2);
    }

    #[test]
    fn test_annotate_viewport_only() {
        let chunk = XpathAnnotator::default().annotate(&page(), true);
        assert!(chunk.html.contains("xpath=\"/html/body/a\""));
        assert!(!chunk.html.contains("xpath=\"/html/body/button\""));
        assert_eq!(chunk.xpaths, vec!["/html/body/a"]);
    }
}
