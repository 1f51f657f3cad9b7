use crate::dom::snapshot::render_annotated;
use crate::dom::{DomSnapshot, ElementNode, PossibleInteractionsByXpath};
use crate::retrieval::{Chunk, DEFAULT_CHUNK_BUDGET};
use std::collections::{HashMap, HashSet};

/// Grows one chunk per interactive element by pulling in surrounding
/// structure up to a character budget.
///
/// Siblings are included alternately before and after the element; when a
/// whole sibling range fits under budget the expansion promotes to the
/// parent and restarts there. A chunk may exceed the budget by at most the
/// rendered length of the last included sibling. Elements already covered by
/// an earlier chunk are skipped, and chunks fully contained in a larger one
/// are absorbed by it.
#[derive(Debug, Clone)]
pub struct StructuralExpander {
    /// Character budget per chunk
    pub budget: usize,
}

impl Default for StructuralExpander {
    fn default() -> Self {
        Self {
            budget: DEFAULT_CHUNK_BUDGET,
        }
    }
}

struct Entry<'a> {
    node: &'a ElementNode,
    parent: Option<usize>,
    children: Vec<usize>,
}

struct Arena<'a> {
    entries: Vec<Entry<'a>>,
    by_xpath: HashMap<String, usize>,
}

fn build_arena(snapshot: &DomSnapshot) -> Arena<'_> {
    let mut arena = Arena {
        entries: Vec::new(),
        by_xpath: HashMap::new(),
    };
    let root_xpath = format!("/{}", snapshot.root.tag_name);
    add_entry(&snapshot.root, root_xpath.clone(), root_xpath, None, &mut arena);
    arena
}

/// `children_prefix` is what child segments are appended to; for a shadow
/// container it is the host xpath plus a trailing slash, which produces the
/// `//` separator
fn add_entry<'a>(
    node: &'a ElementNode,
    xpath: String,
    children_prefix: String,
    parent: Option<usize>,
    arena: &mut Arena<'a>,
) -> usize {
    let index = arena.entries.len();
    arena.entries.push(Entry {
        node,
        parent,
        children: Vec::new(),
    });
    arena.by_xpath.insert(xpath, index);

    let segments = crate::dom::snapshot::child_segments(&node.children);
    for (child, segment) in node.children.iter().zip(segments) {
        let child_index = if child.is_shadow_root() {
            let host_prefix = format!("{}/", children_prefix);
            add_entry(
                child,
                format!("{}#shadow-root", host_prefix),
                host_prefix,
                Some(index),
                arena,
            )
        } else {
            let child_xpath = format!("{}/{}", children_prefix, segment);
            add_entry(child, child_xpath.clone(), child_xpath, Some(index), arena)
        };
        arena.entries[index].children.push(child_index);
    }
    index
}

impl StructuralExpander {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn expand(
        &self,
        snapshot: &DomSnapshot,
        interactions: &PossibleInteractionsByXpath,
    ) -> Vec<Chunk> {
        // Annotation map by node pointer, shared by all chunk renderings
        let mut annotations: HashMap<*const ElementNode, String> = HashMap::new();
        snapshot.for_each_xpath(|node, xpath| {
            if interactions.contains_key(xpath) {
                annotations.insert(node as *const ElementNode, xpath.to_string());
            }
        });

        let arena = build_arena(snapshot);
        let mut covered: HashSet<String> = HashSet::new();
        let mut chunks: Vec<Chunk> = Vec::new();

        for target in interactions.keys() {
            if covered.contains(target) {
                continue;
            }
            let Some(&index) = arena.by_xpath.get(target) else {
                continue;
            };
            let window = self.grow(index, &arena, &annotations);
            let chunk = render_window(&window, &arena, &annotations);
            for xpath in &chunk.xpaths {
                covered.insert(xpath.clone());
            }
            chunks.push(chunk);
        }

        absorb_subsumed(chunks)
    }

    /// Expand from one element up to the budget, returning the arena indices
    /// of the final sibling window in document order
    fn grow(
        &self,
        start: usize,
        arena: &Arena<'_>,
        annotations: &HashMap<*const ElementNode, String>,
    ) -> Vec<usize> {
        let mut current = start;
        loop {
            let Some(parent) = arena.entries[current].parent else {
                // Reached the document root under budget
                return vec![current];
            };
            let siblings = &arena.entries[parent].children;
            let pos = siblings
                .iter()
                .position(|&i| i == current)
                .unwrap_or_default();
            let mut lo = pos;
            let mut hi = pos;
            let mut size = rendered_len(arena.entries[current].node, annotations);
            let mut take_prev = true;

            while size <= self.budget && (lo > 0 || hi + 1 < siblings.len()) {
                let grow_prev = (take_prev && lo > 0) || hi + 1 >= siblings.len();
                take_prev = !take_prev;
                let added = if grow_prev {
                    lo -= 1;
                    siblings[lo]
                } else {
                    hi += 1;
                    siblings[hi]
                };
                size += rendered_len(arena.entries[added].node, annotations);
            }

            if size <= self.budget && lo == 0 && hi + 1 == siblings.len() {
                // Whole sibling range fits, promote and restart
                current = parent;
                continue;
            }
            return siblings[lo..=hi].to_vec();
        }
    }
}

fn rendered_len(node: &ElementNode, annotations: &HashMap<*const ElementNode, String>) -> usize {
    let mut out = String::new();
    render_annotated(node, annotations, &mut out);
    out.len()
}

fn render_window(
    window: &[usize],
    arena: &Arena<'_>,
    annotations: &HashMap<*const ElementNode, String>,
) -> Chunk {
    let mut html = String::new();
    let mut xpaths = Vec::new();
    for &index in window {
        let node = arena.entries[index].node;
        render_annotated(node, annotations, &mut html);
        collect_annotated(node, annotations, &mut xpaths);
    }
    Chunk::new(html, xpaths)
}

fn collect_annotated(
    node: &ElementNode,
    annotations: &HashMap<*const ElementNode, String>,
    out: &mut Vec<String>,
) {
    if let Some(xpath) = annotations.get(&(node as *const ElementNode)) {
        out.push(xpath.clone());
    }
    for child in &node.children {
        collect_annotated(child, annotations, out);
    }
}

/// Drop chunks whose xpath set is contained in another chunk's set; the
/// containing chunk already carries all their context
fn absorb_subsumed(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let sets: Vec<HashSet<&String>> = chunks
        .iter()
        .map(|c| c.xpaths.iter().collect())
        .collect();
    let mut keep = vec![true; chunks.len()];
    for i in 0..chunks.len() {
        for j in 0..chunks.len() {
            if i == j || !keep[j] || sets[i].is_empty() {
                continue;
            }
            let subsumes = sets[j].is_superset(&sets[i])
                && (sets[j].len() > sets[i].len() || j < i);
            if subsumes {
                keep[i] = false;
                break;
            }
        }
    }
    chunks
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then_some(c))
        .collect()
}
