//! Element retrieval pipeline.
//!
//! Narrows the full page down to the handful of HTML fragments most relevant
//! to an instruction: annotate interactive elements with their xpaths, expand
//! each into a bounded-size chunk of surrounding structure, rank the chunks
//! against the query, then drop anything no longer visible on the live page.

pub mod annotate;
pub mod expand;
pub mod rank;

pub use annotate::XpathAnnotator;
pub use expand::StructuralExpander;
pub use rank::{Bm25Ranker, EmbeddingRanker, FieldRanker};

use crate::driver::Driver;
use crate::error::Result;

/// One retrievable HTML fragment and the interactive xpaths it contains
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Annotated HTML of the fragment
    pub html: String,
    /// Xpaths of the annotated elements inside the fragment
    pub xpaths: Vec<String>,
    /// Relevance score assigned by a ranking stage
    pub score: Option<f32>,
}

impl Chunk {
    pub fn new(html: impl Into<String>, xpaths: Vec<String>) -> Self {
        Self {
            html: html.into(),
            xpaths,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// A ranking stage: reorders and narrows a chunk set for a query
pub trait Retriever {
    fn retrieve(&self, query: &str, chunks: Vec<Chunk>, viewport_only: bool) -> Result<Vec<Chunk>>;
}

/// Default character budget for expanded chunks
pub const DEFAULT_CHUNK_BUDGET: usize = 750;

/// Full pipeline from live page to ranked, visibility-checked chunks
pub struct RetrievalPipeline<'a> {
    driver: &'a dyn Driver,
    annotator: XpathAnnotator,
    expander: StructuralExpander,
    ranker: Box<dyn Retriever + 'a>,
}

impl<'a> RetrievalPipeline<'a> {
    pub fn new(driver: &'a dyn Driver, ranker: Box<dyn Retriever + 'a>) -> Self {
        Self {
            driver,
            annotator: XpathAnnotator::default(),
            expander: StructuralExpander::default(),
            ranker,
        }
    }

    pub fn annotator(mut self, annotator: XpathAnnotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn expander(mut self, expander: StructuralExpander) -> Self {
        self.expander = expander;
        self
    }

    /// Run the whole pipeline for one query.
    ///
    /// When ranking leaves only chunks without any xpath, the unranked
    /// expansion output is returned instead so the caller still has element
    /// context to work with. The final visibility pass re-snapshots the page
    /// and may shrink the result below the ranker's top-k; nothing is
    /// promoted to fill the gap.
    pub fn retrieve(&self, query: &str, viewport_only: bool) -> Result<Vec<Chunk>> {
        let snapshot = self.driver.snapshot()?;
        let interactions = self
            .annotator
            .interactions(&snapshot, viewport_only);
        let chunks = self.expander.expand(&snapshot, &interactions);
        log::debug!(
            "retrieval: {} interactive elements expanded into {} chunks",
            interactions.len(),
            chunks.len()
        );
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let ranked = self
            .ranker
            .retrieve(query, chunks.clone(), viewport_only)?;
        let ranked = if ranked.iter().all(|c| c.xpaths.is_empty()) {
            log::debug!("retrieval: ranked set carries no xpaths, falling back to raw chunks");
            chunks
        } else {
            ranked
        };

        // The page may have changed since the snapshot was taken
        let fresh = self.driver.snapshot()?;
        let mut visible = Vec::new();
        for mut chunk in ranked {
            chunk.xpaths.retain(|xpath| fresh.is_visible(xpath));
            if !chunk.xpaths.is_empty() {
                visible.push(chunk);
            } else {
                log::debug!("retrieval: dropping chunk, no visible xpath left");
            }
        }
        Ok(visible)
    }
}
