use crate::dom::DomSnapshot;
use crate::error::Result;
use crate::llm::Embedder;
use crate::retrieval::{Chunk, Retriever};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

/// Default number of chunks a ranker keeps
pub const DEFAULT_TOP_K: usize = 5;

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// BM25 scores of every document against the query tokens
fn bm25_scores(query: &[String], documents: &[Vec<String>]) -> Vec<f32> {
    let n = documents.len();
    if n == 0 {
        return Vec::new();
    }
    let avg_len: f32 =
        documents.iter().map(|d| d.len() as f32).sum::<f32>() / n as f32;
    let avg_len = avg_len.max(1.0);

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for doc in documents {
        let mut seen: Vec<&str> = Vec::new();
        for token in doc {
            if !seen.contains(&token.as_str()) {
                seen.push(token);
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }
    }

    documents
        .iter()
        .map(|doc| {
            let len = doc.len() as f32;
            query
                .iter()
                .map(|term| {
                    let tf = doc.iter().filter(|t| *t == term).count() as f32;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f32;
                    let idf = ((n as f32 - df + 0.5) / (df + 0.5) + 1.0).ln();
                    idf * (tf * (BM25_K1 + 1.0))
                        / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * len / avg_len))
                })
                .sum()
        })
        .collect()
}

/// Order indices by score, descending; equal scores keep input order so
/// ranking stays deterministic
fn rank_indices(scores: &[f32]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    indices
}

/// Lexical BM25 ranking over chunk content
#[derive(Debug, Clone)]
pub struct Bm25Ranker {
    pub top_k: usize,
}

impl Default for Bm25Ranker {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl Bm25Ranker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }
}

impl Retriever for Bm25Ranker {
    fn retrieve(&self, query: &str, chunks: Vec<Chunk>, _viewport_only: bool) -> Result<Vec<Chunk>> {
        let query_tokens = tokenize(query);
        let documents: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(&c.html)).collect();
        let scores = bm25_scores(&query_tokens, &documents);
        let order = rank_indices(&scores);
        let mut by_index: HashMap<usize, Chunk> =
            chunks.into_iter().enumerate().collect();
        Ok(order
            .into_iter()
            .take(self.top_k)
            .filter_map(|i| {
                by_index
                    .remove(&i)
                    .map(|c| c.with_score(scores[i]))
            })
            .collect())
    }
}

fn content_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Semantic ranking by embedding cosine similarity.
///
/// Chunk embeddings are cached by content hash; identical fragments across
/// calls reuse the cached vector and a concurrent recompute simply
/// overwrites with the same value.
pub struct EmbeddingRanker<E: Embedder> {
    embedder: E,
    pub top_k: usize,
    cache: RwLock<HashMap<u64, Vec<f32>>>,
}

impl<E: Embedder> EmbeddingRanker<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            top_k: DEFAULT_TOP_K,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn embeddings_for(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let hashes: Vec<u64> = texts.iter().map(|t| content_hash(t)).collect();
        let mut missing: Vec<usize> = Vec::new();
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            for (i, hash) in hashes.iter().enumerate() {
                if !cache.contains_key(hash) {
                    missing.push(i);
                }
            }
        }
        if !missing.is_empty() {
            let inputs: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.embedder.embed(&inputs)?;
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            for (&i, vector) in missing.iter().zip(vectors) {
                cache.insert(hashes[i], vector);
            }
        }
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        Ok(hashes
            .iter()
            .map(|h| cache.get(h).cloned().unwrap_or_default())
            .collect())
    }
}

impl<E: Embedder> Retriever for EmbeddingRanker<E> {
    fn retrieve(&self, query: &str, chunks: Vec<Chunk>, _viewport_only: bool) -> Result<Vec<Chunk>> {
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])?
            .into_iter()
            .next()
            .unwrap_or_default();
        let texts: Vec<String> = chunks.iter().map(|c| c.html.clone()).collect();
        let vectors = self.embeddings_for(&texts)?;
        let scores: Vec<f32> = vectors.iter().map(|v| cosine(&query_vec, v)).collect();
        let order = rank_indices(&scores);
        let mut by_index: HashMap<usize, Chunk> = chunks.into_iter().enumerate().collect();
        Ok(order
            .into_iter()
            .take(self.top_k)
            .filter_map(|i| by_index.remove(&i).map(|c| c.with_score(scores[i])))
            .collect())
    }
}

/// Default number of element records per ranking batch
pub const DEFAULT_GROUP_SIZE: usize = 10;

/// Two-level attribute ranking.
///
/// Interactive elements are flattened into short records of their salient
/// fields (tag, text, placeholder, name), batched, and ranked batch-first:
/// BM25 picks the best batches, then re-ranks records inside them. Winning
/// records map back to the chunks that contain their xpath.
pub struct FieldRanker {
    snapshot: DomSnapshot,
    pub top_k: usize,
    pub group_size: usize,
}

struct FieldRecord {
    xpath: String,
    text: String,
    chunk_index: usize,
}

impl FieldRanker {
    pub fn new(snapshot: DomSnapshot) -> Self {
        Self {
            snapshot,
            top_k: DEFAULT_TOP_K,
            group_size: DEFAULT_GROUP_SIZE,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.max(1);
        self
    }

    fn records(&self, chunks: &[Chunk]) -> Vec<FieldRecord> {
        let mut records = Vec::new();
        let mut seen: Vec<&str> = Vec::new();
        for (chunk_index, chunk) in chunks.iter().enumerate() {
            for xpath in &chunk.xpaths {
                if seen.contains(&xpath.as_str()) {
                    continue;
                }
                seen.push(xpath);
                let Some(node) = self.snapshot.find(xpath) else {
                    continue;
                };
                let mut fields = vec![node.tag_name.clone()];
                if let Some(text) = &node.text {
                    fields.push(text.clone());
                }
                for key in ["placeholder", "name", "aria-label", "value", "title"] {
                    if let Some(value) = node.get_attribute(key) {
                        fields.push(value.to_string());
                    }
                }
                records.push(FieldRecord {
                    xpath: xpath.clone(),
                    text: fields.join(" "),
                    chunk_index,
                });
            }
        }
        records
    }
}

impl Retriever for FieldRanker {
    fn retrieve(&self, query: &str, chunks: Vec<Chunk>, _viewport_only: bool) -> Result<Vec<Chunk>> {
        let records = self.records(&chunks);
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let query_tokens = tokenize(query);

        // Level one: rank batches of records
        let batches: Vec<&[FieldRecord]> = records.chunks(self.group_size).collect();
        let batch_docs: Vec<Vec<String>> = batches
            .iter()
            .map(|batch| {
                tokenize(
                    &batch
                        .iter()
                        .map(|r| r.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            })
            .collect();
        let batch_scores = bm25_scores(&query_tokens, &batch_docs);
        let batch_order = rank_indices(&batch_scores);
        let winning_batches = batch_order
            .into_iter()
            .take((self.top_k / self.group_size).max(1) + 1);

        // Level two: re-rank the records of the winning batches
        let candidates: Vec<&FieldRecord> = winning_batches
            .flat_map(|b| batches[b].iter())
            .collect();
        let candidate_docs: Vec<Vec<String>> =
            candidates.iter().map(|r| tokenize(&r.text)).collect();
        let candidate_scores = bm25_scores(&query_tokens, &candidate_docs);
        let candidate_order = rank_indices(&candidate_scores);

        // Map winning records back to their chunks, best first, no repeats
        let mut result: Vec<Chunk> = Vec::new();
        let mut used: Vec<usize> = Vec::new();
        for i in candidate_order {
            if result.len() >= self.top_k {
                break;
            }
            let record = candidates[i];
            if used.contains(&record.chunk_index) {
                continue;
            }
            used.push(record.chunk_index);
            result.push(chunks[record.chunk_index].clone().with_score(candidate_scores[i]));
        }
        Ok(result)
    }
}
