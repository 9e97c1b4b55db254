//! Semantic memory of research findings
//!
//! Every key finding is embedded and kept with the query, confidence and
//! source it came from. ANALYZING looks up related findings by cosine
//! similarity. Embeddings come from an injectable [`Embedder`]; when none is
//! configured, or when it fails, a deterministic word-hashing embedder is
//! used so the memory works offline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sleuth_core::{Embedder, MemoryConfig, SleuthResult};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Offline embedder: bag of lowercased words hashed into a fixed number of
/// buckets, L2-normalized
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
        {
            let bucket = (fnv1a(word.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> SleuthResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn model_name(&self) -> &str {
        "hashing-fallback"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Where a remembered finding came from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub query: String,
    pub confidence: f64,
    pub source: String,
    /// Research step that produced the finding
    pub step_number: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: MemoryMetadata,
    pub stored_at: DateTime<Utc>,
}

/// A stored item scored against a lookup
#[derive(Debug, Clone)]
pub struct RelatedFinding {
    pub item: MemoryItem,
    pub similarity: f64,
}

/// Counters reported with each run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_items: usize,
    pub cache_size: usize,
    pub model: String,
    pub dimensions: usize,
    pub cache_enabled: bool,
    pub searches: usize,
    pub related_matches: usize,
    /// Embeddings produced by the hashing fallback after the embedder failed
    pub fallback_embeddings: usize,
}

/// Cosine similarity; 0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub struct SemanticMemory {
    embedder: Arc<dyn Embedder>,
    fallback: HashingEmbedder,
    items: Vec<MemoryItem>,
    cache: HashMap<String, Vec<f32>>,
    cache_order: VecDeque<String>,
    cache_enabled: bool,
    max_cache_size: usize,
    searches: usize,
    related_matches: usize,
    fallback_embeddings: usize,
}

impl SemanticMemory {
    pub fn new(embedder: Arc<dyn Embedder>, config: &MemoryConfig) -> Self {
        let fallback = HashingEmbedder::new(embedder.dimensions());
        Self {
            embedder,
            fallback,
            items: Vec::new(),
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
            cache_enabled: config.cache_enabled,
            max_cache_size: config.max_cache_size,
            searches: 0,
            related_matches: 0,
            fallback_embeddings: 0,
        }
    }

    /// Memory backed by the offline hashing embedder
    pub fn offline(config: &MemoryConfig) -> Self {
        Self::new(Arc::new(HashingEmbedder::new(config.dimensions)), config)
    }

    /// Embed and store `content`; returns the new item id
    pub async fn store(&mut self, content: &str, metadata: MemoryMetadata) -> String {
        let embedding = self.embedding(content).await;
        let id = format!("sem_{}", Uuid::new_v4());
        self.items.push(MemoryItem {
            id: id.clone(),
            content: content.to_string(),
            embedding,
            metadata,
            stored_at: Utc::now(),
        });
        id
    }

    /// Items with similarity of at least `threshold`, best first, at most `top_k`
    pub async fn search(
        &mut self,
        query: &str,
        top_k: usize,
        threshold: f64,
    ) -> Vec<RelatedFinding> {
        self.ranked(query, top_k, threshold, |_| true).await
    }

    /// Like [`search`](Self::search) but skips the entry for `content`
    /// stored by `step_number` itself
    pub async fn related(
        &mut self,
        content: &str,
        step_number: usize,
        top_k: usize,
        threshold: f64,
    ) -> Vec<RelatedFinding> {
        self.ranked(content, top_k, threshold, |item| {
            item.metadata.step_number != step_number || item.content != content
        })
        .await
    }

    async fn ranked<F>(
        &mut self,
        query: &str,
        top_k: usize,
        threshold: f64,
        keep: F,
    ) -> Vec<RelatedFinding>
    where
        F: Fn(&MemoryItem) -> bool,
    {
        self.searches += 1;
        if self.items.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let query_embedding = self.embedding(query).await;
        let mut scored: Vec<RelatedFinding> = self
            .items
            .iter()
            .filter(|item| keep(*item))
            .map(|item| RelatedFinding {
                similarity: cosine_similarity(&query_embedding, &item.embedding),
                item: item.clone(),
            })
            .filter(|related| related.similarity >= threshold)
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        self.related_matches += scored.len();
        debug!(matches = scored.len(), threshold = threshold, "Semantic memory search");
        scored
    }

    async fn embedding(&mut self, text: &str) -> Vec<f32> {
        if self.cache_enabled {
            if let Some(cached) = self.cache.get(text) {
                return cached.clone();
            }
        }

        let embedding = match self.embedder.embed(text).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(
                    model = self.embedder.model_name(),
                    error = %err,
                    "Embedding failed, using hashing fallback"
                );
                self.fallback_embeddings += 1;
                self.fallback.embed_text(text)
            }
        };

        if self.cache_enabled && self.max_cache_size > 0 {
            while self.cache.len() >= self.max_cache_size {
                match self.cache_order.pop_front() {
                    Some(oldest) => {
                        self.cache.remove(&oldest);
                    }
                    None => break,
                }
            }
            self.cache.insert(text.to_string(), embedding.clone());
            self.cache_order.push_back(text.to_string());
        }
        embedding
    }

    pub fn items(&self) -> &[MemoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            total_items: self.items.len(),
            cache_size: self.cache.len(),
            model: self.embedder.model_name().to_string(),
            dimensions: self.embedder.dimensions(),
            cache_enabled: self.cache_enabled,
            searches: self.searches,
            related_matches: self.related_matches,
            fallback_embeddings: self.fallback_embeddings,
        }
    }

    /// Drop all items, cached embeddings and counters
    pub fn clear(&mut self) {
        self.items.clear();
        self.cache.clear();
        self.cache_order.clear();
        self.searches = 0;
        self.related_matches = 0;
        self.fallback_embeddings = 0;
    }
}
