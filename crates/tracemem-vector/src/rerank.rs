use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};

/// A candidate from one side of the hybrid query, best-first.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub node_id: Uuid,
    pub score: f32,
}

/// Fuses the dense and lexical candidate lists into one ranking.
///
/// Both inputs are ordered best-first. `vector_weight` is the dense share
/// of the blend: 0.0 must reproduce the lexical ordering, 1.0 the dense
/// ordering.
pub trait Reranker: Send + Sync {
    fn fuse(&self, dense: &[RankedHit], lexical: &[RankedHit], vector_weight: f32)
        -> Vec<RankedHit>;
}

/// Reciprocal rank fusion: each list contributes `1 / (k + rank)`,
/// weighted by its side of `vector_weight`.
pub struct RrfReranker {
    k: f32,
}

impl RrfReranker {
    pub fn new(k: f32) -> Self {
        Self { k }
    }
}

impl Default for RrfReranker {
    fn default() -> Self {
        Self { k: 60.0 }
    }
}

impl Reranker for RrfReranker {
    fn fuse(
        &self,
        dense: &[RankedHit],
        lexical: &[RankedHit],
        vector_weight: f32,
    ) -> Vec<RankedHit> {
        let mut fused = Accumulator::new();
        for (rank, hit) in dense.iter().enumerate() {
            fused.add(hit.node_id, vector_weight / (self.k + rank as f32 + 1.0));
        }
        for (rank, hit) in lexical.iter().enumerate() {
            fused.add(hit.node_id, (1.0 - vector_weight) / (self.k + rank as f32 + 1.0));
        }
        fused.into_sorted()
    }
}

/// Weighted combination of min-max-normalized scores.
pub struct LinearCombinationReranker;

impl Reranker for LinearCombinationReranker {
    fn fuse(
        &self,
        dense: &[RankedHit],
        lexical: &[RankedHit],
        vector_weight: f32,
    ) -> Vec<RankedHit> {
        let mut fused = Accumulator::new();
        for (node_id, normalized) in normalize(dense) {
            fused.add(node_id, vector_weight * normalized);
        }
        for (node_id, normalized) in normalize(lexical) {
            fused.add(node_id, (1.0 - vector_weight) * normalized);
        }
        fused.into_sorted()
    }
}

/// Min-max normalization to [0, 1]; a constant-score list maps to 1.0.
fn normalize(hits: &[RankedHit]) -> Vec<(Uuid, f32)> {
    let Some(max) = hits.iter().map(|h| h.score).reduce(f32::max) else {
        return Vec::new();
    };
    let min = hits.iter().map(|h| h.score).reduce(f32::min).unwrap_or(max);
    let span = max - min;
    hits.iter()
        .map(|h| {
            let normalized = if span > 0.0 { (h.score - min) / span } else { 1.0 };
            (h.node_id, normalized)
        })
        .collect()
}

/// Order-preserving score accumulator, so equal fused scores resolve in
/// first-seen (dense-first) order rather than hash order.
struct Accumulator {
    order: Vec<Uuid>,
    scores: HashMap<Uuid, f32>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            scores: HashMap::new(),
        }
    }

    fn add(&mut self, node_id: Uuid, score: f32) {
        match self.scores.get_mut(&node_id) {
            Some(existing) => *existing += score,
            None => {
                self.order.push(node_id);
                self.scores.insert(node_id, score);
            }
        }
    }

    fn into_sorted(self) -> Vec<RankedHit> {
        let mut hits: Vec<RankedHit> = self
            .order
            .into_iter()
            .map(|node_id| RankedHit {
                score: self.scores[&node_id],
                node_id,
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }
}

/// Named reranker presets plus caller-registered strategies.
///
/// Unknown keys fail fast at database open rather than at query time.
pub struct RerankerRegistry {
    entries: HashMap<String, Arc<dyn Reranker>>,
}

impl Default for RerankerRegistry {
    fn default() -> Self {
        let mut entries: HashMap<String, Arc<dyn Reranker>> = HashMap::new();
        entries.insert("rrf".to_string(), Arc::new(RrfReranker::default()));
        entries.insert("linear".to_string(), Arc::new(LinearCombinationReranker));
        Self { entries }
    }
}

impl RerankerRegistry {
    /// Register (or replace) a named reranker.
    pub fn register(&mut self, name: impl Into<String>, reranker: Arc<dyn Reranker>) {
        self.entries.insert(name.into(), reranker);
    }

    /// Resolve a reranker by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Reranker>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownReranker(name.to_string()))
    }
}
