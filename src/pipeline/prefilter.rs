use tracing::info;

use crate::model::TextSpan;
use crate::semantic::{Embedder, normalize_whitespace};

use super::relevance::{Ranked, RelevanceScorer, Scoreable};

pub const DEFAULT_PREFILTER_PAGES: u32 = 4;
pub const DEFAULT_PREFILTER_THRESHOLD: f64 = 0.20;
pub const DEFAULT_MAX_DOCUMENTS: usize = 5;

/// Opening-pages text of one document, scored as a whole. `source_index`
/// points back into the caller's document list, since names need not be unique.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentExcerpt {
    pub source_index: usize,
    pub document: String,
    pub content: String,
}

impl DocumentExcerpt {
    pub fn from_spans(
        source_index: usize,
        document: impl Into<String>,
        spans: &[TextSpan],
        max_pages: u32,
    ) -> Self {
        let text = spans
            .iter()
            .filter(|span| span.page <= max_pages)
            .map(|span| span.text.as_str())
            .collect::<Vec<&str>>()
            .join(" ");

        Self {
            source_index,
            document: document.into(),
            content: normalize_whitespace(&text),
        }
    }
}

impl Scoreable for DocumentExcerpt {
    fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefilterConfig {
    pub threshold: f64,
    pub max_documents: usize,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PREFILTER_THRESHOLD,
            max_documents: DEFAULT_MAX_DOCUMENTS,
        }
    }
}

/// Keeps ranked documents scoring at least the threshold, up to the cap, in rank order.
pub fn apply_prefilter_gate<T>(
    ranked: Vec<Ranked<T>>,
    config: PrefilterConfig,
) -> Vec<Ranked<T>> {
    ranked
        .into_iter()
        .filter(|document| document.final_score >= config.threshold)
        .take(config.max_documents)
        .collect()
}

/// Scores document excerpts and returns the ones worth full extraction. An
/// empty result means no document is relevant, which is not an error.
pub fn prefilter_documents<E: Embedder + ?Sized>(
    scorer: &RelevanceScorer<'_, E>,
    excerpts: Vec<DocumentExcerpt>,
    config: PrefilterConfig,
) -> Vec<Ranked<DocumentExcerpt>> {
    let candidate_count = excerpts.len();
    let ranked = scorer.rank(excerpts);
    for document in &ranked {
        info!(
            document = %document.item.document,
            semantic = document.semantic_score,
            keyword = document.keyword_score,
            score = document.final_score,
            "pre-filter score"
        );
    }

    let selected = apply_prefilter_gate(ranked, config);
    info!(
        candidates = candidate_count,
        selected = selected.len(),
        threshold = config.threshold,
        "pre-filter complete"
    );
    selected
}
