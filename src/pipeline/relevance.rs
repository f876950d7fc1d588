use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::EncodingError;
use crate::model::{JobToBeDone, Persona, Section};
use crate::semantic::{Embedder, normalize_whitespace};

const MIN_KEYWORD_CHARS: usize = 4;
const KEYWORD_SATURATION_HITS: f64 = 3.0;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Weighted blend of the semantic and keyword signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub semantic: f64,
    pub keyword: f64,
}

impl ScoreWeights {
    /// Whole-document pre-filter weighting.
    pub const DOCUMENT: Self = Self {
        semantic: 0.5,
        keyword: 0.5,
    };
    /// Section and sub-section weighting, favouring the semantic signal.
    pub const SECTION: Self = Self {
        semantic: 0.6,
        keyword: 0.4,
    };

    pub fn combine(self, semantic_score: f64, keyword_score: f64) -> f64 {
        self.semantic * semantic_score + self.keyword * keyword_score
    }
}

/// Anything with text content that can be ranked against a query.
pub trait Scoreable {
    fn content(&self) -> &str;
}

impl Scoreable for Section {
    fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub item: T,
    pub semantic_score: f64,
    pub keyword_score: f64,
    pub final_score: f64,
    pub importance_rank: usize,
}

pub fn build_query(persona: &Persona, job: &JobToBeDone) -> String {
    let role = normalize_whitespace(&persona.role);
    let persona_text = match persona
        .description
        .as_deref()
        .map(normalize_whitespace)
        .filter(|value| !value.is_empty())
    {
        Some(description) if role.is_empty() => description,
        Some(description) => format!("{role} ({description})"),
        None => role,
    };

    format!(
        "Persona: {}. Job: {}",
        persona_text,
        normalize_whitespace(&job.task)
    )
}

/// Distinct task keywords in first-seen order: lowercased, punctuation
/// stripped, stop words and words of three characters or fewer removed.
pub fn extract_keywords(task: &str) -> Vec<String> {
    let lowered = task
        .chars()
        .filter(|character| character.is_alphanumeric() || character.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let mut seen = HashSet::<String>::new();
    lowered
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|word| !STOP_WORDS.contains(word))
        .filter(|word| seen.insert((*word).to_string()))
        .map(str::to_string)
        .collect()
}

/// Fraction of keywords present in `content`, saturating at three hits.
pub fn keyword_score(keywords: &[String], content: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }

    let lowered = content.to_lowercase();
    let hits = keywords
        .iter()
        .filter(|keyword| lowered.contains(keyword.as_str()))
        .count();
    (hits as f64 / KEYWORD_SATURATION_HITS).clamp(0.0, 1.0)
}

/// Stable descending sort by `final_score`, then 1-based ranks.
pub fn rank_by_final_score<T>(items: &mut [Ranked<T>]) {
    items.sort_by(|left, right| right.final_score.total_cmp(&left.final_score));
    for (index, item) in items.iter_mut().enumerate() {
        item.importance_rank = index + 1;
    }
}

/// Scores items against one persona/task query with a fixed weighting.
pub struct RelevanceScorer<'a, E: Embedder + ?Sized> {
    embedder: &'a E,
    query: String,
    keywords: Vec<String>,
    weights: ScoreWeights,
}

impl<'a, E: Embedder + ?Sized> RelevanceScorer<'a, E> {
    pub fn new(
        embedder: &'a E,
        query: String,
        keywords: Vec<String>,
        weights: ScoreWeights,
    ) -> Self {
        Self {
            embedder,
            query,
            keywords,
            weights,
        }
    }

    pub fn with_weights(&self, weights: ScoreWeights) -> Self {
        Self {
            embedder: self.embedder,
            query: self.query.clone(),
            keywords: self.keywords.clone(),
            weights,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn try_rank<T: Scoreable>(&self, items: Vec<T>) -> Result<Vec<Ranked<T>>, EncodingError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut texts = Vec::<&str>::with_capacity(items.len() + 1);
        texts.push(self.query.as_str());
        texts.extend(items.iter().map(|item| item.content()));

        let mut vectors = self.embedder.encode_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(EncodingError::BatchSizeMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        let query_vector = vectors.remove(0);

        let mut ranked = items
            .into_iter()
            .zip(vectors)
            .map(|(item, vector)| {
                let semantic_score = self
                    .embedder
                    .cosine_similarity(&query_vector, &vector)
                    .clamp(0.0, 1.0);
                let keyword_score = keyword_score(&self.keywords, item.content());
                Ranked {
                    final_score: self.weights.combine(semantic_score, keyword_score),
                    item,
                    semantic_score,
                    keyword_score,
                    importance_rank: 0,
                }
            })
            .collect::<Vec<Ranked<T>>>();

        rank_by_final_score(&mut ranked);
        debug!(items = ranked.len(), "ranked batch");
        Ok(ranked)
    }

    /// Like [`Self::try_rank`], but an encoding failure yields an empty ranking.
    pub fn rank<T: Scoreable>(&self, items: Vec<T>) -> Vec<Ranked<T>> {
        let count = items.len();
        match self.try_rank(items) {
            Ok(ranked) => ranked,
            Err(error) => {
                warn!(items = count, error = %error, "embedding failed; batch left unranked");
                Vec::new()
            }
        }
    }
}
