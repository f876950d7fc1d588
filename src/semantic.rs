use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::EncodingError;

pub const DEFAULT_MODEL_ID: &str = "miniLM-L6-v2-local-v1";
pub const DEFAULT_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_NORMALIZATION: &str = "l2";
pub const DEFAULT_BACKEND: &str = "local-hash-v1";

#[derive(Debug, Clone)]
pub struct SemanticModelConfig {
    pub model_id: String,
    pub model_name: String,
    pub dimensions: usize,
    pub normalization: String,
    pub backend: String,
}

pub fn resolve_model_config(model_id: &str) -> SemanticModelConfig {
    let trimmed = model_id.trim();
    let resolved_id = if trimmed.is_empty() {
        DEFAULT_MODEL_ID
    } else {
        trimmed
    };

    let model_name = if resolved_id == DEFAULT_MODEL_ID {
        DEFAULT_MODEL_NAME
    } else {
        resolved_id
    };

    SemanticModelConfig {
        model_id: resolved_id.to_string(),
        model_name: model_name.to_string(),
        dimensions: DEFAULT_EMBEDDING_DIM,
        normalization: DEFAULT_NORMALIZATION.to_string(),
        backend: DEFAULT_BACKEND.to_string(),
    }
}

/// Text-to-vector collaborator used by the relevance scorer.
///
/// Implementations must be deterministic for a given model and input. The
/// model is loaded once and handed to the scorer by reference.
pub trait Embedder {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncodingError>;

    fn cosine_similarity(&self, left: &[f32], right: &[f32]) -> f64 {
        cosine_similarity(left, right)
    }
}

/// Feature-hashing embedder: signed unigram and bigram buckets, L2-normalised.
#[derive(Debug, Clone)]
pub struct LocalHashEmbedder {
    config: SemanticModelConfig,
}

impl LocalHashEmbedder {
    pub fn new(config: SemanticModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SemanticModelConfig {
        &self.config
    }
}

impl Embedder for LocalHashEmbedder {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncodingError> {
        Ok(texts
            .iter()
            .map(|text| embed_text_local(text, self.config.dimensions))
            .collect())
    }
}

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

pub fn embed_text_local(payload: &str, dimensions: usize) -> Vec<f32> {
    let dims = dimensions.max(8);
    let mut vector = vec![0_f32; dims];
    let mut tokens = tokenize_payload(payload);

    if tokens.is_empty() {
        return vector;
    }

    for token in tokens.drain(..) {
        let hash = stable_hash(&token);
        let index = (hash as usize) % dims;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
        vector[index] += sign * weight;
    }

    normalize_vector(&mut vector);
    vector
}

/// Cosine similarity in [-1, 1]; zero for mismatched, empty or all-zero vectors.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let dot = left
        .iter()
        .zip(right.iter())
        .map(|(left_value, right_value)| f64::from(*left_value) * f64::from(*right_value))
        .sum::<f64>();
    let left_norm = squared_norm(left).sqrt();
    let right_norm = squared_norm(right).sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }

    (dot / (left_norm * right_norm)).clamp(-1.0, 1.0)
}

fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn tokenize_payload(payload: &str) -> Vec<String> {
    let normalized = normalize_whitespace(payload);
    if normalized.is_empty() {
        return Vec::new();
    }

    let words = normalized
        .split(' ')
        .map(|value| {
            value
                .chars()
                .filter(|character| character.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>();

    if words.is_empty() {
        return Vec::new();
    }

    let mut features = Vec::<String>::with_capacity(words.len() * 2);
    for (index, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(index + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn squared_norm(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>()
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = squared_norm(values);
    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    if norm == 0.0 {
        return;
    }

    for value in values {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_model_config_defaults_blank_ids() {
        let config = resolve_model_config("  ");
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(config.dimensions, DEFAULT_EMBEDDING_DIM);

        let custom = resolve_model_config("custom-model");
        assert_eq!(custom.model_id, "custom-model");
        assert_eq!(custom.model_name, "custom-model");
    }

    #[test]
    fn local_embeddings_are_deterministic_and_normalized() {
        let first = embed_text_local("Budget planning for the quarter", 64);
        let second = embed_text_local("budget   planning for the QUARTER", 64);
        assert_eq!(first, second);

        let norm = squared_norm(&first).sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_payload_embeds_to_zero_vector() {
        let vector = embed_text_local("   ", 16);
        assert_eq!(vector.len(), 16);
        assert!(vector.iter().all(|value| *value == 0.0));
        assert_eq!(cosine_similarity(&vector, &vector), 0.0);
    }

    #[test]
    fn cosine_similarity_handles_unnormalized_and_mismatched_vectors() {
        assert!((cosine_similarity(&[2.0, 0.0], &[5.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-3.0, 0.0]) + 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn related_text_scores_above_unrelated_text() {
        let embedder = LocalHashEmbedder::new(resolve_model_config(DEFAULT_MODEL_ID));
        let vectors = embedder
            .encode_batch(&[
                "travel itinerary for a group of friends",
                "Plan a travel itinerary with friends across the coast",
                "Soldering surface mount resistors",
            ])
            .expect("vectors");
        let (query, related, unrelated) = (&vectors[0], &vectors[1], &vectors[2]);

        assert!(
            embedder.cosine_similarity(query, related)
                > embedder.cosine_similarity(query, unrelated)
        );
    }
}
