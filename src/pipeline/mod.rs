pub mod analysis;
pub mod chunking;
pub mod document;
pub mod headings;
pub mod prefilter;
pub mod relevance;
pub mod sections;
pub mod spans;
pub mod style;


use crate::cli::RankingArgs;

use self::analysis::{DEFAULT_MAX_SECTIONS, DEFAULT_MAX_SUBSECTIONS, DEFAULT_REFINE_TOP_SECTIONS};
use self::chunking::DEFAULT_CHUNK_WORDS;
use self::prefilter::{DEFAULT_PREFILTER_PAGES, PrefilterConfig};
use self::relevance::ScoreWeights;
use self::sections::{DEFAULT_MIN_HEADING_SECTIONS, DEFAULT_MIN_PARAGRAPH_CHARS};

/// Tunables for one Round 1B analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub prefilter_enabled: bool,
    pub prefilter_pages: u32,
    pub prefilter: PrefilterConfig,
    pub document_weights: ScoreWeights,
    pub section_weights: ScoreWeights,
    pub max_sections: usize,
    pub refine_top_sections: usize,
    pub max_subsections: usize,
    pub chunk_words: usize,
    pub min_heading_sections: usize,
    pub min_paragraph_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prefilter_enabled: true,
            prefilter_pages: DEFAULT_PREFILTER_PAGES,
            prefilter: PrefilterConfig::default(),
            document_weights: ScoreWeights::DOCUMENT,
            section_weights: ScoreWeights::SECTION,
            max_sections: DEFAULT_MAX_SECTIONS,
            refine_top_sections: DEFAULT_REFINE_TOP_SECTIONS,
            max_subsections: DEFAULT_MAX_SUBSECTIONS,
            chunk_words: DEFAULT_CHUNK_WORDS,
            min_heading_sections: DEFAULT_MIN_HEADING_SECTIONS,
            min_paragraph_chars: DEFAULT_MIN_PARAGRAPH_CHARS,
        }
    }
}

impl From<&RankingArgs> for PipelineConfig {
    fn from(args: &RankingArgs) -> Self {
        Self {
            prefilter_enabled: !args.no_prefilter,
            prefilter_pages: args.prefilter_pages.max(1),
            prefilter: PrefilterConfig {
                threshold: args.prefilter_threshold,
                max_documents: args.max_documents,
            },
            document_weights: ScoreWeights {
                semantic: args.document_semantic_weight,
                keyword: args.document_keyword_weight,
            },
            section_weights: ScoreWeights {
                semantic: args.section_semantic_weight,
                keyword: args.section_keyword_weight,
            },
            max_sections: args.max_sections,
            refine_top_sections: args.refine_top_sections,
            max_subsections: args.max_subsections,
            chunk_words: args.chunk_words.max(1),
            min_heading_sections: args.min_heading_sections,
            min_paragraph_chars: args.min_paragraph_chars,
        }
    }
}
