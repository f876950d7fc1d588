use std::path::PathBuf;

use tracing::{info, warn};

use crate::model::{DocumentFailure, Section};
use crate::semantic::Embedder;

use super::PipelineConfig;
use super::chunking::{SubSection, chunk_section};
use super::document::extract_document_sections;
use super::headings::HeadingClassifier;
use super::prefilter::{DocumentExcerpt, prefilter_documents};
use super::relevance::{Ranked, RelevanceScorer};
use super::spans::PdfBackend;

pub const DEFAULT_MAX_SECTIONS: usize = 10;
pub const DEFAULT_REFINE_TOP_SECTIONS: usize = 5;
pub const DEFAULT_MAX_SUBSECTIONS: usize = 5;

/// One input document: the name reported in output and where to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSource {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub selected_documents: Vec<String>,
    /// Top sections, best first, with 1-based ranks.
    pub sections: Vec<Ranked<Section>>,
    pub subsections: Vec<Ranked<SubSection>>,
    pub failures: Vec<DocumentFailure>,
}

/// Round 1B over a document collection. Extraction failures are recorded per
/// document and never abort the batch; no relevant documents yields an empty
/// result.
pub fn analyze_documents<B, E>(
    backend: &B,
    classifier: &HeadingClassifier,
    scorer: &RelevanceScorer<'_, E>,
    documents: &[DocumentSource],
    config: &PipelineConfig,
) -> AnalysisResult
where
    B: PdfBackend + ?Sized,
    E: Embedder + ?Sized,
{
    let mut result = AnalysisResult::default();

    let selected = if config.prefilter_enabled {
        select_documents(backend, scorer, documents, config, &mut result.failures)
    } else {
        documents.iter().collect::<Vec<&DocumentSource>>()
    };

    if selected.is_empty() {
        info!(
            documents = documents.len(),
            "no relevant documents; returning empty analysis"
        );
        return result;
    }

    let mut sections = Vec::<Section>::new();
    for source in selected {
        match extract_document_sections(
            backend,
            classifier,
            &source.path,
            &source.name,
            config.min_heading_sections,
            config.min_paragraph_chars,
        ) {
            Ok(extracted) => {
                info!(
                    document = %source.name,
                    sections = extracted.sections.len(),
                    strategy = extracted.strategy.as_str(),
                    paragraph_fallback = extracted.paragraph_fallback,
                    "sections extracted"
                );
                result.selected_documents.push(source.name.clone());
                sections.extend(extracted.sections);
            }
            Err(error) => {
                record_failure(&mut result.failures, &source.name, &error.to_string());
            }
        }
    }

    let section_scorer = scorer.with_weights(config.section_weights);
    let mut ranked_sections = section_scorer.rank(sections);
    ranked_sections.truncate(config.max_sections);

    let chunks = ranked_sections
        .iter()
        .take(config.refine_top_sections)
        .flat_map(|ranked| chunk_section(&ranked.item, config.chunk_words))
        .collect::<Vec<SubSection>>();
    let mut ranked_subsections = section_scorer.rank(chunks);
    ranked_subsections.truncate(config.max_subsections);

    info!(
        selected = result.selected_documents.len(),
        sections = ranked_sections.len(),
        subsections = ranked_subsections.len(),
        failed = result.failures.len(),
        "analysis complete"
    );

    result.sections = ranked_sections;
    result.subsections = ranked_subsections;
    result
}

fn select_documents<'d, B, E>(
    backend: &B,
    scorer: &RelevanceScorer<'_, E>,
    documents: &'d [DocumentSource],
    config: &PipelineConfig,
    failures: &mut Vec<DocumentFailure>,
) -> Vec<&'d DocumentSource>
where
    B: PdfBackend + ?Sized,
    E: Embedder + ?Sized,
{
    let mut excerpts = Vec::<DocumentExcerpt>::new();
    for (index, source) in documents.iter().enumerate() {
        match backend.extract_spans(&source.path, Some(config.prefilter_pages)) {
            Ok(spans) => excerpts.push(DocumentExcerpt::from_spans(
                index,
                source.name.clone(),
                &spans,
                config.prefilter_pages,
            )),
            Err(error) => record_failure(failures, &source.name, &error.to_string()),
        }
    }

    let document_scorer = scorer.with_weights(config.document_weights);
    prefilter_documents(&document_scorer, excerpts, config.prefilter)
        .into_iter()
        .filter_map(|ranked| documents.get(ranked.item.source_index))
        .collect()
}

fn record_failure(failures: &mut Vec<DocumentFailure>, document: &str, reason: &str) {
    warn!(document, reason, "document extraction failed");
    failures.push(DocumentFailure {
        document: document.to_string(),
        reason: reason.to_string(),
    });
}
