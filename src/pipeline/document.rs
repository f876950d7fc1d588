use std::path::Path;

use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::model::{DocumentOutline, HeadingStrategyKind, OutlineEntry, Section};
use crate::util::now_utc_string;

use super::headings::HeadingClassifier;
use super::sections::{drop_empty_sections, group_paragraphs, group_sections};
use super::spans::PdfBackend;

const MIN_METADATA_TITLE_CHARS: usize = 5;

/// Sections of one document, ready for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSections {
    pub sections: Vec<Section>,
    pub strategy: HeadingStrategyKind,
    pub paragraph_fallback: bool,
}

/// Round 1A for a single PDF: title plus heading outline.
pub fn outline_document<B: PdfBackend + ?Sized>(
    backend: &B,
    classifier: &HeadingClassifier,
    path: &Path,
    prefer_metadata_title: bool,
) -> Result<DocumentOutline, ExtractionError> {
    let spans = backend.extract_spans(path, None)?;
    let detection = classifier.classify(&spans);

    let mut title = detection.title_text().to_string();
    if prefer_metadata_title {
        let metadata_title = backend
            .metadata_title(path)
            .map(|value| value.trim().to_string())
            .filter(|value| value.chars().count() > MIN_METADATA_TITLE_CHARS);
        if let Some(metadata_title) = metadata_title {
            debug!(path = %path.display(), title = %metadata_title, "using metadata title");
            title = metadata_title;
        }
    }

    let outline = detection
        .headings
        .iter()
        .map(|heading| OutlineEntry {
            level: heading.level,
            text: heading.text.clone(),
            page: heading.page,
        })
        .collect::<Vec<OutlineEntry>>();

    Ok(DocumentOutline {
        title,
        total_headings: outline.len(),
        outline,
        heading_strategy: detection.strategy,
        extraction_timestamp: now_utc_string(),
    })
}

/// Full extraction of one document into non-empty sections tagged with
/// `document`. Falls back to paragraph grouping when headings are too sparse.
pub fn extract_document_sections<B: PdfBackend + ?Sized>(
    backend: &B,
    classifier: &HeadingClassifier,
    path: &Path,
    document: &str,
    min_heading_sections: usize,
    min_paragraph_chars: usize,
) -> Result<DocumentSections, ExtractionError> {
    let spans = backend.extract_spans(path, None)?;
    let detection = classifier.classify(&spans);

    let grouped = group_sections(&spans, &detection.headings);
    debug!(
        document,
        headings = detection.headings.len(),
        preamble_spans = grouped.preamble.len(),
        "grouped spans under headings"
    );
    let mut sections = grouped.sections;
    drop_empty_sections(&mut sections);

    let mut paragraph_fallback = false;
    if sections.len() < min_heading_sections {
        match backend.extract_page_texts(path, None) {
            Ok(pages) => {
                let mut paragraphs = group_paragraphs(&pages, min_paragraph_chars);
                drop_empty_sections(&mut paragraphs);
                if !paragraphs.is_empty() {
                    debug!(
                        document,
                        heading_sections = sections.len(),
                        paragraph_sections = paragraphs.len(),
                        "using paragraph fallback"
                    );
                    sections = paragraphs;
                    paragraph_fallback = true;
                }
            }
            Err(error) => {
                warn!(document, error = %error, "page text unavailable; keeping heading sections");
            }
        }
    }

    for section in &mut sections {
        section.document = document.to_string();
    }

    Ok(DocumentSections {
        sections,
        strategy: detection.strategy,
        paragraph_fallback,
    })
}
