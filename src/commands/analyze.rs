use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{AnalyzeArgs, ExtractionArgs, RankingArgs};
use crate::model::{
    AnalysisMetadata, AnalysisOutput, AnalysisRequest, DocumentFailure, ExtractedSection,
    SubsectionAnalysis,
};
use crate::pipeline::PipelineConfig;
use crate::pipeline::analysis::{AnalysisResult, DocumentSource, analyze_documents};
use crate::pipeline::headings::HeadingClassifier;
use crate::pipeline::relevance::{RelevanceScorer, build_query, extract_keywords};
use crate::pipeline::spans::{PdfBackend, PopplerBackend};
use crate::semantic::{Embedder, LocalHashEmbedder, resolve_model_config};
use crate::util::{discover_pdfs, file_name_string, now_utc_string, read_json, write_json_pretty};

/// Conventional subdirectory holding a collection's PDFs next to its config.
const PDF_SUBDIRECTORY: &str = "PDFs";

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let input_dir = args
        .input_dir
        .clone()
        .unwrap_or_else(|| default_input_dir(&args.config));

    analyze_to_file(
        &args.config,
        &input_dir,
        &args.output,
        &args.extraction,
        &args.ranking,
    )
}

/// Shared by `analyze` and the `run` orchestrator.
pub fn analyze_to_file(
    config_path: &Path,
    input_dir: &Path,
    output_path: &Path,
    extraction: &ExtractionArgs,
    ranking: &RankingArgs,
) -> Result<()> {
    let backend = PopplerBackend::new(extraction.parse_timeout_ms)?;
    let classifier = HeadingClassifier::new(
        extraction.heading_strategy,
        extraction.max_headings,
        extraction.pattern_fallback_threshold,
    )?;

    let embedder = LocalHashEmbedder::new(resolve_model_config(&ranking.model_id));
    let model = embedder.config();
    info!(
        model_id = %model.model_id,
        model_name = %model.model_name,
        backend = %model.backend,
        dimensions = model.dimensions,
        "loaded embedding model"
    );
    let config = PipelineConfig::from(ranking);

    let request: AnalysisRequest = read_json(config_path)?;
    let output = analyze_request(&backend, &classifier, &embedder, &request, input_dir, &config)?;

    write_json_pretty(output_path, &output)?;
    info!(
        path = %output_path.display(),
        sections = output.extracted_sections.len(),
        subsections = output.subsection_analysis.len(),
        "wrote analysis"
    );
    Ok(())
}

pub fn default_input_dir(config_path: &Path) -> PathBuf {
    let base = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let pdfs = base.join(PDF_SUBDIRECTORY);
    if pdfs.is_dir() { pdfs } else { base }
}

pub fn analyze_request<B, E>(
    backend: &B,
    classifier: &HeadingClassifier,
    embedder: &E,
    request: &AnalysisRequest,
    input_dir: &Path,
    config: &PipelineConfig,
) -> Result<AnalysisOutput>
where
    B: PdfBackend + ?Sized,
    E: Embedder + ?Sized,
{
    let query = build_query(&request.persona, &request.job_to_be_done);
    let keywords = extract_keywords(&request.job_to_be_done.task);
    let scorer = RelevanceScorer::new(embedder, query, keywords, config.section_weights);
    info!(
        query = %scorer.query(),
        keywords = ?scorer.keywords(),
        "built persona query"
    );

    let (sources, mut failures) = resolve_documents(request, input_dir)?;
    let input_documents = sources
        .iter()
        .map(|source| source.name.clone())
        .chain(failures.iter().map(|failure| failure.document.clone()))
        .collect::<Vec<String>>();

    let result = analyze_documents(backend, classifier, &scorer, &sources, config);
    failures.extend(result.failures.iter().cloned());

    Ok(build_output(request, input_documents, result, failures))
}

/// Requested filenames resolved under `input_dir`; missing files become
/// failures and repeated filenames are read once. An empty request analyses
/// every PDF in `input_dir`.
fn resolve_documents(
    request: &AnalysisRequest,
    input_dir: &Path,
) -> Result<(Vec<DocumentSource>, Vec<DocumentFailure>)> {
    if request.documents.is_empty() {
        let sources = discover_pdfs(input_dir)?
            .into_iter()
            .map(|path| DocumentSource {
                name: file_name_string(&path),
                path,
            })
            .collect();
        return Ok((sources, Vec::new()));
    }

    let mut sources = Vec::new();
    let mut failures = Vec::new();
    let mut seen = HashSet::<&str>::new();
    for document in &request.documents {
        if !seen.insert(document.filename.as_str()) {
            warn!(document = %document.filename, "duplicate document in request; skipping");
            continue;
        }
        let path = input_dir.join(&document.filename);
        if path.is_file() {
            sources.push(DocumentSource {
                name: document.filename.clone(),
                path,
            });
        } else {
            warn!(document = %document.filename, path = %path.display(), "document not found");
            failures.push(DocumentFailure {
                document: document.filename.clone(),
                reason: format!("file not found: {}", path.display()),
            });
        }
    }
    Ok((sources, failures))
}

fn build_output(
    request: &AnalysisRequest,
    input_documents: Vec<String>,
    result: AnalysisResult,
    failed_documents: Vec<DocumentFailure>,
) -> AnalysisOutput {
    let extracted_sections = result
        .sections
        .into_iter()
        .map(|ranked| ExtractedSection {
            document: ranked.item.document,
            section_title: ranked.item.heading_text,
            importance_rank: ranked.importance_rank,
            page_number: ranked.item.page,
        })
        .collect();

    let subsection_analysis = result
        .subsections
        .into_iter()
        .map(|ranked| SubsectionAnalysis {
            document: ranked.item.document,
            refined_text: ranked.item.text,
            page_number: ranked.item.page,
        })
        .collect();

    AnalysisOutput {
        metadata: AnalysisMetadata {
            input_documents,
            selected_documents: result.selected_documents,
            persona: request.persona.role.clone(),
            job_to_be_done: request.job_to_be_done.task.clone(),
            processing_timestamp: now_utc_string(),
            failed_documents,
        },
        extracted_sections,
        subsection_analysis,
    }
}
