use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::cli::OutlineArgs;
use crate::model::{DocumentFailure, OutlineRunCounts, OutlineRunManifest, SourceHash};
use crate::pipeline::document::outline_document;
use crate::pipeline::headings::HeadingClassifier;
use crate::pipeline::spans::{PdfBackend, PopplerBackend};
use crate::util::{
    discover_pdfs, ensure_directory, file_name_string, now_utc_string, sha256_file,
    utc_compact_string, write_json_pretty,
};

const MANIFEST_VERSION: u32 = 1;
pub const RUN_MANIFEST_FILE: &str = "outline_run.json";

pub fn run(args: OutlineArgs) -> Result<()> {
    info!(
        input = %args.input.display(),
        strategy = args.extraction.heading_strategy.as_str(),
        max_headings = args.extraction.max_headings,
        "starting outline"
    );
    let backend = PopplerBackend::new(args.extraction.parse_timeout_ms)?;
    let classifier = HeadingClassifier::new(
        args.extraction.heading_strategy,
        args.extraction.max_headings,
        args.extraction.pattern_fallback_threshold,
    )?;

    let manifest = outline_inputs(
        &backend,
        &classifier,
        &args.input,
        &args.output_dir,
        args.prefer_metadata_title,
    )?;

    info!(
        pdf_count = manifest.counts.pdf_count,
        succeeded = manifest.counts.succeeded,
        failed = manifest.counts.failed,
        headings = manifest.counts.headings_total,
        "outline completed"
    );
    Ok(())
}

/// Writes `<stem>_outline.json` for every PDF under `input` plus a run manifest.
/// A failing document is recorded in the manifest and the batch continues.
pub fn outline_inputs<B: PdfBackend + ?Sized>(
    backend: &B,
    classifier: &HeadingClassifier,
    input: &Path,
    output_dir: &Path,
    prefer_metadata_title: bool,
) -> Result<OutlineRunManifest> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("outline-{}", utc_compact_string(started_ts));

    ensure_directory(output_dir)?;
    let pdf_paths = discover_pdfs(input)?;
    if pdf_paths.is_empty() {
        warn!(input = %input.display(), "no PDFs found");
    }
    info!(run_id = %run_id, pdf_count = pdf_paths.len(), "starting outline extraction");

    let mut counts = OutlineRunCounts {
        pdf_count: pdf_paths.len(),
        ..OutlineRunCounts::default()
    };
    let mut source_hashes = Vec::<SourceHash>::with_capacity(pdf_paths.len());
    let mut failures = Vec::<DocumentFailure>::new();

    for path in &pdf_paths {
        let filename = file_name_string(path);
        match outline_one(backend, classifier, path, output_dir, prefer_metadata_title) {
            Ok((sha256, headings)) => {
                counts.succeeded += 1;
                counts.headings_total += headings;
                source_hashes.push(SourceHash { filename, sha256 });
            }
            Err(err) => {
                error!(document = %filename, error = %err, "outline extraction failed");
                counts.failed += 1;
                failures.push(DocumentFailure {
                    document: filename,
                    reason: format!("{err:#}"),
                });
            }
        }
    }

    let manifest = OutlineRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        started_at,
        updated_at: now_utc_string(),
        input: input.display().to_string(),
        output_dir: output_dir.display().to_string(),
        counts,
        source_hashes,
        failures,
    };

    let manifest_path = output_dir.join(RUN_MANIFEST_FILE);
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote outline run manifest");

    Ok(manifest)
}

fn outline_one<B: PdfBackend + ?Sized>(
    backend: &B,
    classifier: &HeadingClassifier,
    path: &Path,
    output_dir: &Path,
    prefer_metadata_title: bool,
) -> Result<(String, usize)> {
    let sha256 = sha256_file(path)?;
    let outline = outline_document(backend, classifier, path, prefer_metadata_title)?;

    let output_path = outline_output_path(path, output_dir);
    write_json_pretty(&output_path, &outline)?;
    info!(
        path = %output_path.display(),
        headings = outline.total_headings,
        strategy = outline.heading_strategy.as_str(),
        "wrote outline"
    );

    Ok((sha256, outline.total_headings))
}

pub fn outline_output_path(pdf_path: &Path, output_dir: &Path) -> PathBuf {
    let stem = pdf_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name_string(pdf_path));
    output_dir.join(format!("{stem}_outline.json"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::cli::HeadingStrategy;
    use crate::error::ExtractionError;
    use crate::model::{PageText, TextSpan};

    struct StaticBackend;

    impl PdfBackend for StaticBackend {
        fn extract_spans(
            &self,
            path: &Path,
            _max_pages: Option<u32>,
        ) -> Result<Vec<TextSpan>, ExtractionError> {
            if file_name_string(path).starts_with("broken") {
                return Err(ExtractionError::Timeout {
                    tool: "pdftohtml",
                    timeout_ms: 30_000,
                });
            }
            Ok(vec![
                TextSpan::new("Annual Report", 22.0, "Helvetica-Bold", 1),
                TextSpan::new("Summary", 15.0, "Helvetica-Bold", 1),
                TextSpan::new("Revenue grew this year.", 10.0, "Helvetica", 1),
                TextSpan::new("Costs were flat.", 10.0, "Helvetica", 1),
                TextSpan::new("Outlook", 15.0, "Helvetica-Bold", 2),
                TextSpan::new("Growth is expected.", 10.0, "Helvetica", 2),
            ])
        }

        fn extract_page_texts(
            &self,
            _path: &Path,
            _max_pages: Option<u32>,
        ) -> Result<Vec<PageText>, ExtractionError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn batch_writes_outlines_and_records_failures() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("report.pdf"), b"%PDF-1.4 report").unwrap();
        fs::write(input.path().join("broken.pdf"), b"%PDF-1.4 broken").unwrap();
        fs::write(input.path().join("notes.txt"), b"not a pdf").unwrap();

        let classifier = HeadingClassifier::new(HeadingStrategy::Auto, 150, 1).unwrap();
        let manifest =
            outline_inputs(&StaticBackend, &classifier, input.path(), output.path(), false)
                .unwrap();

        assert_eq!(manifest.counts.pdf_count, 2);
        assert_eq!(manifest.counts.succeeded, 1);
        assert_eq!(manifest.counts.failed, 1);
        assert_eq!(manifest.counts.headings_total, 2);
        assert_eq!(manifest.failures[0].document, "broken.pdf");
        assert!(manifest.failures[0].reason.contains("parse budget"));
        assert_eq!(manifest.source_hashes.len(), 1);
        assert_eq!(manifest.source_hashes[0].sha256.len(), 64);

        let written: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(output.path().join("report_outline.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(written["title"], "Annual Report");
        assert_eq!(written["heading_strategy"], "font");
        assert_eq!(written["outline"][0]["level"], "H1");
        assert_eq!(written["outline"][1]["text"], "Outlook");
        assert_eq!(written["outline"][1]["page"], 2);

        assert!(!output.path().join("broken_outline.json").exists());
        assert!(output.path().join(RUN_MANIFEST_FILE).exists());
    }

    #[test]
    fn output_path_uses_file_stem() {
        let path = outline_output_path(Path::new("/in/file01.pdf"), Path::new("/out"));
        assert_eq!(path, PathBuf::from("/out/file01_outline.json"));
    }
}
