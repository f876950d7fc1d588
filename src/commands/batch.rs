use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::pipeline::headings::HeadingClassifier;
use crate::pipeline::spans::PopplerBackend;
use crate::util::{ensure_directory, file_name_string};

use super::analyze::{analyze_to_file, default_input_dir};
use super::outline::outline_inputs;

pub const ANALYSIS_CONFIG_FILE: &str = "config.json";
pub const ANALYSIS_OUTPUT_FILE: &str = "intelligence_analysis.json";
const OUTLINE_FOLDER_MARKER: &str = "1a";

/// Runs outline extraction on every `*1a*` folder and analysis on
/// `config.json`, each job isolated from the others' failures.
pub fn run(args: RunArgs) -> Result<()> {
    ensure_directory(&args.output_dir)?;
    info!(
        input = %args.input_dir.display(),
        output = %args.output_dir.display(),
        "starting batch run"
    );

    let outline_folders = outline_folders(&args.input_dir)?;
    if !outline_folders.is_empty() {
        let backend = PopplerBackend::new(args.extraction.parse_timeout_ms)?;
        let classifier = HeadingClassifier::new(
            args.extraction.heading_strategy,
            args.extraction.max_headings,
            args.extraction.pattern_fallback_threshold,
        )?;

        for folder in &outline_folders {
            let output_dir = args.output_dir.join(file_name_string(folder));
            match outline_inputs(
                &backend,
                &classifier,
                folder,
                &output_dir,
                args.prefer_metadata_title,
            ) {
                Ok(manifest) => info!(
                    folder = %folder.display(),
                    succeeded = manifest.counts.succeeded,
                    failed = manifest.counts.failed,
                    "outline folder complete"
                ),
                Err(err) => error!(
                    folder = %folder.display(),
                    error = %format!("{err:#}"),
                    "outline folder failed"
                ),
            }
        }
    }

    let config_path = args.input_dir.join(ANALYSIS_CONFIG_FILE);
    if config_path.is_file() {
        let output_path = args.output_dir.join(ANALYSIS_OUTPUT_FILE);
        if let Err(err) = analyze_to_file(
            &config_path,
            &default_input_dir(&config_path),
            &output_path,
            &args.extraction,
            &args.ranking,
        ) {
            error!(
                config = %config_path.display(),
                error = %format!("{err:#}"),
                "analysis failed"
            );
        }
    } else {
        info!(config = %config_path.display(), "no analysis config; skipping analysis");
    }

    info!("batch run complete");
    Ok(())
}

/// Immediate subdirectories whose name contains `1a`, case-insensitively.
pub fn outline_folders(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to read {}", input_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if file_name_string(&path)
            .to_lowercase()
            .contains(OUTLINE_FOLDER_MARKER)
        {
            folders.push(path);
        }
    }

    folders.sort();
    Ok(folders)
}
