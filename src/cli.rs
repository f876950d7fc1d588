use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::pipeline::analysis::{
    DEFAULT_MAX_SECTIONS, DEFAULT_MAX_SUBSECTIONS, DEFAULT_REFINE_TOP_SECTIONS,
};
use crate::pipeline::chunking::DEFAULT_CHUNK_WORDS;
use crate::pipeline::headings::{DEFAULT_MAX_HEADINGS, DEFAULT_PATTERN_FALLBACK_THRESHOLD};
use crate::pipeline::prefilter::{
    DEFAULT_MAX_DOCUMENTS, DEFAULT_PREFILTER_PAGES, DEFAULT_PREFILTER_THRESHOLD,
};
use crate::pipeline::relevance::ScoreWeights;
use crate::pipeline::sections::{DEFAULT_MIN_HEADING_SECTIONS, DEFAULT_MIN_PARAGRAPH_CHARS};
use crate::semantic::DEFAULT_MODEL_ID;

#[derive(Parser, Debug)]
#[command(
    name = "docsense",
    version,
    about = "PDF outline extraction and persona-driven section ranking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract title and heading outline from PDFs.
    Outline(OutlineArgs),
    /// Rank sections of a document collection against a persona and task.
    Analyze(AnalyzeArgs),
    /// Process an input directory: `*1a*` folders get outlines, `config.json` gets analysis.
    Run(RunArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum HeadingStrategy {
    Auto,
    Font,
    Pattern,
}

impl HeadingStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Font => "font",
            Self::Pattern => "pattern",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExtractionArgs {
    #[arg(long, value_enum, default_value_t = HeadingStrategy::Auto)]
    pub heading_strategy: HeadingStrategy,

    #[arg(long, default_value_t = DEFAULT_MAX_HEADINGS)]
    pub max_headings: usize,

    #[arg(long, default_value_t = DEFAULT_PATTERN_FALLBACK_THRESHOLD)]
    pub pattern_fallback_threshold: usize,

    #[arg(long, default_value_t = 30_000)]
    pub parse_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct OutlineArgs {
    /// A PDF file or a directory of PDFs.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub prefer_metadata_title: bool,

    #[command(flatten)]
    pub extraction: ExtractionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RankingArgs {
    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    #[arg(long, default_value_t = false)]
    pub no_prefilter: bool,

    #[arg(long, default_value_t = DEFAULT_PREFILTER_PAGES)]
    pub prefilter_pages: u32,

    #[arg(long, default_value_t = DEFAULT_PREFILTER_THRESHOLD)]
    pub prefilter_threshold: f64,

    #[arg(long, default_value_t = DEFAULT_MAX_DOCUMENTS)]
    pub max_documents: usize,

    #[arg(long, default_value_t = ScoreWeights::DOCUMENT.semantic)]
    pub document_semantic_weight: f64,

    #[arg(long, default_value_t = ScoreWeights::DOCUMENT.keyword)]
    pub document_keyword_weight: f64,

    #[arg(long, default_value_t = ScoreWeights::SECTION.semantic)]
    pub section_semantic_weight: f64,

    #[arg(long, default_value_t = ScoreWeights::SECTION.keyword)]
    pub section_keyword_weight: f64,

    #[arg(long, default_value_t = DEFAULT_MAX_SECTIONS)]
    pub max_sections: usize,

    #[arg(long, default_value_t = DEFAULT_REFINE_TOP_SECTIONS)]
    pub refine_top_sections: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_SUBSECTIONS)]
    pub max_subsections: usize,

    #[arg(long, default_value_t = DEFAULT_CHUNK_WORDS)]
    pub chunk_words: usize,

    #[arg(long, default_value_t = DEFAULT_MIN_HEADING_SECTIONS)]
    pub min_heading_sections: usize,

    #[arg(long, default_value_t = DEFAULT_MIN_PARAGRAPH_CHARS)]
    pub min_paragraph_chars: usize,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Round 1B request: documents, persona and job to be done.
    #[arg(long)]
    pub config: PathBuf,

    /// Directory the request's document filenames are resolved against.
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    #[arg(long, default_value = "output/intelligence_analysis.json")]
    pub output: PathBuf,

    #[command(flatten)]
    pub extraction: ExtractionArgs,

    #[command(flatten)]
    pub ranking: RankingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = "/app/input")]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "/app/output")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub prefer_metadata_title: bool,

    #[command(flatten)]
    pub extraction: ExtractionArgs,

    #[command(flatten)]
    pub ranking: RankingArgs,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::pipeline::PipelineConfig;

    #[test]
    fn default_ranking_args_match_pipeline_defaults() {
        let cli = Cli::try_parse_from(["docsense", "analyze", "--config", "challenge.json"])
            .expect("parse");
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };

        assert_eq!(PipelineConfig::from(&args.ranking), PipelineConfig::default());
    }

    #[test]
    fn ranking_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "docsense",
            "analyze",
            "--config",
            "challenge.json",
            "--no-prefilter",
            "--max-sections",
            "3",
            "--section-keyword-weight",
            "1.0",
        ])
        .expect("parse");
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };

        let config = PipelineConfig::from(&args.ranking);
        assert!(!config.prefilter_enabled);
        assert_eq!(config.max_sections, 3);
        assert_eq!(config.section_weights.keyword, 1.0);
        assert_eq!(config.section_weights.semantic, ScoreWeights::SECTION.semantic);
    }
}
