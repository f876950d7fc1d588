use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub font_size: f32,
    pub font_name: String,
    pub page: u32,
}

impl TextSpan {
    pub fn new(
        text: impl Into<String>,
        font_size: f32,
        font_name: impl Into<String>,
        page: u32,
    ) -> Self {
        Self {
            text: text.into(),
            font_size,
            font_name: font_name.into(),
            page,
        }
    }
}

/// Raw text of one page, line structure preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleProfile {
    pub body_size: f32,
    pub body_font: String,
}

/// Heading depth, `HeadingLevel(1)` is H1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeadingLevel(pub u8);

impl HeadingLevel {
    pub const H1: Self = Self(1);
    pub const H2: Self = Self(2);
    pub const H3: Self = Self(3);

    pub fn from_rank(rank: usize) -> Self {
        Self(u8::try_from(rank + 1).unwrap_or(u8::MAX))
    }
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}", self.0)
    }
}

impl Serialize for HeadingLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadingCandidate {
    pub text: String,
    pub level: HeadingLevel,
    pub page: u32,
    pub font_size: f32,
    /// Position of the source span in the document's span sequence.
    pub span_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingStrategyKind {
    Font,
    Pattern,
}

impl HeadingStrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Font => "font",
            Self::Pattern => "pattern",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadingDetection {
    pub strategy: HeadingStrategyKind,
    pub title: Option<HeadingCandidate>,
    pub headings: Vec<HeadingCandidate>,
}

impl HeadingDetection {
    pub fn empty(strategy: HeadingStrategyKind) -> Self {
        Self {
            strategy,
            title: None,
            headings: Vec::new(),
        }
    }

    pub fn title_text(&self) -> &str {
        self.title
            .as_ref()
            .map(|title| title.text.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub heading_text: String,
    pub content: String,
    pub page: u32,
    pub document: String,
}

// Round 1A output.

#[derive(Debug, Clone, Serialize)]
pub struct OutlineEntry {
    pub level: HeadingLevel,
    pub text: String,
    pub page: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutline {
    pub title: String,
    pub outline: Vec<OutlineEntry>,
    pub heading_strategy: HeadingStrategyKind,
    pub total_headings: usize,
    pub extraction_timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceHash {
    pub filename: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentFailure {
    pub document: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OutlineRunCounts {
    pub pdf_count: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub headings_total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlineRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub updated_at: String,
    pub input: String,
    pub output_dir: String,
    pub counts: OutlineRunCounts,
    pub source_hashes: Vec<SourceHash>,
    pub failures: Vec<DocumentFailure>,
}

// Round 1B input.

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub documents: Vec<RequestedDocument>,
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub job_to_be_done: JobToBeDone,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestedDocument {
    pub filename: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobToBeDone {
    #[serde(default)]
    pub task: String,
}

// Round 1B output.

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    pub input_documents: Vec<String>,
    pub selected_documents: Vec<String>,
    pub persona: String,
    pub job_to_be_done: String,
    pub processing_timestamp: String,
    pub failed_documents: Vec<DocumentFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedSection {
    pub document: String,
    pub section_title: String,
    pub importance_rank: usize,
    pub page_number: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubsectionAnalysis {
    pub document: String,
    pub refined_text: String,
    pub page_number: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    pub metadata: AnalysisMetadata,
    pub extracted_sections: Vec<ExtractedSection>,
    pub subsection_analysis: Vec<SubsectionAnalysis>,
}
