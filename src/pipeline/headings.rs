use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::cli::HeadingStrategy;
use crate::model::{
    HeadingCandidate, HeadingDetection, HeadingLevel, HeadingStrategyKind, StyleProfile, TextSpan,
};

use super::style::profile_body_style;

pub const DEFAULT_MAX_HEADINGS: usize = 150;
pub const DEFAULT_PATTERN_FALLBACK_THRESHOLD: usize = 3;

const MAX_HEADING_WORDS: usize = 20;
const MIN_PATTERN_LINE_CHARS: usize = 4;
const MAX_PATTERN_LINE_CHARS: usize = 200;
const MAX_ALL_CAPS_WORDS: usize = 7;
const MAX_TITLE_CASE_WORDS: usize = 10;

pub fn is_bold(font_name: &str) -> bool {
    let lowered = font_name.to_ascii_lowercase();
    ["bold", "black", "heavy"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Font-contrast heading rule: larger than body text, bold or unpunctuated, and short.
pub fn is_heading_candidate(span: &TextSpan, profile: &StyleProfile) -> bool {
    let text = span.text.trim();
    if text.is_empty() {
        return false;
    }

    span.font_size > profile.body_size
        && (is_bold(&span.font_name) || !text.ends_with('.'))
        && word_count(text) < MAX_HEADING_WORDS
}

/// One way of turning a document's spans into a title and heading list.
pub trait HeadingDetector {
    fn kind(&self) -> HeadingStrategyKind;

    fn detect_headings(
        &self,
        spans: &[TextSpan],
        profile: Option<&StyleProfile>,
    ) -> HeadingDetection;
}

pub struct FontHeuristicDetector {
    max_headings: usize,
}

impl FontHeuristicDetector {
    pub fn new(max_headings: usize) -> Self {
        Self { max_headings }
    }
}

impl HeadingDetector for FontHeuristicDetector {
    fn kind(&self) -> HeadingStrategyKind {
        HeadingStrategyKind::Font
    }

    fn detect_headings(
        &self,
        spans: &[TextSpan],
        profile: Option<&StyleProfile>,
    ) -> HeadingDetection {
        let Some(profile) = profile else {
            return HeadingDetection::empty(self.kind());
        };

        let candidates = spans
            .iter()
            .enumerate()
            .filter(|(_, span)| is_heading_candidate(span, profile))
            .map(|(span_index, span)| HeadingCandidate {
                text: span.text.trim().to_string(),
                level: HeadingLevel::H1,
                page: span.page,
                font_size: span.font_size,
                span_index,
            })
            .collect::<Vec<HeadingCandidate>>();

        let (title, mut headings) = select_title_and_cap(candidates, self.max_headings);
        assign_levels_by_font_size(&mut headings);

        HeadingDetection {
            strategy: self.kind(),
            title,
            headings,
        }
    }
}

/// Numbering and casing rules, independent of font metrics.
pub struct PatternDetector {
    max_headings: usize,
    h1_numbered: Regex,
    h2_numbered: Regex,
    h3_numbered: Regex,
}

impl PatternDetector {
    pub fn new(max_headings: usize) -> Result<Self> {
        Ok(Self {
            max_headings,
            h1_numbered: Regex::new(r"^\d+\.\s").context("failed to compile H1 pattern")?,
            h2_numbered: Regex::new(r"^\d+\.\d+\.?\s").context("failed to compile H2 pattern")?,
            h3_numbered: Regex::new(r"^\d+\.\d+\.\d+\.?\s")
                .context("failed to compile H3 pattern")?,
        })
    }

    pub fn pattern_level(&self, text: &str) -> Option<HeadingLevel> {
        let text = text.trim();
        let char_count = text.chars().count();
        if !(MIN_PATTERN_LINE_CHARS..=MAX_PATTERN_LINE_CHARS).contains(&char_count) {
            return None;
        }

        if self.h1_numbered.is_match(text) {
            return Some(HeadingLevel::H1);
        }
        if self.h2_numbered.is_match(text) {
            return Some(HeadingLevel::H2);
        }
        if self.h3_numbered.is_match(text) {
            return Some(HeadingLevel::H3);
        }

        let words = word_count(text);
        if is_all_caps(text) && words < MAX_ALL_CAPS_WORDS {
            return Some(HeadingLevel::H1);
        }
        if is_title_case(text) && words < MAX_TITLE_CASE_WORDS && !text.ends_with('.') {
            return Some(HeadingLevel::H2);
        }

        None
    }
}

impl HeadingDetector for PatternDetector {
    fn kind(&self) -> HeadingStrategyKind {
        HeadingStrategyKind::Pattern
    }

    fn detect_headings(
        &self,
        spans: &[TextSpan],
        profile: Option<&StyleProfile>,
    ) -> HeadingDetection {
        let mut candidates = Vec::<HeadingCandidate>::new();
        let mut title_candidates = Vec::<HeadingCandidate>::new();
        for (span_index, span) in spans.iter().enumerate() {
            let text = span.text.trim();
            let candidate = |level| HeadingCandidate {
                text: text.to_string(),
                level,
                page: span.page,
                font_size: span.font_size,
                span_index,
            };

            match self.pattern_level(text) {
                Some(level) => candidates.push(candidate(level)),
                None => {
                    let above_body = profile
                        .map(|profile| span.font_size > profile.body_size)
                        .unwrap_or(false);
                    if span.page == 1 && above_body && !text.is_empty() {
                        title_candidates.push(candidate(HeadingLevel::H1));
                    }
                }
            }
        }

        // Numbered and cased lines stay in the outline; the title comes from
        // the remaining larger-than-body text on page 1.
        let title = largest_first_page_index(&title_candidates)
            .map(|index| title_candidates.swap_remove(index));
        let mut headings = dedup_headings(candidates);
        headings.truncate(self.max_headings);

        HeadingDetection {
            strategy: self.kind(),
            title,
            headings,
        }
    }
}

/// Picks one detector per document according to the configured strategy.
pub struct HeadingClassifier {
    strategy: HeadingStrategy,
    pattern_fallback_threshold: usize,
    font: FontHeuristicDetector,
    pattern: PatternDetector,
}

impl HeadingClassifier {
    pub fn new(
        strategy: HeadingStrategy,
        max_headings: usize,
        pattern_fallback_threshold: usize,
    ) -> Result<Self> {
        Ok(Self {
            strategy,
            pattern_fallback_threshold,
            font: FontHeuristicDetector::new(max_headings),
            pattern: PatternDetector::new(max_headings)?,
        })
    }

    pub fn classify(&self, spans: &[TextSpan]) -> HeadingDetection {
        let profile = profile_body_style(spans);
        if profile.is_none() {
            let kind = match self.strategy {
                HeadingStrategy::Pattern => HeadingStrategyKind::Pattern,
                HeadingStrategy::Auto | HeadingStrategy::Font => HeadingStrategyKind::Font,
            };
            return HeadingDetection::empty(kind);
        }
        let profile = profile.as_ref();
        if let Some(style) = profile {
            debug!(
                body_size = style.body_size,
                body_font = %style.body_font,
                strategy = self.strategy.as_str(),
                "profiled body style"
            );
        }

        match self.strategy {
            HeadingStrategy::Font => self.font.detect_headings(spans, profile),
            HeadingStrategy::Pattern => self.pattern.detect_headings(spans, profile),
            HeadingStrategy::Auto => {
                let by_font = self.font.detect_headings(spans, profile);
                if by_font.headings.len() >= self.pattern_fallback_threshold {
                    return by_font;
                }

                let by_pattern = self.pattern.detect_headings(spans, profile);
                if by_pattern.headings.len() > by_font.headings.len() {
                    debug!(
                        font_headings = by_font.headings.len(),
                        pattern_headings = by_pattern.headings.len(),
                        "switching to pattern heading detection"
                    );
                    by_pattern
                } else {
                    by_font
                }
            }
        }
    }
}

/// Dedups on `(text, page)`, removes the title (largest page-1 candidate, first
/// wins ties) and caps the rest, keeping first-encountered entries.
fn select_title_and_cap(
    candidates: Vec<HeadingCandidate>,
    max_headings: usize,
) -> (Option<HeadingCandidate>, Vec<HeadingCandidate>) {
    let mut headings = dedup_headings(candidates);
    let title = largest_first_page_index(&headings).map(|index| headings.remove(index));
    headings.truncate(max_headings);
    (title, headings)
}

fn dedup_headings(candidates: Vec<HeadingCandidate>) -> Vec<HeadingCandidate> {
    let mut seen = HashSet::<(String, u32)>::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert((candidate.text.clone(), candidate.page)))
        .collect()
}

/// Index of the largest page-1 candidate; the first one wins ties.
fn largest_first_page_index(candidates: &[HeadingCandidate]) -> Option<usize> {
    let mut title_index = None::<usize>;
    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.page != 1 {
            continue;
        }
        let larger = title_index
            .map(|current| candidate.font_size > candidates[current].font_size)
            .unwrap_or(true);
        if larger {
            title_index = Some(index);
        }
    }
    title_index
}

/// Largest distinct size maps to H1, the next to H2, and so on.
fn assign_levels_by_font_size(headings: &mut [HeadingCandidate]) {
    let mut sizes = headings
        .iter()
        .map(|heading| heading.font_size)
        .collect::<Vec<f32>>();
    sizes.sort_by(|left, right| right.total_cmp(left));
    sizes.dedup();

    for heading in headings.iter_mut() {
        let rank = sizes
            .iter()
            .position(|size| *size == heading.font_size)
            .unwrap_or(0);
        heading.level = HeadingLevel::from_rank(rank);
    }
}

fn is_all_caps(text: &str) -> bool {
    let mut cased_seen = false;
    for character in text.chars() {
        if character.is_lowercase() {
            return false;
        }
        if character.is_uppercase() {
            cased_seen = true;
        }
    }
    cased_seen
}

/// Every cased run starts with one uppercase letter followed by lowercase letters.
fn is_title_case(text: &str) -> bool {
    let mut cased_seen = false;
    let mut previous_cased = false;

    for character in text.chars() {
        if character.is_uppercase() {
            if previous_cased {
                return false;
            }
            previous_cased = true;
            cased_seen = true;
        } else if character.is_lowercase() {
            if !previous_cased {
                return false;
            }
            previous_cased = true;
            cased_seen = true;
        } else {
            previous_cased = false;
        }
    }

    cased_seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> StyleProfile {
        StyleProfile {
            body_size: 11.0,
            body_font: "Times".to_string(),
        }
    }

    fn span(text: &str, size: f32, font: &str, page: u32) -> TextSpan {
        TextSpan::new(text, size, font, page)
    }

    fn detect_by_font(spans: &[TextSpan]) -> HeadingDetection {
        let profile = profile_body_style(spans);
        FontHeuristicDetector::new(DEFAULT_MAX_HEADINGS).detect_headings(spans, profile.as_ref())
    }

    #[test]
    fn predicate_requires_larger_font() {
        let profile = body();
        assert!(is_heading_candidate(&span("Overview", 14.0, "Times", 1), &profile));
        assert!(!is_heading_candidate(&span("Overview", 11.0, "Times-Bold", 1), &profile));
    }

    #[test]
    fn predicate_allows_trailing_period_only_when_bold() {
        let profile = body();
        assert!(!is_heading_candidate(&span("A sentence.", 14.0, "Times", 1), &profile));
        assert!(is_heading_candidate(&span("A sentence.", 14.0, "Times-Bold", 1), &profile));
    }

    #[test]
    fn predicate_rejects_long_spans() {
        let long = vec!["word"; 20].join(" ");
        assert!(!is_heading_candidate(&span(&long, 14.0, "Arial,Bold", 1), &body()));
    }

    #[test]
    fn font_detector_yields_nothing_without_profile() {
        let detector = FontHeuristicDetector::new(DEFAULT_MAX_HEADINGS);
        let detection = detector.detect_headings(&[span("Big", 30.0, "X", 1)], None);
        assert!(detection.title.is_none());
        assert!(detection.headings.is_empty());
    }

    #[test]
    fn title_is_largest_page_one_candidate_and_removed() {
        let spans = vec![
            span("Small Heading", 14.0, "Arial", 1),
            span("Document Title", 24.0, "Arial", 1),
            span("Body text here.", 11.0, "Times", 1),
            span("Body text again.", 11.0, "Times", 1),
            span("Chapter One", 30.0, "Arial", 2),
            span("Body text there.", 11.0, "Times", 2),
        ];
        let detection = detect_by_font(&spans);

        assert_eq!(detection.title_text(), "Document Title");
        assert!(
            detection
                .headings
                .iter()
                .all(|heading| heading.text != "Document Title")
        );
        assert_eq!(detection.headings.len(), 2);
    }

    #[test]
    fn title_ties_go_to_first_candidate() {
        let spans = vec![
            span("First Banner", 20.0, "Arial", 1),
            span("Second Banner", 20.0, "Arial", 1),
            span("body", 10.0, "Times", 1),
            span("body", 10.0, "Times", 1),
            span("body", 10.0, "Times", 1),
        ];
        let detection = detect_by_font(&spans);

        assert_eq!(detection.title_text(), "First Banner");
        assert_eq!(detection.headings[0].text, "Second Banner");
    }

    #[test]
    fn missing_page_one_candidates_leave_title_empty() {
        let spans = vec![
            span("plain", 10.0, "Times", 1),
            span("plain", 10.0, "Times", 2),
            span("Later Heading", 16.0, "Times", 2),
        ];
        let detection = detect_by_font(&spans);

        assert_eq!(detection.title_text(), "");
        assert_eq!(detection.headings.len(), 1);
    }

    #[test]
    fn levels_follow_distinct_sizes_descending() {
        let spans = vec![
            span("Title", 28.0, "Arial", 1),
            span("Part A", 20.0, "Arial", 2),
            span("Detail A1", 14.0, "Arial", 2),
            span("body", 10.0, "Times", 2),
            span("body", 10.0, "Times", 2),
            span("Part B", 20.0, "Arial", 3),
            span("Sub B", 16.0, "Arial", 3),
            span("body", 10.0, "Times", 3),
            span("body", 10.0, "Times", 3),
        ];
        let detection = detect_by_font(&spans);

        let levels = detection
            .headings
            .iter()
            .map(|heading| (heading.text.as_str(), heading.level.to_string()))
            .collect::<Vec<(&str, String)>>();
        assert_eq!(
            levels,
            vec![
                ("Part A", "H1".to_string()),
                ("Detail A1", "H3".to_string()),
                ("Part B", "H1".to_string()),
                ("Sub B", "H2".to_string()),
            ]
        );

        for left in &detection.headings {
            for right in &detection.headings {
                if left.font_size > right.font_size {
                    assert!(left.level <= right.level);
                }
            }
        }
    }

    #[test]
    fn duplicates_collapse_and_cap_keeps_first() {
        let mut spans = vec![
            span("body", 10.0, "Times", 1),
            span("body", 10.0, "Times", 1),
            span("body", 10.0, "Times", 1),
        ];
        for index in 0..6 {
            spans.push(span(&format!("Heading {index}"), 14.0, "Arial", 2));
            spans.push(span(&format!("Heading {index}"), 14.0, "Arial", 2));
            spans.push(span("body", 10.0, "Times", 2));
            spans.push(span("body", 10.0, "Times", 2));
        }
        let profile = profile_body_style(&spans);
        let detection = FontHeuristicDetector::new(4).detect_headings(&spans, profile.as_ref());

        let texts = detection
            .headings
            .iter()
            .map(|heading| heading.text.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(texts, vec!["Heading 0", "Heading 1", "Heading 2", "Heading 3"]);
    }

    #[test]
    fn pattern_levels_follow_numbering_and_casing() {
        let detector = PatternDetector::new(DEFAULT_MAX_HEADINGS).expect("detector");

        assert_eq!(detector.pattern_level("1. Introduction"), Some(HeadingLevel::H1));
        assert_eq!(detector.pattern_level("2.3 Background"), Some(HeadingLevel::H2));
        assert_eq!(detector.pattern_level("2.3. Background"), Some(HeadingLevel::H2));
        assert_eq!(detector.pattern_level("4.1.2 Details"), Some(HeadingLevel::H3));
        assert_eq!(detector.pattern_level("EXECUTIVE SUMMARY"), Some(HeadingLevel::H1));
        assert_eq!(detector.pattern_level("Market Analysis"), Some(HeadingLevel::H2));
        assert_eq!(detector.pattern_level("Market Analysis."), None);
        assert_eq!(detector.pattern_level("this is body text"), None);
        assert_eq!(detector.pattern_level("ABC"), None);
    }

    #[test]
    fn casing_helpers_match_expected_rules() {
        assert!(is_all_caps("PART 2: SCOPE"));
        assert!(!is_all_caps("1234"));
        assert!(is_title_case("Risk Register 2024"));
        assert!(!is_title_case("Risk register"));
        assert!(!is_title_case("ROADMAP"));
    }

    #[test]
    fn auto_strategy_falls_back_to_patterns_for_flat_documents() {
        let spans = vec![
            span("1. Scope", 11.0, "Times", 1),
            span("The scope covers every unit.", 11.0, "Times", 1),
            span("2. Terms", 11.0, "Times", 1),
            span("Terms are defined below.", 11.0, "Times", 1),
            span("2.1 Units", 11.0, "Times", 2),
            span("Units are metric.", 11.0, "Times", 2),
        ];

        let classifier = HeadingClassifier::new(
            HeadingStrategy::Auto,
            DEFAULT_MAX_HEADINGS,
            DEFAULT_PATTERN_FALLBACK_THRESHOLD,
        )
        .expect("classifier");
        let detection = classifier.classify(&spans);

        assert_eq!(detection.strategy, HeadingStrategyKind::Pattern);
        assert_eq!(detection.title_text(), "");
        let texts = detection
            .headings
            .iter()
            .map(|heading| (heading.text.as_str(), heading.level))
            .collect::<Vec<(&str, HeadingLevel)>>();
        assert_eq!(
            texts,
            vec![
                ("1. Scope", HeadingLevel::H1),
                ("2. Terms", HeadingLevel::H1),
                ("2.1 Units", HeadingLevel::H2),
            ]
        );
    }

    #[test]
    fn pattern_title_never_consumes_a_numbered_heading() {
        let spans = vec![
            span("Budget handbook 2024", 20.0, "Arial-Bold", 1),
            span("1. Scope", 12.0, "Arial-Bold", 1),
            span("The scope covers every budget unit.", 11.0, "Times", 1),
            span("2. Terms", 12.0, "Arial-Bold", 1),
            span("Terms are defined below.", 11.0, "Times", 1),
            span("2.1 Units", 11.0, "Times", 2),
            span("Units are metric.", 11.0, "Times", 2),
        ];

        let classifier = HeadingClassifier::new(HeadingStrategy::Pattern, DEFAULT_MAX_HEADINGS, 3)
            .expect("classifier");
        let detection = classifier.classify(&spans);

        assert_eq!(detection.strategy, HeadingStrategyKind::Pattern);
        assert_eq!(detection.title_text(), "Budget handbook 2024");
        let texts = detection
            .headings
            .iter()
            .map(|heading| heading.text.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(texts, vec!["1. Scope", "2. Terms", "2.1 Units"]);
        assert_eq!(detection.headings[0].span_index, 1);
    }

    #[test]
    fn empty_document_reports_configured_pattern_strategy() {
        let classifier = HeadingClassifier::new(HeadingStrategy::Pattern, DEFAULT_MAX_HEADINGS, 3)
            .expect("classifier");
        let detection = classifier.classify(&[]);
        assert_eq!(detection.strategy, HeadingStrategyKind::Pattern);
        assert!(detection.headings.is_empty());
    }

    #[test]
    fn empty_document_classifies_to_nothing() {
        let classifier = HeadingClassifier::new(HeadingStrategy::Auto, DEFAULT_MAX_HEADINGS, 3)
            .expect("classifier");
        let detection = classifier.classify(&[]);
        assert!(detection.title.is_none());
        assert!(detection.headings.is_empty());
    }
}
