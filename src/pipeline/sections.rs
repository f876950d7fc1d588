use std::collections::HashMap;

use crate::model::{HeadingCandidate, PageText, Section, TextSpan};
use crate::semantic::normalize_whitespace;

use super::headings::word_count;

pub const DEFAULT_MIN_PARAGRAPH_CHARS: usize = 50;
pub const DEFAULT_MIN_HEADING_SECTIONS: usize = 2;

const MAX_INFERRED_TITLE_WORDS: usize = 12;
const FALLBACK_TITLE_WORDS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedSections {
    pub sections: Vec<Section>,
    /// Text of spans that precede the first heading.
    pub preamble: Vec<String>,
}

/// Splits the span stream at heading positions. Headings are matched by span
/// index, never by re-matching text.
pub fn group_sections(spans: &[TextSpan], headings: &[HeadingCandidate]) -> GroupedSections {
    let heading_at = headings
        .iter()
        .map(|heading| (heading.span_index, heading))
        .collect::<HashMap<usize, &HeadingCandidate>>();

    let mut grouped = GroupedSections::default();
    let mut open: Option<(Section, Vec<&str>)> = None;

    for (index, span) in spans.iter().enumerate() {
        if let Some(heading) = heading_at.get(&index) {
            if let Some(section) = close_section(open.take()) {
                grouped.sections.push(section);
            }
            open = Some((
                Section {
                    heading_text: heading.text.clone(),
                    content: String::new(),
                    page: heading.page,
                    document: String::new(),
                },
                Vec::new(),
            ));
            continue;
        }

        match open.as_mut() {
            Some((_, parts)) => parts.push(span.text.as_str()),
            None => grouped.preamble.push(span.text.clone()),
        }
    }

    if let Some(section) = close_section(open) {
        grouped.sections.push(section);
    }

    grouped
}

fn close_section(open: Option<(Section, Vec<&str>)>) -> Option<Section> {
    let (mut section, parts) = open?;
    section.content = normalize_whitespace(&parts.join(" "));
    Some(section)
}

/// Paragraph fallback for documents whose headings are too sparse to group on.
///
/// Paragraphs are blank-line separated blocks with at least `min_chars`
/// characters. The title is the preceding non-empty line when it is short,
/// otherwise the paragraph's opening words.
pub fn group_paragraphs(pages: &[PageText], min_chars: usize) -> Vec<Section> {
    let mut sections = Vec::<Section>::new();

    for page in pages {
        let mut previous_line = None::<String>;
        let mut block = Vec::<&str>::new();

        for line in page.text.lines().chain(std::iter::once("")) {
            if !line.trim().is_empty() {
                block.push(line.trim());
                continue;
            }

            if block.is_empty() {
                continue;
            }

            let paragraph = normalize_whitespace(&block.join(" "));
            if paragraph.chars().count() >= min_chars {
                sections.push(Section {
                    heading_text: infer_paragraph_title(previous_line.as_deref(), &paragraph),
                    content: paragraph,
                    page: page.page,
                    document: String::new(),
                });
            }

            previous_line = block.last().map(|value| normalize_whitespace(value));
            block.clear();
        }
    }

    sections
}

fn infer_paragraph_title(previous_line: Option<&str>, paragraph: &str) -> String {
    if let Some(line) = previous_line {
        let line = line.trim();
        if !line.is_empty()
            && word_count(line) <= MAX_INFERRED_TITLE_WORDS
            && !line.ends_with('.')
        {
            return line.to_string();
        }
    }

    paragraph
        .split_whitespace()
        .take(FALLBACK_TITLE_WORDS)
        .collect::<Vec<&str>>()
        .join(" ")
}

pub fn drop_empty_sections(sections: &mut Vec<Section>) {
    sections.retain(|section| !section.content.trim().is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HeadingLevel;

    fn span(text: &str, page: u32) -> TextSpan {
        TextSpan::new(text, 11.0, "Times", page)
    }

    fn heading(text: &str, page: u32, span_index: usize) -> HeadingCandidate {
        HeadingCandidate {
            text: text.to_string(),
            level: HeadingLevel::H1,
            page,
            font_size: 16.0,
            span_index,
        }
    }

    #[test]
    fn sections_collect_text_until_next_heading() {
        let spans = vec![
            span("Cover page text", 1),
            span("Introduction", 1),
            span("First line.", 1),
            span("Second line.", 2),
            span("Methods", 2),
            span("Method body.", 2),
        ];
        let headings = vec![heading("Introduction", 1, 1), heading("Methods", 2, 4)];

        let grouped = group_sections(&spans, &headings);
        assert_eq!(grouped.preamble, vec!["Cover page text".to_string()]);
        assert_eq!(grouped.sections.len(), 2);
        assert_eq!(grouped.sections[0].heading_text, "Introduction");
        assert_eq!(grouped.sections[0].content, "First line. Second line.");
        assert_eq!(grouped.sections[0].page, 1);
        assert_eq!(grouped.sections[1].content, "Method body.");
        assert_eq!(grouped.sections[1].page, 2);
    }

    #[test]
    fn heading_identity_is_positional() {
        let spans = vec![
            span("Summary", 1),
            span("Summary", 1),
            span("Closing words.", 1),
        ];
        let headings = vec![heading("Summary", 1, 1)];

        let grouped = group_sections(&spans, &headings);
        assert_eq!(grouped.preamble, vec!["Summary".to_string()]);
        assert_eq!(grouped.sections.len(), 1);
        assert_eq!(grouped.sections[0].content, "Closing words.");
    }

    #[test]
    fn no_headings_yields_no_sections() {
        let spans = vec![span("Just text.", 1), span("More text.", 1)];
        let grouped = group_sections(&spans, &[]);
        assert!(grouped.sections.is_empty());
        assert_eq!(grouped.preamble.len(), 2);
    }

    #[test]
    fn grouping_reattributes_every_span() {
        let spans = vec![
            span("lead", 1),
            span("Alpha", 1),
            span("a1", 1),
            span("a2", 1),
            span("Beta", 2),
            span("Gamma", 2),
            span("g1", 3),
        ];
        let headings = vec![
            heading("Alpha", 1, 1),
            heading("Beta", 2, 4),
            heading("Gamma", 2, 5),
        ];

        let grouped = group_sections(&spans, &headings);
        let mut rebuilt = grouped.preamble.clone();
        for section in &grouped.sections {
            rebuilt.push(section.heading_text.clone());
            if !section.content.is_empty() {
                rebuilt.push(section.content.clone());
            }
        }

        let original = spans
            .iter()
            .map(|span| span.text.as_str())
            .collect::<Vec<&str>>()
            .join(" ");
        assert_eq!(rebuilt.join(" "), original);

        let mut sections = grouped.sections;
        drop_empty_sections(&mut sections);
        let names = sections
            .iter()
            .map(|section| section.heading_text.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(names, vec!["Alpha", "Gamma"]);
    }

    #[test]
    fn paragraphs_take_title_from_preceding_short_line() {
        let pages = vec![PageText {
            page: 3,
            text: "Coastal Walks\n\nThe northern trail follows the cliffs for twelve kilometres\nand ends at the lighthouse.\n\nshort\n"
                .to_string(),
        }];

        let sections = group_paragraphs(&pages, DEFAULT_MIN_PARAGRAPH_CHARS);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].heading_text, "Coastal Walks");
        assert_eq!(sections[0].page, 3);
        assert!(sections[0].content.starts_with("The northern trail"));
        assert!(sections[0].content.ends_with("lighthouse."));
    }

    #[test]
    fn paragraphs_without_usable_title_use_opening_words() {
        let pages = vec![PageText {
            page: 1,
            text: "Budgets are reviewed every quarter by the finance committee and its chair.\n\n\
                   Timelines are agreed with each department before the budget is frozen."
                .to_string(),
        }];

        let sections = group_paragraphs(&pages, DEFAULT_MIN_PARAGRAPH_CHARS);
        assert_eq!(sections.len(), 2);
        assert_eq!(
            sections[0].heading_text,
            "Budgets are reviewed every quarter by the finance"
        );
        assert_eq!(
            sections[1].heading_text,
            "Timelines are agreed with each department before the"
        );
    }
}
