use crate::model::Section;
use crate::semantic::normalize_whitespace;

use super::relevance::Scoreable;

pub const DEFAULT_CHUNK_WORDS: usize = 250;

/// A bounded slice of a section, ranked during sub-section refinement.
#[derive(Debug, Clone, PartialEq)]
pub struct SubSection {
    pub document: String,
    pub page: u32,
    pub heading_text: String,
    pub text: String,
}

impl Scoreable for SubSection {
    fn content(&self) -> &str {
        &self.text
    }
}

/// Splits `content` into chunks of at most `chunk_words` words, flushing on line
/// boundaries where possible. Lines longer than the limit are cut into word
/// windows. Input without any non-empty line yields one chunk, the trimmed input.
pub fn chunk_text(content: &str, chunk_words: usize) -> Vec<String> {
    let chunk_words = chunk_words.max(1);
    let mut chunks = Vec::<String>::new();
    let mut current = Vec::<&str>::new();

    for line in content.lines() {
        let words = line.split_whitespace().collect::<Vec<&str>>();
        if words.is_empty() {
            continue;
        }

        if !current.is_empty() && current.len() + words.len() > chunk_words {
            chunks.push(current.join(" "));
            current.clear();
        }

        for word in words {
            if current.len() == chunk_words {
                chunks.push(current.join(" "));
                current.clear();
            }
            current.push(word);
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    if chunks.is_empty() {
        chunks.push(content.trim().to_string());
    }

    chunks
}

pub fn chunk_section(section: &Section, chunk_words: usize) -> Vec<SubSection> {
    chunk_text(&section.content, chunk_words)
        .into_iter()
        .map(|text| SubSection {
            document: section.document.clone(),
            page: section.page,
            heading_text: section.heading_text.clone(),
            text: normalize_whitespace(&text),
        })
        .filter(|sub_section| !sub_section.text.is_empty())
        .collect()
}
