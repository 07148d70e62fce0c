use crate::error::RagError;
use crate::models::DEFAULT_HEADING_KEYWORDS;
use regex::Regex;

/// Splits raw text into coarse sections at heading lines such as
/// `Chapter 2: Forces` or `Lesson 4.`.
///
/// A heading line starts with one of the keywords as a whole word, optionally
/// followed by a number and `:` or `.`. The whole heading line is dropped,
/// title included. This is a heuristic: a prose line that happens to start
/// with a keyword is treated as a heading and its text is lost.
#[derive(Debug, Clone)]
pub struct SectionSplitter {
    heading_re: Regex,
}

impl SectionSplitter {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, RagError> {
        let alternatives = keywords
            .iter()
            .map(|keyword| keyword.as_ref().trim())
            .filter(|keyword| !keyword.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>();

        if alternatives.is_empty() {
            return Err(RagError::InvalidConfig(
                "heading keyword list is empty".to_string(),
            ));
        }

        Ok(Self {
            heading_re: Regex::new(&heading_pattern(&alternatives.join("|")))?,
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.heading_re
            .split(text)
            .map(str::trim)
            .filter(|section| !section.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn heading_pattern(alternatives: &str) -> String {
    format!(r"(?m)^[ \t]*(?:{alternatives})\b[ \t]*(?:\d+(?:\.\d+)*)?[ \t]*[:.]?[^\n]*(?:\n|$)")
}

/// Section splitting with the default heading vocabulary.
pub fn split_by_titles(text: &str) -> Result<Vec<String>, RagError> {
    Ok(SectionSplitter::new(&DEFAULT_HEADING_KEYWORDS)?.split(text))
}
