//! Metadata header extraction and reading metrics.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

use super::types::{ParseResult, ReadingMetrics};

const BYTE_ORDER_MARK: char = '\u{feff}';
const OPENING_FENCE: &str = "---";
const CLOSING_FENCES: [&str; 2] = ["---", "..."];
const WORDS_PER_MINUTE: f64 = 200.0;

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("metadata header is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("metadata header cannot be represented as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metadata header must be a mapping")]
    NotAMapping,
}

/// Split `markdown` into its metadata header and body, and measure the body.
///
/// Never fails: a malformed header yields empty metadata, the whole input as
/// body and metrics over the whole input.
pub fn parse_front_matter_and_content(markdown: &str) -> ParseResult {
    match split_front_matter(markdown) {
        Ok(Some((metadata, body))) => ParseResult {
            metrics: reading_time(body),
            metadata,
            body: body.to_string(),
        },
        Ok(None) => ParseResult {
            metadata: BTreeMap::new(),
            body: markdown.to_string(),
            metrics: reading_time(markdown),
        },
        Err(err) => {
            warn!(
                target = "application::render::front_matter",
                error = %err,
                "Failed to parse metadata header; rendering the whole document"
            );
            ParseResult {
                metadata: BTreeMap::new(),
                body: markdown.to_string(),
                metrics: reading_time(markdown),
            }
        }
    }
}

type Metadata = BTreeMap<String, serde_json::Value>;

/// Returns `Ok(None)` when the document has no fenced header at all.
fn split_front_matter(markdown: &str) -> Result<Option<(Metadata, &str)>, FrontMatterError> {
    let text = markdown.strip_prefix(BYTE_ORDER_MARK).unwrap_or(markdown);

    let Some((first_line, mut rest)) = split_line(text) else {
        return Ok(None);
    };
    if first_line.trim_end() != OPENING_FENCE {
        return Ok(None);
    }

    let header_start = rest;
    let mut header_len = 0;
    loop {
        let Some((line, after)) = split_line(rest) else {
            return Ok(None);
        };
        if CLOSING_FENCES.contains(&line.trim_end()) {
            let header = &header_start[..header_len];
            let metadata = parse_header(header)?;
            return Ok(Some((metadata, after)));
        }
        header_len += rest.len() - after.len();
        rest = after;
    }
}

/// Split off the first line, returning it without its terminator.
fn split_line(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    match text.find('\n') {
        Some(pos) => {
            let line = text[..pos].strip_suffix('\r').unwrap_or(&text[..pos]);
            Some((line, &text[pos + 1..]))
        }
        None => Some((text, "")),
    }
}

fn parse_header(header: &str) -> Result<Metadata, FrontMatterError> {
    if header.trim().is_empty() {
        return Ok(Metadata::new());
    }

    let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(header)?;
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        serde_json::Value::Null => Ok(Metadata::new()),
        _ => Err(FrontMatterError::NotAMapping),
    }
}

/// Word count and reading time at 200 words per minute.
pub fn reading_time(text: &str) -> ReadingMetrics {
    let words = count_words(text);
    let minutes = words as f64 / WORDS_PER_MINUTE;
    ReadingMetrics {
        words,
        minutes,
        text: format!("{} min read", minutes.ceil() as u64),
    }
}

/// Count words: each CJK character is one word, other text splits on whitespace.
pub fn count_words(text: &str) -> u64 {
    let mut words = 0u64;
    let mut in_word = false;

    for ch in text.chars() {
        if is_cjk(ch) {
            words += 1;
            in_word = false;
        } else if ch.is_whitespace() {
            in_word = false;
        } else if !in_word {
            words += 1;
            in_word = true;
        }
    }

    words
}

pub fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3040..=0x30FF      // Hiragana, Katakana
            | 0x3400..=0x4DBF // CJK Extension A
            | 0x4E00..=0x9FFF // CJK Unified Ideographs
            | 0xAC00..=0xD7AF // Hangul syllables
            | 0xF900..=0xFAFF // CJK Compatibility Ideographs
            | 0x20000..=0x2FA1F
    )
}
