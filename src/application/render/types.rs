use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::theme::ThemeDescription;
use super::themes::default_theme;

pub const DEFAULT_FONTS: &str = "-apple-system-font, BlinkMacSystemFont, Helvetica Neue, PingFang SC, Hiragino Sans GB, Microsoft YaHei UI, Microsoft YaHei, Arial, sans-serif";
pub const DEFAULT_SIZE: &str = "16px";
pub const DEFAULT_LEGEND: &str = "alt-title";
pub const DEFAULT_CODE_THEME: &str = "InspiredGitHub";

/// Everything the renderer needs to know about the document's presentation.
///
/// A session owns exactly one configuration and swaps it wholesale through
/// [`RenderSession::set_options`](super::RenderSession::set_options) or
/// [`RenderSession::reset`](super::RenderSession::reset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfiguration {
    pub theme: ThemeDescription,
    /// Value merged into the base `font-family`.
    pub fonts: String,
    /// Value merged into the base `font-size`, e.g. `16px`.
    pub size: String,
    /// Give paragraphs a `text-indent: 2em` unless the theme sets one.
    pub is_use_indent: bool,
    /// Turn ordinary links into numbered citations listed after the body.
    pub cite_status: bool,
    /// Dash-separated caption policy for images, e.g. `alt-title`.
    pub legend: String,
    /// Prepend the word count / reading time banner.
    pub count_status: bool,
    /// Show the three-dot decoration on code blocks.
    pub mac_code_block: bool,
    /// Syntect theme used to inline highlighting colours. `None` emits
    /// `hljs-` prefixed classes plus a stylesheet instead.
    pub code_theme: Option<String>,
    /// Run the rendered body through the HTML sanitizer before assembly.
    /// Off unless the caller asks for it; sanitizing drops the image
    /// `onerror` fallback.
    pub sanitize: bool,
}

impl RenderConfiguration {
    pub fn new(theme: ThemeDescription) -> Self {
        Self {
            theme,
            fonts: DEFAULT_FONTS.to_string(),
            size: DEFAULT_SIZE.to_string(),
            is_use_indent: false,
            cite_status: false,
            legend: DEFAULT_LEGEND.to_string(),
            count_status: false,
            mac_code_block: true,
            code_theme: Some(DEFAULT_CODE_THEME.to_string()),
            sanitize: false,
        }
    }

    /// Shallow merge: every field present in `partial` replaces the held value.
    pub fn merged(&self, partial: PartialConfiguration) -> Self {
        let PartialConfiguration {
            theme,
            fonts,
            size,
            is_use_indent,
            cite_status,
            legend,
            count_status,
            mac_code_block,
            code_theme,
            sanitize,
        } = partial;

        Self {
            theme: theme.unwrap_or_else(|| self.theme.clone()),
            fonts: fonts.unwrap_or_else(|| self.fonts.clone()),
            size: size.unwrap_or_else(|| self.size.clone()),
            is_use_indent: is_use_indent.unwrap_or(self.is_use_indent),
            cite_status: cite_status.unwrap_or(self.cite_status),
            legend: legend.unwrap_or_else(|| self.legend.clone()),
            count_status: count_status.unwrap_or(self.count_status),
            mac_code_block: mac_code_block.unwrap_or(self.mac_code_block),
            code_theme: code_theme.unwrap_or_else(|| self.code_theme.clone()),
            sanitize: sanitize.unwrap_or(self.sanitize),
        }
    }
}

impl Default for RenderConfiguration {
    fn default() -> Self {
        Self::new(default_theme())
    }
}

/// Subset of [`RenderConfiguration`] applied by `set_options` / `reset`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialConfiguration {
    pub theme: Option<ThemeDescription>,
    pub fonts: Option<String>,
    pub size: Option<String>,
    pub is_use_indent: Option<bool>,
    pub cite_status: Option<bool>,
    pub legend: Option<String>,
    pub count_status: Option<bool>,
    pub mac_code_block: Option<bool>,
    pub code_theme: Option<Option<String>>,
    pub sanitize: Option<bool>,
}

impl PartialConfiguration {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A citation recorded while rendering links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootnoteEntry {
    /// 1-based position of the first reference.
    pub index: u32,
    pub title: String,
    pub link: String,
}

/// List state consulted when an item computes its literal prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListRenderContext {
    pub is_ordered: bool,
    pub current_index: u64,
}

impl ListRenderContext {
    pub fn prefix(&self) -> String {
        if self.is_ordered {
            format!("{}. ", self.current_index)
        } else {
            "• ".to_string()
        }
    }
}

/// Word count and reading estimate for a document body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadingMetrics {
    pub words: u64,
    pub minutes: f64,
    pub text: String,
}

/// Result of splitting a raw document into header metadata and body.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParseResult {
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub body: String,
    pub metrics: ReadingMetrics,
}

/// Body HTML produced by the element renderers before assembly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedBody {
    pub html: String,
    pub contains_code: bool,
    pub contains_math: bool,
    pub contains_mermaid: bool,
}

/// Final output of a full render pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutput {
    /// Container-wrapped HTML ready to paste or export.
    pub html: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub metrics: ReadingMetrics,
    pub footnotes: Vec<FootnoteEntry>,
    pub contains_code: bool,
    pub contains_math: bool,
    pub contains_mermaid: bool,
}

/// Failures raised inside the pipeline. The session absorbs these and falls
/// back to a degraded rendering, so they never reach the caller of `render`.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("math rendering failed: {message}")]
    Math { message: String },
    #[error("document processing failed: {message}")]
    Document { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_partial_keeps_configuration() {
        let config = RenderConfiguration::default();
        let merged = config.merged(PartialConfiguration::default());
        assert_eq!(config, merged);
        assert!(PartialConfiguration::default().is_empty());
    }

    #[test]
    fn partial_fields_replace_held_values() {
        let config = RenderConfiguration::default();
        let merged = config.merged(PartialConfiguration {
            cite_status: Some(true),
            size: Some("18px".to_string()),
            code_theme: Some(None),
            ..Default::default()
        });

        assert!(merged.cite_status);
        assert_eq!(merged.size, "18px");
        assert_eq!(merged.code_theme, None);
        assert_eq!(merged.fonts, config.fonts);
    }

    #[test]
    fn list_prefixes() {
        let ordered = ListRenderContext {
            is_ordered: true,
            current_index: 3,
        };
        assert_eq!(ordered.prefix(), "3. ");

        let bullet = ListRenderContext {
            is_ordered: false,
            current_index: 7,
        };
        assert_eq!(bullet.prefix(), "• ");
    }
}
