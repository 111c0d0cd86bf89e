mod assembly;
mod config;
mod elements;
mod highlight;
mod math;
mod mermaid;
mod rewrite;

use std::{fmt, sync::Arc};

use once_cell::sync::Lazy;
use syntect::{
    dumps::from_uncompressed_data,
    highlighting::ThemeSet,
    html::ClassStyle,
    parsing::SyntaxSet,
};
use tracing::warn;

pub use self::mermaid::{MermaidRenderError, MermaidRenderer};
pub(crate) use assembly::{AssemblyParts, assemble};
pub(crate) use elements::ElementRenderer;
pub(crate) use highlight::Palette;

/// Stylesheet matching the `hljs-` classes emitted when no inline code theme is chosen.
pub const HIGHLIGHT_STYLESHEET: &str = include_str!(env!("HIGHLIGHT_CSS_FILE"));

/// Immutable, shareable pieces of the pipeline: parser options, the syntax
/// pack, highlighting themes and the sanitizer.
pub struct RenderEngine {
    options: comrak::Options<'static>,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    class_style: ClassStyle,
    sanitizer: ammonia::Builder<'static>,
}

impl RenderEngine {
    fn new() -> Self {
        let syntax_bytes = include_bytes!(env!("SYNTAX_PACK_FILE"));
        let syntax_set: SyntaxSet =
            from_uncompressed_data(syntax_bytes).expect("syntax pack must be valid");

        Self {
            options: config::default_options(),
            syntax_set,
            theme_set: ThemeSet::load_defaults(),
            class_style: ClassStyle::SpacedPrefixed { prefix: "hljs-" },
            sanitizer: config::build_sanitizer(),
        }
    }

    pub(crate) fn options(&self) -> &comrak::Options<'static> {
        &self.options
    }

    pub(crate) fn syntax_set(&self) -> &SyntaxSet {
        &self.syntax_set
    }

    /// Pick inline colours from `code_theme`, or classes when it is `None` or unknown.
    pub(crate) fn palette(&self, code_theme: Option<&str>) -> Palette<'_> {
        match code_theme {
            Some(name) => match self.theme_set.themes.get(name) {
                Some(theme) => Palette::Inline(theme),
                None => {
                    warn!(
                        target = "application::render::highlight",
                        code_theme = name,
                        "Unknown code theme; falling back to classed highlighting"
                    );
                    Palette::Classed(&self.class_style)
                }
            },
            None => Palette::Classed(&self.class_style),
        }
    }

    pub fn sanitize(&self, html: &str) -> String {
        self.sanitizer.clean(html).to_string()
    }

    /// Whether `token` names a language the highlighter recognises.
    pub fn knows_language(&self, token: &str) -> bool {
        !token.is_empty() && highlight::find_syntax(&self.syntax_set, token).is_some()
    }

    /// Names accepted as an inline code theme.
    pub fn code_themes(&self) -> Vec<String> {
        self.theme_set.themes.keys().cloned().collect()
    }
}

impl fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEngine")
            .field("syntaxes", &self.syntax_set.syntaxes().len())
            .field("code_themes", &self.theme_set.themes.len())
            .finish_non_exhaustive()
    }
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new()
    }
}

static RENDER_ENGINE: Lazy<Arc<RenderEngine>> = Lazy::new(|| Arc::new(RenderEngine::new()));

/// Access the shared engine, initialised on first use.
pub fn render_engine() -> Arc<RenderEngine> {
    Arc::clone(&RENDER_ENGINE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_common_languages() {
        let engine = render_engine();
        assert!(engine.knows_language("rust"));
        assert!(engine.knows_language("JavaScript"));
        assert!(!engine.knows_language("definitely-not-a-language"));
        assert!(!engine.knows_language(""));
    }

    #[test]
    fn unknown_code_theme_uses_classes() {
        let engine = render_engine();
        assert!(matches!(engine.palette(Some("nope")), Palette::Classed(_)));
        assert!(matches!(engine.palette(None), Palette::Classed(_)));
        assert!(matches!(
            engine.palette(Some("InspiredGitHub")),
            Palette::Inline(_)
        ));
        assert!(engine.code_themes().iter().any(|name| name == "InspiredGitHub"));
    }

    #[test]
    fn stylesheet_targets_prefixed_classes() {
        assert!(HIGHLIGHT_STYLESHEET.contains(".hljs-"));
    }
}
