//! Theme-driven Markdown rendering.
//!
//! A [`RenderSession`] owns the configuration and per-document state; the
//! element renderers turn comrak's AST into HTML whose every element carries
//! inline CSS computed from the active theme.

mod diagram;
mod escape;
mod footnotes;
mod front_matter;
mod service;
mod session;
mod theme;
mod themes;
mod types;

pub use diagram::{DEFAULT_DEBOUNCE_WINDOW, DiagramDebouncer, DiagramRunner, NotifyRunner};
pub use escape::{escape_attribute, escape_html};
pub use footnotes::FootnoteRegistry;
pub use front_matter::{count_words, parse_front_matter_and_content, reading_time};
pub use service::{
    HIGHLIGHT_STYLESHEET, MermaidRenderError, MermaidRenderer, RenderEngine, render_engine,
};
pub use session::RenderSession;
pub use theme::{
    CssProperties, StyleMapping, ThemeDescription, ThemeError, merge_properties,
    serialize_properties,
};
pub use themes::{DEFAULT_THEME, builtin_theme, builtin_theme_names, default_theme};
pub use types::{
    DEFAULT_CODE_THEME, DEFAULT_FONTS, DEFAULT_LEGEND, DEFAULT_SIZE, FootnoteEntry,
    ListRenderContext, ParseResult, PartialConfiguration, ReadingMetrics, RenderConfiguration,
    RenderError, RenderOutput, RenderedBody,
};
