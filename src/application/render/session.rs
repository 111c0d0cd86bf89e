use std::{sync::Arc, time::Instant};

use comrak::{Arena, parse_document};
use tracing::debug;

use super::{
    diagram::{DEFAULT_DEBOUNCE_WINDOW, DiagramDebouncer, DiagramRunner},
    escape::escape_html,
    footnotes::FootnoteRegistry,
    front_matter::parse_front_matter_and_content,
    service::{
        AssemblyParts, ElementRenderer, HIGHLIGHT_STYLESHEET, Palette, RenderEngine, assemble,
        render_engine,
    },
    theme::StyleMapping,
    types::{
        FootnoteEntry, ListRenderContext, ParseResult, PartialConfiguration, ReadingMetrics,
        RenderConfiguration, RenderOutput, RenderedBody,
    },
};

const FOOTNOTE_HEADING: &str = "引用链接";

/// Per-document rendering state: configuration, computed styles, citations,
/// list context and the diagram trigger.
///
/// One session serves one document stream; footnotes accumulate across
/// [`render`](Self::render) calls until [`reset`](Self::reset).
#[derive(Debug)]
pub struct RenderSession {
    engine: Arc<RenderEngine>,
    config: RenderConfiguration,
    styles: StyleMapping,
    footnotes: FootnoteRegistry,
    list_context: ListRenderContext,
    diagrams: DiagramDebouncer,
}

impl RenderSession {
    pub fn new(config: RenderConfiguration) -> Self {
        Self::with_engine(render_engine(), config)
    }

    pub fn with_engine(engine: Arc<RenderEngine>, config: RenderConfiguration) -> Self {
        let styles = StyleMapping::from_configuration(&config);
        Self {
            engine,
            config,
            styles,
            footnotes: FootnoteRegistry::new(),
            list_context: ListRenderContext::default(),
            diagrams: DiagramDebouncer::disabled(),
        }
    }

    /// Attach the collaborator invoked after a batch of diagram placeholders.
    pub fn with_diagram_runner(mut self, runner: Arc<dyn DiagramRunner>) -> Self {
        self.diagrams = DiagramDebouncer::new(Some(runner), DEFAULT_DEBOUNCE_WINDOW);
        self
    }

    pub fn config(&self) -> &RenderConfiguration {
        &self.config
    }

    pub fn style_mapping(&self) -> &StyleMapping {
        &self.styles
    }

    pub fn footnotes(&self) -> &[FootnoteEntry] {
        self.footnotes.entries()
    }

    pub fn diagrams(&self) -> &DiagramDebouncer {
        &self.diagrams
    }

    /// Merge `partial` into the configuration and rebuild the style mapping.
    /// Footnotes are kept.
    pub fn set_options(&mut self, partial: PartialConfiguration) {
        self.config = self.config.merged(partial);
        self.styles = StyleMapping::from_configuration(&self.config);
    }

    /// Forget all footnotes, then apply `partial` like [`set_options`](Self::set_options).
    pub fn reset(&mut self, partial: PartialConfiguration) {
        self.footnotes.clear();
        self.list_context = ListRenderContext::default();
        self.set_options(partial);
    }

    pub fn add_footnote(&mut self, title: &str, link: &str) -> u32 {
        self.footnotes.add(title, link)
    }

    pub fn parse_front_matter_and_content(&self, markdown: &str) -> ParseResult {
        parse_front_matter_and_content(markdown)
    }

    /// Word count banner, or nothing when counting is off or the text is empty.
    pub fn build_reading_time(&self, metrics: &ReadingMetrics) -> String {
        if !self.config.count_status || metrics.words == 0 {
            return String::new();
        }

        let line = format!(
            "字数 {}，阅读大约需 {} 分钟",
            metrics.words,
            metrics.minutes.ceil() as u64
        );
        let paragraph = self.styles.styled_content("blockquote_p", &line, Some("p"));
        self.styles
            .styled_content("blockquote", &paragraph, None)
    }

    /// Heading plus one line per citation, or nothing when there are none.
    pub fn build_footnotes(&self) -> String {
        if self.footnotes.is_empty() {
            return String::new();
        }

        let lines = self
            .footnotes
            .entries()
            .iter()
            .map(footnote_line)
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}{}",
            self.styles.styled_content("h4", FOOTNOTE_HEADING, None),
            self.styles.styled_content("footnotes", &lines, Some("p"))
        )
    }

    pub fn create_container(&self, content: &str) -> String {
        self.styles
            .styled_content("container", content, Some("section"))
    }

    /// Render Markdown without a metadata header into body HTML.
    pub fn render_body(&mut self, markdown: &str) -> RenderedBody {
        let engine = Arc::clone(&self.engine);
        let palette = engine.palette(self.config.code_theme.as_deref());

        let arena = Arena::new();
        let root = parse_document(&arena, markdown, engine.options());

        let mut renderer = ElementRenderer::new(
            &self.config,
            &self.styles,
            engine.syntax_set(),
            palette,
            &mut self.footnotes,
            &mut self.list_context,
            &mut self.diagrams,
        );
        let html = renderer.render(root);
        let flags = renderer.flags();

        self.diagrams.flush();

        RenderedBody {
            html,
            contains_code: flags.contains_code,
            contains_math: flags.contains_math,
            contains_mermaid: flags.contains_mermaid,
        }
    }

    /// Wrap a rendered body with the banner, footnotes and fixed style blocks.
    pub fn assemble(&self, body: &RenderedBody, metrics: &ReadingMetrics) -> String {
        let banner = self.build_reading_time(metrics);
        let footnotes = self.build_footnotes();
        let classed = matches!(
            self.engine.palette(self.config.code_theme.as_deref()),
            Palette::Classed(_)
        );

        assemble(
            AssemblyParts {
                banner: &banner,
                body: &body.html,
                footnotes: &footnotes,
                mac_code_block: self.config.mac_code_block,
                highlight_stylesheet: (classed && body.contains_code).then_some(HIGHLIGHT_STYLESHEET),
            },
            &self.styles,
        )
    }

    /// Full pipeline: metadata header, body, sanitizer, assembly.
    pub fn render(&mut self, markdown: &str) -> RenderOutput {
        let started_at = Instant::now();
        let ParseResult {
            metadata,
            body,
            metrics,
        } = parse_front_matter_and_content(markdown);

        let footnotes_before = self.footnotes.len();
        let mut rendered = self.render_body(&body);
        if self.config.sanitize {
            rendered.html = self.engine.sanitize(&rendered.html);
        }
        let html = self.assemble(&rendered, &metrics);

        let new_footnotes = self.footnotes.len().saturating_sub(footnotes_before);
        metrics::counter!("mpstyle_render_total").increment(1);
        metrics::counter!("mpstyle_footnotes_total").increment(new_footnotes as u64);

        debug!(
            target = "application::render::session",
            op = "session::render",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            words = metrics.words,
            footnotes = self.footnotes.len(),
            contains_code = rendered.contains_code,
            contains_math = rendered.contains_math,
            contains_mermaid = rendered.contains_mermaid,
            "Document rendered"
        );

        RenderOutput {
            html,
            metadata,
            metrics,
            footnotes: self.footnotes.entries().to_vec(),
            contains_code: rendered.contains_code,
            contains_math: rendered.contains_math,
            contains_mermaid: rendered.contains_mermaid,
        }
    }
}

impl Default for RenderSession {
    fn default() -> Self {
        Self::new(RenderConfiguration::default())
    }
}

fn footnote_line(entry: &FootnoteEntry) -> String {
    let index = entry.index;
    let title = escape_html(&entry.title);
    if entry.link == entry.title {
        format!(
            "<code style=\"font-size: 90%; opacity: 0.6;\">[{index}]</code>: <i style=\"word-break: break-all\">{title}</i><br/>"
        )
    } else {
        let link = escape_html(&entry.link);
        format!(
            "<code style=\"font-size: 90%; opacity: 0.6;\">[{index}]</code> {title}: <i style=\"word-break: break-all\">{link}</i><br/>"
        )
    }
}
