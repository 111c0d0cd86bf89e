//! One rendering rule per Markdown construct.

use comrak::nodes::{AlertType, AstNode, ListType, NodeValue, TableAlignment};
use syntect::parsing::SyntaxSet;
use tracing::{debug, warn};
use url::Url;

use crate::application::render::{
    diagram::DiagramDebouncer,
    escape::{escape_attribute, escape_html},
    footnotes::FootnoteRegistry,
    theme::{StyleMapping, with_leading_space},
    types::{ListRenderContext, RenderConfiguration},
};

use super::{
    highlight::{self, PLAIN_TEXT_LANGUAGE, Palette},
    math, rewrite,
};

/// Hosts whose links survive as real anchors in the destination editor.
const TRUSTED_LINK_HOSTS: [&str; 1] = ["mp.weixin.qq.com"];

const TABLE_WRAPPER_STYLE: &str = "padding:0 8px; max-width: 100%; overflow: auto";
const MAC_SIGN_SPAN_STYLE: &str = "padding: 10px 14px 0;";

const MAC_CODE_SVG: &str = concat!(
    r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" x="0px" y="0px" width="45px" height="13px" viewBox="0 0 450 130">"#,
    r#"<ellipse cx="50" cy="65" rx="50" ry="52" stroke="rgb(220,60,54)" stroke-width="2" fill="rgb(237,108,96)" />"#,
    r#"<ellipse cx="225" cy="65" rx="50" ry="52" stroke="rgb(218,151,33)" stroke-width="2" fill="rgb(247,193,81)" />"#,
    r#"<ellipse cx="400" cy="65" rx="50" ry="52" stroke="rgb(27,161,37)" stroke-width="2" fill="rgb(100,200,86)" />"#,
    r#"</svg>"#,
);

/// Swaps a broken image for a grey placeholder icon.
const IMAGE_FALLBACK_ONERROR: &str = concat!(
    "this.onerror=null;",
    "this.src='data:image/svg+xml,%3Csvg xmlns=\\'http://www.w3.org/2000/svg\\' viewBox=\\'0 0 24 24\\' width=\\'36\\' height=\\'36\\'%3E",
    "%3Cpath fill=\\'%23ccc\\' d=\\'M2.28 3.22a.75.75 0 0 0-1.06 1.06l4.928 4.929a4.75 4.75 0 0 0-1.9 3.791v8.5a.75.75 0 0 0 .75.75h12a.75.75 0 0 0 .402-.116l1.282 1.283a.75.75 0 1 0 1.06-1.061l-1.57-1.57-6.96-6.96L4.289 6.22l-2.01-3Zm7.57 7.57l6.94 6.94a.755.755 0 0 1-.039.002H5.75v-8.5a3.25 3.25 0 0 1 1.32-2.618l2.78 2.76Zm3.436-6.49h5.964v7.19l1.5 1.5V3.55a.75.75 0 0 0-.75-.75h-8.5a.75.75 0 0 0-.686.457l1.159 1.157a.743.743 0 0 0 .313-.114Z\\'/%3E",
    "%3C/svg%3E';",
    "this.style.border='1px solid #ddd';",
    "this.style.padding='8px';",
);

/// What kinds of content a render pass produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RenderFlags {
    pub(crate) contains_code: bool,
    pub(crate) contains_math: bool,
    pub(crate) contains_mermaid: bool,
}

/// Walks a parsed document and emits inline-styled HTML, updating the
/// session's footnotes, list context and diagram trigger along the way.
pub(crate) struct ElementRenderer<'r> {
    config: &'r RenderConfiguration,
    styles: &'r StyleMapping,
    syntax_set: &'r SyntaxSet,
    palette: Palette<'r>,
    footnotes: &'r mut FootnoteRegistry,
    list_context: &'r mut ListRenderContext,
    diagrams: &'r mut DiagramDebouncer,
    flags: RenderFlags,
}

impl<'r> ElementRenderer<'r> {
    pub(crate) fn new(
        config: &'r RenderConfiguration,
        styles: &'r StyleMapping,
        syntax_set: &'r SyntaxSet,
        palette: Palette<'r>,
        footnotes: &'r mut FootnoteRegistry,
        list_context: &'r mut ListRenderContext,
        diagrams: &'r mut DiagramDebouncer,
    ) -> Self {
        Self {
            config,
            styles,
            syntax_set,
            palette,
            footnotes,
            list_context,
            diagrams,
            flags: RenderFlags::default(),
        }
    }

    pub(crate) fn flags(&self) -> RenderFlags {
        self.flags
    }

    pub(crate) fn render<'a>(&mut self, node: &'a AstNode<'a>) -> String {
        let value = node.data.borrow().value.clone();

        match value {
            NodeValue::Document => self.render_children(node),
            NodeValue::Heading(heading) => self.heading(node, heading.level),
            NodeValue::Paragraph => self.paragraph(node),
            NodeValue::BlockQuote => self.blockquote(node),
            NodeValue::Alert(alert) => {
                let kind = alert_kind(&alert.alert_type);
                self.alert(node, kind, alert.title.as_deref())
            }
            NodeValue::CodeBlock(block) => self.code_block(&block.info, &block.literal),
            NodeValue::Code(code) => self.codespan(&code.literal),
            NodeValue::List(list) => {
                let ordered = matches!(list.list_type, ListType::Ordered);
                self.list(node, ordered, list.start as u64)
            }
            NodeValue::Item(_) => self.list_item(node),
            NodeValue::Image(link) => self.image(node, &link.url, &link.title),
            NodeValue::Link(link) => self.link(node, &link.url, &link.title),
            NodeValue::Strong => {
                let content = self.render_children(node);
                self.styles.styled_content("strong", &content, None)
            }
            NodeValue::Emph => {
                let content = self.render_children(node);
                self.styles.styled_content("em", &content, Some("span"))
            }
            NodeValue::Strikethrough => format!("<del>{}</del>", self.render_children(node)),
            NodeValue::Table(table) => self.table(node, &table.alignments),
            NodeValue::ThematicBreak => {
                format!("<hr{} />", with_leading_space(&self.styles.style_attr("hr", "")))
            }
            NodeValue::Math(math) => self.math(&math.literal, math.display_math),
            NodeValue::Text(text) => escape_html(&text),
            NodeValue::SoftBreak | NodeValue::LineBreak => "<br/>".to_string(),
            NodeValue::HtmlBlock(block) => block.literal.to_string(),
            NodeValue::HtmlInline(html) => html.to_string(),
            _ => self.render_children(node),
        }
    }

    fn render_children<'a>(&mut self, node: &'a AstNode<'a>) -> String {
        let mut html = String::new();
        for child in node.children() {
            html.push_str(&self.render(child));
        }
        html
    }

    fn heading<'a>(&mut self, node: &'a AstNode<'a>, level: u8) -> String {
        let content = self.render_children(node);
        let tag = format!("h{level}");
        let category = if self.styles.contains(&tag) {
            tag.as_str()
        } else {
            "heading"
        };
        self.styles.styled_content(category, &content, Some(&tag))
    }

    fn paragraph<'a>(&mut self, node: &'a AstNode<'a>) -> String {
        let content = self.render_children(node);
        let is_figure_image = content.contains("<figure") && content.contains("<img");
        if is_figure_image || content.trim().is_empty() || in_tight_list(node) {
            return content;
        }
        self.styles.styled_content("p", &content, None)
    }

    fn blockquote<'a>(&mut self, node: &'a AstNode<'a>) -> String {
        let content = self.render_children(node);
        let content = self.restyle_quoted(&content, &["blockquote_p"]);
        self.styles.styled_content("blockquote", &content, None)
    }

    fn alert<'a>(&mut self, node: &'a AstNode<'a>, kind: &str, title: Option<&str>) -> String {
        let content = self.render_children(node);
        let paragraph_category = format!("blockquote_p_{kind}");
        let content = self.restyle_quoted(&content, &["blockquote_p", &paragraph_category]);

        let title = match title.map(str::trim).filter(|title| !title.is_empty()) {
            Some(custom) => escape_html(custom),
            None => capitalize(kind),
        };
        let title_category = format!("blockquote_title_{kind}");
        let title_style = self
            .styles
            .combined_style_attr(&["blockquote_title", &title_category], "");
        let block_category = format!("blockquote_{kind}");
        let block_style = self
            .styles
            .combined_style_attr(&["blockquote", &block_category], "");

        format!(
            "<blockquote class=\"markdown-alert markdown-alert-{kind}\"{}><p class=\"markdown-alert-title\"{}>{title}</p>{content}</blockquote>",
            with_leading_space(&block_style),
            with_leading_space(&title_style),
        )
    }

    fn restyle_quoted(&self, content: &str, categories: &[&str]) -> String {
        let style = self.styles.combined_style_value(categories);
        match rewrite::restyle_paragraphs(content, style.as_deref()) {
            Ok(html) => html,
            Err(err) => {
                warn!(
                    target = "application::render::elements",
                    error = %err,
                    "Failed to restyle quoted paragraphs"
                );
                content.to_string()
            }
        }
    }

    fn code_block(&mut self, info: &str, literal: &str) -> String {
        let info = info.trim();
        if info.starts_with("mermaid") {
            self.flags.contains_mermaid = true;
            self.diagrams.trigger();
            return format!("<pre class=\"mermaid\">{}</pre>", escape_html(literal));
        }

        self.flags.contains_code = true;
        let (language, syntax) = highlight::resolve_language(self.syntax_set, info);
        if language == PLAIN_TEXT_LANGUAGE && !info.is_empty() {
            debug!(
                target = "application::render::highlight",
                info,
                "Unknown code block language; highlighting as plain text"
            );
        }

        let highlighted =
            match highlight::highlight_code(&language, syntax, literal, self.syntax_set, self.palette) {
                Ok(html) => html,
                Err(err) => {
                    warn!(
                        target = "application::render::highlight",
                        language = %language,
                        error = %err,
                        "Highlighting failed; emitting plain text"
                    );
                    metrics::counter!("mpstyle_highlight_fallback_total").increment(1);
                    escape_html(literal.strip_suffix('\n').unwrap_or(literal))
                }
            };
        let body = highlight::format_for_paste(&highlighted);

        let mac_sign = if self.config.mac_code_block {
            format!("<span class=\"mac-sign\" style=\"{MAC_SIGN_SPAN_STYLE}\" hidden>{MAC_CODE_SVG}</span>")
        } else {
            String::new()
        };

        format!(
            "<pre class=\"hljs code__pre\"{}>{mac_sign}<code class=\"language-{}\"{}>{body}</code></pre>",
            with_leading_space(&self.styles.style_attr("code_pre", "")),
            escape_attribute(&language),
            with_leading_space(&self.styles.style_attr("code", "")),
        )
    }

    fn codespan(&self, literal: &str) -> String {
        self.styles
            .styled_content("codespan", &escape_html(literal), Some("code"))
    }

    fn list<'a>(&mut self, node: &'a AstNode<'a>, ordered: bool, start: u64) -> String {
        let mut items = String::new();
        for (offset, item) in node.children().enumerate() {
            *self.list_context = ListRenderContext {
                is_ordered: ordered,
                current_index: start + offset as u64,
            };
            items.push_str(&self.list_item(item));
        }

        let tag = if ordered { "ol" } else { "ul" };
        self.styles.styled_content(tag, &items, None)
    }

    fn list_item<'a>(&mut self, node: &'a AstNode<'a>) -> String {
        // Nested lists overwrite the context, so the prefix is taken first.
        let prefix = self.list_context.prefix();
        let content = self.render_children(node);
        self.styles
            .styled_content("listitem", &format!("{prefix}{content}"), Some("li"))
    }

    fn image<'a>(&mut self, node: &'a AstNode<'a>, url: &str, title: &str) -> String {
        let alt = collect_inline_text(node);
        let caption = legend_caption(&self.config.legend, &alt, title);
        let figcaption = if caption.is_empty() {
            String::new()
        } else {
            self.styles
                .styled_content("figcaption", &escape_html(&caption), None)
        };

        format!(
            "<figure{}><img{} src=\"{}\" title=\"{}\" alt=\"{}\" onerror=\"{IMAGE_FALLBACK_ONERROR}\" />{figcaption}</figure>",
            with_leading_space(&self.styles.style_attr("figure", "")),
            with_leading_space(&self.styles.style_attr("image", "")),
            escape_attribute(url),
            escape_attribute(title),
            escape_attribute(&alt),
        )
    }

    fn link<'a>(&mut self, node: &'a AstNode<'a>, url: &str, title: &str) -> String {
        let content = self.render_children(node);
        let text = collect_inline_text(node);
        let label = if title.is_empty() { text.as_str() } else { title };

        match Url::parse(url) {
            Ok(parsed) => {
                if parsed
                    .host_str()
                    .is_some_and(|host| TRUSTED_LINK_HOSTS.contains(&host))
                {
                    return format!(
                        "<a href=\"{}\" title=\"{}\"{}>{content}</a>",
                        escape_attribute(url),
                        escape_attribute(label),
                        with_leading_space(&self.styles.style_attr("wx_link", "")),
                    );
                }
            }
            Err(err) => {
                warn!(
                    target = "application::render::elements",
                    url,
                    error = %err,
                    "Invalid link URL"
                );
            }
        }

        if url == text {
            return content;
        }

        if self.config.cite_status {
            let index = self.footnotes.cite(label, url);
            return format!(
                "<span{}>{content}<sup>[{index}]</sup></span>",
                with_leading_space(&self.styles.style_attr("link", "")),
            );
        }

        self.styles.styled_content("link", &content, Some("span"))
    }

    fn table<'a>(&mut self, node: &'a AstNode<'a>, alignments: &[TableAlignment]) -> String {
        let mut header = String::new();
        let mut body = String::new();

        for row in node.children() {
            let is_header = matches!(row.data.borrow().value, NodeValue::TableRow(true));
            let mut cells = String::new();
            for (column, cell) in row.children().enumerate() {
                let content = self.render_children(cell);
                cells.push_str(&self.table_cell(&content, alignments.get(column)));
            }

            if is_header {
                header.push_str(&format!("<tr>{cells}</tr>"));
            } else {
                body.push_str(&self.styles.styled_content("tr", &cells, None));
            }
        }

        format!(
            "<section style=\"{TABLE_WRAPPER_STYLE}\"><table class=\"preview-table\"><thead{}>{header}</thead><tbody>{body}</tbody></table></section>",
            with_leading_space(&self.styles.style_attr("thead", "")),
        )
    }

    fn table_cell(&self, content: &str, alignment: Option<&TableAlignment>) -> String {
        let suffix = match alignment {
            Some(TableAlignment::Left) => ";text-align: left",
            Some(TableAlignment::Center) => ";text-align: center",
            Some(TableAlignment::Right) => ";text-align: right",
            _ => "",
        };

        let mut attr = self.styles.style_attr("td", suffix);
        if attr.is_empty() && !suffix.is_empty() {
            attr = format!("style=\"{}\"", suffix.trim_start_matches(';'));
        }
        format!("<td{}>{content}</td>", with_leading_space(&attr))
    }

    fn math(&mut self, literal: &str, display_mode: bool) -> String {
        self.flags.contains_math = true;

        match math::render_math_html(literal, display_mode) {
            Ok(html) if display_mode => format!(
                "<span data-role=\"math-block\" style=\"display: block; text-align: center; overflow: auto\">{html}</span>"
            ),
            Ok(html) => format!("<span data-role=\"math-inline\">{html}</span>"),
            Err(err) => {
                warn!(
                    target = "application::render::math",
                    display_mode,
                    error = %err,
                    "Math rendering failed; emitting source"
                );
                let delimiter = if display_mode { "$$" } else { "$" };
                self.codespan(&format!("{delimiter}{literal}{delimiter}"))
            }
        }
    }
}

/// Caption text chosen by a dash-separated legend policy such as `alt-title`.
/// Only `alt` and `title` tokens select anything; the first non-empty wins.
pub(crate) fn legend_caption(legend: &str, alt: &str, title: &str) -> String {
    legend
        .split('-')
        .find_map(|token| match token.trim() {
            "alt" if !alt.is_empty() => Some(alt),
            "title" if !title.is_empty() => Some(title),
            _ => None,
        })
        .unwrap_or_default()
        .to_string()
}

fn in_tight_list(node: &AstNode<'_>) -> bool {
    node.parent()
        .and_then(|item| item.parent())
        .is_some_and(|list| matches!(&list.data.borrow().value, NodeValue::List(l) if l.tight))
}

fn alert_kind(alert_type: &AlertType) -> &'static str {
    match alert_type {
        AlertType::Note => "note",
        AlertType::Tip => "tip",
        AlertType::Important => "important",
        AlertType::Warning => "warning",
        AlertType::Caution => "caution",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn collect_inline_text<'a>(node: &'a AstNode<'a>) -> String {
    fn walk<'a>(node: &'a AstNode<'a>, buffer: &mut String) {
        {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Text(text) => buffer.push_str(text),
                NodeValue::Code(code) => buffer.push_str(&code.literal),
                NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
                _ => {}
            }
        }
        for child in node.children() {
            walk(child, buffer);
        }
    }

    let mut text = String::new();
    for child in node.children() {
        walk(child, &mut text);
    }
    text
}
