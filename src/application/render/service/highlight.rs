use once_cell::sync::Lazy;
use regex::Regex;
use syntect::{
    easy::HighlightLines,
    highlighting::Theme,
    html::{ClassStyle, ClassedHTMLGenerator, IncludeBackground, styled_line_to_highlighted_html},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

use crate::application::render::types::RenderError;

pub(crate) const PLAIN_TEXT_LANGUAGE: &str = "plaintext";

/// How token colours reach the output.
#[derive(Clone, Copy)]
pub(crate) enum Palette<'a> {
    /// `hljs-` prefixed classes; colours come from the bundled stylesheet.
    Classed(&'a ClassStyle),
    /// Colours inlined as `style` attributes from a syntect theme.
    Inline(&'a Theme),
}

/// Resolve the language token of an info string, falling back to plain text.
pub(crate) fn resolve_language<'s>(syntax_set: &'s SyntaxSet, info: &str) -> (String, &'s SyntaxReference) {
    let token = info.split_whitespace().next().unwrap_or_default();
    match find_syntax(syntax_set, token) {
        Some(syntax) if !token.is_empty() => (token.to_string(), syntax),
        _ => (
            PLAIN_TEXT_LANGUAGE.to_string(),
            syntax_set.find_syntax_plain_text(),
        ),
    }
}

/// Highlight `code` into span markup, dropping the final newline.
pub(crate) fn highlight_code(
    language: &str,
    syntax: &SyntaxReference,
    code: &str,
    syntax_set: &SyntaxSet,
    palette: Palette<'_>,
) -> Result<String, RenderError> {
    let mut code_with_newline = code.to_string();
    if !code_with_newline.ends_with('\n') {
        code_with_newline.push('\n');
    }

    let to_error = |message: String| RenderError::Highlighting {
        language: language.to_string(),
        message,
    };

    let mut highlighted = match palette {
        Palette::Classed(class_style) => {
            let mut generator =
                ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, *class_style);
            for line in LinesWithEndings::from(code_with_newline.as_str()) {
                generator
                    .parse_html_for_line_which_includes_newline(line)
                    .map_err(|err| to_error(err.to_string()))?;
            }
            generator.finalize()
        }
        Palette::Inline(theme) => {
            let mut highlighter = HighlightLines::new(syntax, theme);
            let mut html = String::new();
            for line in LinesWithEndings::from(code_with_newline.as_str()) {
                let regions = highlighter
                    .highlight_line(line, syntax_set)
                    .map_err(|err| to_error(err.to_string()))?;
                let fragment = styled_line_to_highlighted_html(&regions, IncludeBackground::No)
                    .map_err(|err| to_error(err.to_string()))?;
                html.push_str(&fragment);
            }
            html
        }
    };

    // The final newline may sit inside closing tags.
    if let Some(position) = highlighted.rfind('\n') {
        highlighted.remove(position);
    }
    Ok(highlighted)
}

static TEXT_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r">[^<]+|^[^<]+").expect("text segment pattern must compile")
});

/// Make highlighted markup survive pasting into an editor that collapses
/// whitespace: tabs become four spaces, newlines `<br/>`, and whitespace in
/// text segments `&nbsp;`.
pub(crate) fn format_for_paste(highlighted: &str) -> String {
    let expanded = highlighted
        .replace('\t', "    ")
        .replace("\r\n", "<br/>")
        .replace('\n', "<br/>");

    TEXT_SEGMENT
        .replace_all(&expanded, |caps: &regex::Captures<'_>| {
            caps[0]
                .chars()
                .map(|ch| {
                    if ch.is_whitespace() {
                        "&nbsp;".to_string()
                    } else {
                        ch.to_string()
                    }
                })
                .collect::<String>()
        })
        .into_owned()
}

pub(crate) fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(&lowercase))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}
