use std::{borrow::Cow, collections::HashSet};

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::Options;

/// Markdown dialect accepted by the editor: GFM plus alerts and dollar math.
pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = false;
    ext.alerts = true;
    ext.math_dollars = true;

    // Raw HTML is passed through by the element renderers and cleaned by the
    // sanitizer afterwards.
    options.render.r#unsafe = true;

    options
}

/// Sanitizer for rendered bodies: keeps inline styles (filtered), the mac-sign
/// SVG and every tag the element renderers emit.
pub(crate) fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "blockquote",
        "br",
        "code",
        "del",
        "div",
        "em",
        "figcaption",
        "figure",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "i",
        "img",
        "input",
        "li",
        "ol",
        "p",
        "pre",
        "s",
        "section",
        "span",
        "strong",
        "sub",
        "sup",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "u",
        "ul",
        "svg",
        "ellipse",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "style",
        "class",
        "hidden",
        "title",
        "role",
        "aria-hidden",
        "data-role",
        "data-language",
    ]);
    builder.generic_attributes(generic);

    builder.add_tag_attributes("a", &["target"]);
    builder.add_tag_attributes("img", &["alt", "width", "height"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.add_tag_attributes("td", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes("th", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes(
        "svg",
        &["xmlns", "version", "x", "y", "width", "height", "viewBox"],
    );
    builder.add_tag_attributes(
        "ellipse",
        &["cx", "cy", "rx", "ry", "stroke", "stroke-width", "fill"],
    );

    builder.add_url_schemes(["http", "https", "mailto", "tel"].iter().copied());

    builder.attribute_filter(|_element, attribute, value| {
        if attribute.eq_ignore_ascii_case("style") {
            sanitize_style_attribute(value).map(Cow::Owned)
        } else {
            Some(Cow::Borrowed(value))
        }
    });

    builder
}

fn sanitize_style_attribute(value: &str) -> Option<String> {
    let sanitized: Vec<&str> = value
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| is_safe_style_declaration(decl))
        .collect();

    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized.join("; "))
    }
}

fn is_safe_style_declaration(decl: &str) -> bool {
    let lower = decl.to_ascii_lowercase();

    const FORBIDDEN_SUBSTRINGS: [&str; 7] = [
        "expression(",
        "javascript:",
        "vbscript:",
        "-moz-binding",
        "behavior:",
        "behaviour:",
        "@import",
    ];

    if FORBIDDEN_SUBSTRINGS
        .iter()
        .any(|needle| lower.contains(needle))
    {
        return false;
    }

    !contains_unsafe_url(&lower)
}

fn contains_unsafe_url(lower_decl: &str) -> bool {
    let mut offset = 0;

    while let Some(start) = lower_decl[offset..].find("url(") {
        let open = offset + start + 4;
        let rest = &lower_decl[open..];
        let Some(close_rel) = rest.find(')') else {
            // unterminated url(
            return true;
        };
        let close = open + close_rel;
        let target = lower_decl[open..close]
            .trim_matches(|c: char| c.is_whitespace() || c == '\'')
            .trim_matches('"');

        if is_unsafe_url(target) {
            return true;
        }

        offset = close + 1;
    }

    false
}

fn is_unsafe_url(url: &str) -> bool {
    if url.starts_with("data:image/") {
        return false;
    }

    url.starts_with("data:")
        || url.starts_with("file:")
        || url.contains("javascript:")
        || url.contains("vbscript:")
}

#[cfg(test)]
mod tests {
    use super::{build_sanitizer, contains_unsafe_url, sanitize_style_attribute};

    #[test]
    fn sanitize_style_attribute_preserves_safe_rules() {
        let output = sanitize_style_attribute("color: red; padding: 4px;");
        assert_eq!(output.as_deref(), Some("color: red; padding: 4px"));
    }

    #[test]
    fn sanitize_style_attribute_drops_unsafe_rules() {
        let input = "color: red; background: url('javascript:alert(1)'); expression(test);";
        assert_eq!(sanitize_style_attribute(input).as_deref(), Some("color: red"));
    }

    #[test]
    fn sanitize_style_attribute_returns_none_when_only_unsafe() {
        let input = "background-image: url('javascript:alert(1)');";
        assert!(sanitize_style_attribute(input).is_none());
    }

    #[test]
    fn detects_unsafe_urls() {
        assert!(contains_unsafe_url("background:url(javascript:alert(1))"));
        assert!(!contains_unsafe_url(
            "background:url('https://example.com/bg.png')"
        ));
        assert!(!contains_unsafe_url(
            "background:url('data:image/png;base64,AAAA')"
        ));
    }

    #[test]
    fn keeps_inline_styles_and_strips_handlers() {
        let html = build_sanitizer()
            .clean(
                "<p style=\"color: red; margin: 0\">hi</p><img src=\"https://x.test/a.png\" onerror=\"alert(1)\">",
            )
            .to_string();

        assert!(html.contains("style=\"color: red; margin: 0\""));
        assert!(html.contains("src=\"https://x.test/a.png\""));
        assert!(!html.contains("onerror"));
    }

    #[test]
    fn keeps_mac_sign_decoration() {
        let html = build_sanitizer()
            .clean(
                "<pre class=\"hljs code__pre\"><span class=\"mac-sign\" hidden><svg width=\"45px\" viewBox=\"0 0 450 130\"><ellipse cx=\"50\" cy=\"65\" rx=\"50\" ry=\"52\" fill=\"red\"></ellipse></svg></span><code>x</code></pre>",
            )
            .to_string();

        assert!(html.contains("class=\"mac-sign\""));
        assert!(html.contains("hidden"));
        assert!(html.contains("<ellipse"));
    }

    #[test]
    fn drops_script_tags() {
        let html = build_sanitizer()
            .clean("<p>ok</p><script>alert(1)</script>")
            .to_string();
        assert_eq!(html, "<p>ok</p>");
    }

    #[test]
    fn preserves_strikethrough() {
        let html = build_sanitizer()
            .clean("<p><del>Removed</del> text</p>")
            .to_string();
        assert!(html.contains("<del>Removed</del>"));
    }
}
