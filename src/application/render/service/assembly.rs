use tracing::warn;

use crate::application::render::theme::StyleMapping;

use super::rewrite::strip_leading_margin;

/// Badge slot above code blocks in the preview.
pub(crate) const PRE_BEFORE_STYLE: &str = "<style>.preview-wrapper pre::before { position: absolute; top: 0; right: 0; color: #ccc; text-align: center; font-size: 0.8em; padding: 5px 10px 0; line-height: 15px; height: 15px; font-weight: 600; }</style>";

/// Reveals the hidden three-dot decoration.
pub(crate) const MAC_SIGN_STYLE: &str =
    "<style>.hljs.code__pre > .mac-sign { display: flex; }</style>";

pub(crate) const CODE_BLOCK_STYLE: &str = "<style>.code__pre { padding: 0 !important; } .hljs.code__pre code { display: -webkit-box; padding: 0.5em 1em 1em; overflow-x: auto; text-indent: 0; }</style>";

/// Fragments joined into the final document.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct AssemblyParts<'a> {
    pub(crate) banner: &'a str,
    pub(crate) body: &'a str,
    pub(crate) footnotes: &'a str,
    pub(crate) mac_code_block: bool,
    /// Present when code was highlighted with classes rather than inline colours.
    pub(crate) highlight_stylesheet: Option<&'a str>,
}

/// Banner and body, first margin stripped, footnotes, fixed style blocks,
/// all inside the `container` section.
pub(crate) fn assemble(parts: AssemblyParts<'_>, styles: &StyleMapping) -> String {
    let leading = format!("{}{}", parts.banner, parts.body);
    let mut content = match strip_leading_margin(&leading) {
        Ok(html) => html,
        Err(err) => {
            warn!(
                target = "application::render::assembly",
                error = %err,
                "Keeping leading margin"
            );
            leading
        }
    };

    content.push_str(parts.footnotes);
    content.push_str(PRE_BEFORE_STYLE);
    if parts.mac_code_block {
        content.push_str(MAC_SIGN_STYLE);
    }
    content.push_str(CODE_BLOCK_STYLE);
    if let Some(stylesheet) = parts.highlight_stylesheet {
        content.push_str("<style>");
        content.push_str(stylesheet);
        content.push_str("</style>");
    }

    styles.styled_content("container", &content, Some("section"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::types::RenderConfiguration;

    fn styles() -> StyleMapping {
        StyleMapping::from_configuration(&RenderConfiguration::default())
    }

    #[test]
    fn wraps_everything_in_container() {
        let styles = styles();
        let html = assemble(
            AssemblyParts {
                body: "<p style=\"margin: 1em\">x</p>",
                footnotes: "<h4>refs</h4>",
                mac_code_block: true,
                ..Default::default()
            },
            &styles,
        );

        assert!(html.starts_with(&format!("<section {}>", styles.style_attr("container", ""))));
        assert!(html.ends_with("</section>"));
        assert!(html.contains("<p style=\"margin: 1em;margin-top: 0\">x</p><h4>refs</h4>"));
        assert!(html.contains(PRE_BEFORE_STYLE));
        assert!(html.contains(MAC_SIGN_STYLE));
        assert!(html.contains(CODE_BLOCK_STYLE));
    }

    #[test]
    fn banner_precedes_body_and_takes_margin_strip() {
        let html = assemble(
            AssemblyParts {
                banner: "<blockquote style=\"padding: 1em\">count</blockquote>",
                body: "<p style=\"margin: 1em\">x</p>",
                ..Default::default()
            },
            &styles(),
        );

        assert!(html.contains(
            "<blockquote style=\"padding: 1em;margin-top: 0\">count</blockquote><p style=\"margin: 1em\">x</p>"
        ));
        assert!(!html.contains(MAC_SIGN_STYLE));
    }

    #[test]
    fn classed_highlighting_ships_stylesheet() {
        let html = assemble(
            AssemblyParts {
                body: "<p>x</p>",
                highlight_stylesheet: Some(".hljs-keyword { color: red; }"),
                ..Default::default()
            },
            &styles(),
        );
        assert!(html.contains("<style>.hljs-keyword { color: red; }</style>"));
    }
}
