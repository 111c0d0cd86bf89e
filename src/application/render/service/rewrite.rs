use std::{cell::Cell, rc::Rc};

use lol_html::{RewriteStrSettings, element, rewrite_str};

use crate::application::render::types::RenderError;

/// Give every `<p>` inside a quote the quote paragraph style. When the theme
/// has no such style the paragraph's own style is removed. Titles of nested
/// alerts keep their own style.
pub(crate) fn restyle_paragraphs(html: &str, style: Option<&str>) -> Result<String, RenderError> {
    let style = style.map(str::to_string);

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("p:not(.markdown-alert-title)", move |el| {
                match &style {
                    Some(value) => el.set_attribute("style", value)?,
                    None => el.remove_attribute("style"),
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Document {
        message: format!("failed to restyle quoted paragraphs: {err}"),
    })
}

/// Append `;margin-top: 0` to the first element carrying a `style` attribute.
pub(crate) fn strip_leading_margin(html: &str) -> Result<String, RenderError> {
    let done = Rc::new(Cell::new(false));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*[style]", {
                let done = Rc::clone(&done);
                move |el| {
                    if done.get() {
                        return Ok(());
                    }
                    if let Some(style) = el.get_attribute("style") {
                        el.set_attribute("style", &format!("{style};margin-top: 0"))?;
                        done.set(true);
                    }
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Document {
        message: format!("failed to strip leading margin: {err}"),
    })
}
