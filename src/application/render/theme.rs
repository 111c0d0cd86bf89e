//! Theme descriptions and the per-category style mapping derived from them.

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::escape::escape_attribute;
use super::types::RenderConfiguration;

/// CSS property name → value.
pub type CssProperties = BTreeMap<String, String>;

pub const PARAGRAPH_CATEGORY: &str = "p";
const INDENT_PROPERTY: &str = "text-indent";
const INDENT_VALUE: &str = "2em";

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("unknown theme `{0}`")]
    Unknown(String),
    #[error("theme `{name}` is not valid UTF-8")]
    Encoding { name: String },
    #[error("failed to parse JSON theme: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse TOML theme: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to read theme file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported theme file extension: {path}")]
    UnsupportedFormat { path: String },
}

/// Raw theme input: shared `base` properties plus inline and block categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeDescription {
    pub base: CssProperties,
    pub inline: BTreeMap<String, CssProperties>,
    pub block: BTreeMap<String, CssProperties>,
}

impl ThemeDescription {
    pub fn from_json(source: &str) -> Result<Self, ThemeError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_toml(source: &str) -> Result<Self, ThemeError> {
        Ok(toml::from_str(source)?)
    }

    /// Load a theme file, choosing the format from its extension.
    pub fn load(path: &Path) -> Result<Self, ThemeError> {
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| ThemeError::Io {
            path: display.clone(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json(&contents),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml(&contents),
            _ => Err(ThemeError::UnsupportedFormat { path: display }),
        }
    }

    /// Overlay `other` onto `self`, category by category. Properties from
    /// `other` win; categories missing from `other` are kept untouched.
    pub fn merged(&self, other: &ThemeDescription) -> ThemeDescription {
        ThemeDescription {
            base: merge_properties(&self.base, &other.base),
            inline: merge_categories(&self.inline, &other.inline),
            block: merge_categories(&self.block, &other.block),
        }
    }
}

/// Merge two property maps; `overrides` wins on key collision.
pub fn merge_properties(base: &CssProperties, overrides: &CssProperties) -> CssProperties {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn merge_categories(
    base: &BTreeMap<String, CssProperties>,
    overrides: &BTreeMap<String, CssProperties>,
) -> BTreeMap<String, CssProperties> {
    let mut merged = base.clone();
    for (category, properties) in overrides {
        let combined = match merged.get(category) {
            Some(existing) => merge_properties(existing, properties),
            None => properties.clone(),
        };
        merged.insert(category.clone(), combined);
    }
    merged
}

/// Serialize properties as `name: value; name: value`.
pub fn serialize_properties(properties: &CssProperties) -> String {
    properties
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Computed styles for every category of a theme.
///
/// Always rebuilt from scratch from a configuration; never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleMapping {
    entries: BTreeMap<String, CssProperties>,
    /// Category properties before `base` was merged in.
    declared: BTreeMap<String, CssProperties>,
}

impl StyleMapping {
    /// Materialize `theme` with the caller's font family, font size and
    /// paragraph indent preference.
    pub fn build(theme: &ThemeDescription, fonts: &str, size: &str, is_use_indent: bool) -> Self {
        let mut theme = theme.clone();

        let mut font_overrides = CssProperties::new();
        font_overrides.insert("font-family".to_string(), fonts.to_string());
        font_overrides.insert("font-size".to_string(), size.to_string());
        let base = merge_properties(&theme.base, &font_overrides);

        if is_use_indent {
            let mut indent = CssProperties::new();
            indent.insert(INDENT_PROPERTY.to_string(), INDENT_VALUE.to_string());
            let paragraph = theme
                .block
                .get(PARAGRAPH_CATEGORY)
                .map(|existing| merge_properties(&indent, existing))
                .unwrap_or(indent);
            theme.block.insert(PARAGRAPH_CATEGORY.to_string(), paragraph);
        }

        // Block categories are applied last so they win over an inline
        // category of the same name.
        let declared: BTreeMap<String, CssProperties> = theme
            .inline
            .into_iter()
            .chain(theme.block)
            .collect();
        let entries = declared
            .iter()
            .map(|(category, properties)| (category.clone(), merge_properties(&base, properties)))
            .collect();

        Self { entries, declared }
    }

    pub fn from_configuration(config: &RenderConfiguration) -> Self {
        Self::build(
            &config.theme,
            &config.fonts,
            &config.size,
            config.is_use_indent,
        )
    }

    pub fn get(&self, category: &str) -> Option<&CssProperties> {
        self.entries.get(category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.entries.contains_key(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialized declarations for `category`, without the attribute wrapper.
    pub fn style_value(&self, category: &str) -> Option<String> {
        self.entries.get(category).map(serialize_properties)
    }

    /// `style="..."` for `category` with `suffix` appended verbatim, or an
    /// empty string when the theme does not define the category.
    pub fn style_attr(&self, category: &str, suffix: &str) -> String {
        match self.style_value(category) {
            Some(value) => format!("style=\"{}\"", escape_attribute(&format!("{value}{suffix}"))),
            None => String::new(),
        }
    }

    /// Declarations of the first defined category among `categories`,
    /// refined by the declared properties of the defined categories after it.
    pub fn combined_style_value(&self, categories: &[&str]) -> Option<String> {
        let mut combined: Option<CssProperties> = None;
        for category in categories {
            combined = match (combined, self.entries.get(*category)) {
                (None, Some(computed)) => Some(computed.clone()),
                (Some(existing), Some(_)) => {
                    let declared = self.declared.get(*category).cloned().unwrap_or_default();
                    Some(merge_properties(&existing, &declared))
                }
                (existing, None) => existing,
            };
        }
        combined.as_ref().map(serialize_properties)
    }

    /// [`style_attr`](Self::style_attr) over
    /// [`combined_style_value`](Self::combined_style_value).
    pub fn combined_style_attr(&self, categories: &[&str], suffix: &str) -> String {
        match self.combined_style_value(categories) {
            Some(value) => format!("style=\"{}\"", escape_attribute(&format!("{value}{suffix}"))),
            None => String::new(),
        }
    }

    /// Wrap `content` in `tag` (defaults to the category name) styled as `category`.
    pub fn styled_content(&self, category: &str, content: &str, tag: Option<&str>) -> String {
        let tag = tag.unwrap_or(category);
        format!(
            "<{tag}{}>{content}</{tag}>",
            with_leading_space(&self.style_attr(category, ""))
        )
    }
}

/// Prefix a non-empty attribute string with a space so it can follow a tag name.
pub(crate) fn with_leading_space(attribute: &str) -> String {
    if attribute.is_empty() {
        String::new()
    } else {
        format!(" {attribute}")
    }
}
