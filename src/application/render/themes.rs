//! Built-in themes embedded into the binary.

use include_dir::{Dir, include_dir};
use serde::Deserialize;

use super::theme::{ThemeDescription, ThemeError};

static BUILTIN_THEMES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/themes");

pub const DEFAULT_THEME: &str = "default";

/// Guards against `extends` cycles between embedded files.
const MAX_EXTENDS_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
struct BuiltinTheme {
    #[serde(default)]
    extends: Option<String>,
    #[serde(flatten)]
    theme: ThemeDescription,
}

/// Resolve a built-in theme by name, applying its `extends` chain.
pub fn builtin_theme(name: &str) -> Result<ThemeDescription, ThemeError> {
    resolve(name, 0)
}

fn resolve(name: &str, depth: usize) -> Result<ThemeDescription, ThemeError> {
    if depth > MAX_EXTENDS_DEPTH {
        return Err(ThemeError::Unknown(name.to_string()));
    }

    let file = BUILTIN_THEMES
        .get_file(format!("{name}.json"))
        .ok_or_else(|| ThemeError::Unknown(name.to_string()))?;
    let contents = file.contents_utf8().ok_or_else(|| ThemeError::Encoding {
        name: name.to_string(),
    })?;
    let parsed: BuiltinTheme = serde_json::from_str(contents)?;

    match parsed.extends.as_deref() {
        Some(parent) => Ok(resolve(parent, depth + 1)?.merged(&parsed.theme)),
        None => Ok(parsed.theme),
    }
}

/// Names of every embedded theme, sorted.
pub fn builtin_theme_names() -> Vec<String> {
    let mut names: Vec<String> = BUILTIN_THEMES
        .files()
        .filter(|file| file.path().extension().is_some_and(|ext| ext == "json"))
        .filter_map(|file| file.path().file_stem())
        .filter_map(|stem| stem.to_str())
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

/// The theme used when the caller does not pick one.
pub fn default_theme() -> ThemeDescription {
    builtin_theme(DEFAULT_THEME).expect("embedded default theme must be valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_embedded_themes() {
        let names = builtin_theme_names();
        for expected in ["default", "grace", "simple"] {
            assert!(names.iter().any(|name| name == expected), "missing {expected}");
        }
    }

    #[test]
    fn every_embedded_theme_resolves() {
        for name in builtin_theme_names() {
            let theme = builtin_theme(&name).expect("theme resolves");
            assert!(theme.block.contains_key("container"), "{name} has no container");
        }
    }

    #[test]
    fn extending_theme_keeps_parent_categories() {
        let default = default_theme();
        let grace = builtin_theme("grace").expect("grace");

        assert_ne!(default, grace);
        for category in default.block.keys() {
            assert!(grace.block.contains_key(category), "grace lost {category}");
        }
        assert_eq!(grace.base.get("line-height").map(String::as_str), Some("1.8"));
    }

    #[test]
    fn unknown_theme_is_an_error() {
        assert!(matches!(
            builtin_theme("does-not-exist"),
            Err(ThemeError::Unknown(name)) if name == "does-not-exist"
        ));
    }
}
