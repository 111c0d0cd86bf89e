use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use syntect::dumps::dump_to_uncompressed_file;
use syntect::highlighting::ThemeSet;
use syntect::html::{ClassStyle, css_for_theme_with_class_style};
use two_face::syntax;
use walkdir::WalkDir;

/// Palette used for class-based highlighting when no inline code theme is selected.
const CLASSED_THEME: &str = "InspiredGitHub";

fn main() {
    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(err) => panic!("OUT_DIR not set: {err}"),
    };

    write_syntax_pack(&out_dir).expect("failed to write syntax pack");
    write_highlight_css(&out_dir).expect("failed to write highlight stylesheet");

    let themes_dir = Path::new("themes");
    println!("cargo:rerun-if-changed={}", themes_dir.display());
    if themes_dir.is_dir() {
        for entry in WalkDir::new(themes_dir).into_iter().flatten() {
            println!("cargo:rerun-if-changed={}", entry.path().display());
        }
    }
}

fn write_highlight_css(out_dir: &Path) -> Result<(), String> {
    let theme_set = ThemeSet::load_defaults();
    let theme = theme_set
        .themes
        .get(CLASSED_THEME)
        .ok_or_else(|| format!("theme `{CLASSED_THEME}` not found"))?;

    let css = css_for_theme_with_class_style(theme, ClassStyle::SpacedPrefixed { prefix: "hljs-" })
        .map_err(|err| err.to_string())?;

    let css_path = out_dir.join("highlight.css");
    fs::write(&css_path, css)
        .map_err(|err| format!("failed to write {}: {err}", css_path.display()))?;

    println!("cargo:rustc-env=HIGHLIGHT_CSS_FILE={}", css_path.display());

    Ok(())
}

fn write_syntax_pack(out_dir: &Path) -> Result<(), String> {
    let syntax_set = syntax::extra_newlines();
    let pack_path = out_dir.join("syntaxes.packdump");
    dump_to_uncompressed_file(&syntax_set, &pack_path)
        .map_err(|err| format!("failed to encode syntax set: {err}"))?;

    println!("cargo:rustc-env=SYNTAX_PACK_FILE={}", pack_path.display());

    Ok(())
}
