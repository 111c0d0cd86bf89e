//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::{level_filters::LevelFilter, warn};

use crate::application::render::{
    DEFAULT_CODE_THEME, DEFAULT_FONTS, DEFAULT_LEGEND, DEFAULT_SIZE, DEFAULT_THEME,
    RenderConfiguration, ThemeDescription,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "mpstyle";
pub(crate) const DEFAULT_MERMAID_CLI_PATH: &str = "mmdc";
pub(crate) const DEFAULT_MERMAID_CACHE_DIR: &str = "/tmp/mpstyle-mermaid";
/// Setting `render.code_theme` to this value selects classed highlighting.
const CLASSED_CODE_THEME: &str = "none";
const LEGEND_TOKENS: [&str; 2] = ["alt", "title"];

/// Command-line arguments for the mpstyle binary.
#[derive(Debug, Parser)]
#[command(
    name = "mpstyle",
    version,
    about = "Render Markdown into inline-styled HTML"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MPSTYLE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render a Markdown document.
    Render(Box<RenderArgs>),
    /// List the built-in themes.
    Themes(ThemesArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: RenderOverrides,

    /// Markdown document to render; `-` reads standard input.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Write the HTML here instead of standard output.
    #[arg(long, short = 'o', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ThemesArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Built-in theme name.
    #[arg(long = "theme", value_name = "NAME")]
    pub theme: Option<String>,

    /// JSON or TOML theme file layered over the built-in theme.
    #[arg(long = "theme-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub theme_file: Option<PathBuf>,

    /// Override the base font family.
    #[arg(long = "font-family", value_name = "FONTS")]
    pub fonts: Option<String>,

    /// Override the base font size, e.g. `15px`.
    #[arg(long = "font-size", value_name = "SIZE")]
    pub size: Option<String>,

    /// Indent paragraphs by two characters.
    #[arg(long = "indent", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub indent: Option<bool>,

    /// Turn links into numbered citations.
    #[arg(long = "cite", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub cite: Option<bool>,

    /// Image caption policy, e.g. `alt-title`, `title`, `none`.
    #[arg(long = "legend", value_name = "POLICY")]
    pub legend: Option<String>,

    /// Prepend the word count banner.
    #[arg(long = "count", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub count: Option<bool>,

    /// Show the window decoration on code blocks.
    #[arg(
        long = "mac-code-block",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub mac_code_block: Option<bool>,

    /// Syntax theme for inline colours; `none` emits classes and a stylesheet.
    #[arg(long = "code-theme", value_name = "NAME")]
    pub code_theme: Option<String>,

    /// Run the body through the HTML sanitizer.
    #[arg(long = "sanitize", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub sanitize: Option<bool>,

    /// Override the Mermaid CLI executable path used for diagram rendering.
    #[arg(long = "mermaid-cli-path", value_name = "PATH")]
    pub mermaid_cli_path: Option<PathBuf>,

    /// Override the directory used to cache rendered Mermaid diagrams.
    #[arg(long = "mermaid-cache-dir", value_name = "PATH")]
    pub mermaid_cache_dir: Option<PathBuf>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub theme: String,
    pub theme_file: Option<PathBuf>,
    pub fonts: String,
    pub size: String,
    pub is_use_indent: bool,
    pub cite_status: bool,
    pub legend: String,
    pub count_status: bool,
    pub mac_code_block: bool,
    pub code_theme: Option<String>,
    pub sanitize: bool,
    pub mermaid_cli_path: PathBuf,
    pub mermaid_cache_dir: PathBuf,
}

impl RenderSettings {
    /// Render configuration for an already resolved theme.
    pub fn to_configuration(&self, theme: ThemeDescription) -> RenderConfiguration {
        RenderConfiguration {
            theme,
            fonts: self.fonts.clone(),
            size: self.size.clone(),
            is_use_indent: self.is_use_indent,
            cite_status: self.cite_status,
            legend: self.legend.clone(),
            count_status: self.count_status,
            mac_code_block: self.mac_code_block,
            code_theme: self.code_theme.clone(),
            sanitize: self.sanitize,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("MPSTYLE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match &cli.command {
        Command::Render(args) => raw.apply_render_overrides(&args.overrides),
        Command::Themes(args) => raw.apply_logging_overrides(&args.logging),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        self.apply_logging_overrides(&overrides.logging);

        let render = &mut self.render;
        if let Some(theme) = overrides.theme.as_ref() {
            render.theme = Some(theme.clone());
        }
        if let Some(path) = overrides.theme_file.as_ref() {
            render.theme_file = Some(path.clone());
        }
        if let Some(fonts) = overrides.fonts.as_ref() {
            render.fonts = Some(fonts.clone());
        }
        if let Some(size) = overrides.size.as_ref() {
            render.size = Some(size.clone());
        }
        if let Some(indent) = overrides.indent {
            render.indent = Some(indent);
        }
        if let Some(cite) = overrides.cite {
            render.cite = Some(cite);
        }
        if let Some(legend) = overrides.legend.as_ref() {
            render.legend = Some(legend.clone());
        }
        if let Some(count) = overrides.count {
            render.count = Some(count);
        }
        if let Some(mac) = overrides.mac_code_block {
            render.mac_code_block = Some(mac);
        }
        if let Some(code_theme) = overrides.code_theme.as_ref() {
            render.code_theme = Some(code_theme.clone());
        }
        if let Some(sanitize) = overrides.sanitize {
            render.sanitize = Some(sanitize);
        }
        if let Some(path) = overrides.mermaid_cli_path.as_ref() {
            render.mermaid_cli_path = Some(path.clone());
        }
        if let Some(dir) = overrides.mermaid_cache_dir.as_ref() {
            render.mermaid_cache_dir = Some(dir.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, render } = raw;

        let logging = build_logging_settings(logging)?;
        let render = build_render_settings(render)?;

        Ok(Self { logging, render })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let theme = non_empty(render.theme).unwrap_or_else(|| DEFAULT_THEME.to_string());
    let fonts = non_empty(render.fonts).unwrap_or_else(|| DEFAULT_FONTS.to_string());
    let size = non_empty(render.size).unwrap_or_else(|| DEFAULT_SIZE.to_string());
    if !is_css_length(&size) {
        return Err(LoadError::invalid(
            "render.size",
            format!("`{size}` is not a CSS length"),
        ));
    }

    let legend = non_empty(render.legend).unwrap_or_else(|| DEFAULT_LEGEND.to_string());
    if !legend.split('-').any(|token| LEGEND_TOKENS.contains(&token)) {
        warn!(
            target = "config",
            legend = %legend,
            "Caption policy names neither `alt` nor `title`; images get no caption"
        );
    }

    let code_theme = match non_empty(render.code_theme) {
        Some(name) if name.eq_ignore_ascii_case(CLASSED_CODE_THEME) => None,
        Some(name) => Some(name),
        None => Some(DEFAULT_CODE_THEME.to_string()),
    };

    let mermaid_cli_path = render
        .mermaid_cli_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MERMAID_CLI_PATH));
    if mermaid_cli_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.mermaid_cli_path",
            "path must not be empty",
        ));
    }

    let mermaid_cache_dir = render
        .mermaid_cache_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MERMAID_CACHE_DIR));
    if mermaid_cache_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.mermaid_cache_dir",
            "path must not be empty",
        ));
    }

    Ok(RenderSettings {
        theme,
        theme_file: render.theme_file,
        fonts,
        size,
        is_use_indent: render.indent.unwrap_or(false),
        cite_status: render.cite.unwrap_or(false),
        legend,
        count_status: render.count.unwrap_or(false),
        mac_code_block: render.mac_code_block.unwrap_or(true),
        code_theme,
        sanitize: render.sanitize.unwrap_or(false),
        mermaid_cli_path,
        mermaid_cache_dir,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    theme: Option<String>,
    theme_file: Option<PathBuf>,
    fonts: Option<String>,
    size: Option<String>,
    indent: Option<bool>,
    cite: Option<bool>,
    legend: Option<String>,
    count: Option<bool>,
    mac_code_block: Option<bool>,
    code_theme: Option<String>,
    sanitize: Option<bool>,
    mermaid_cli_path: Option<PathBuf>,
    mermaid_cache_dir: Option<PathBuf>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn is_css_length(value: &str) -> bool {
    let digits_end = value
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(digits_end);
    !number.is_empty()
        && number.parse::<f64>().is_ok()
        && matches!(unit, "px" | "em" | "rem" | "pt" | "%")
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
