use std::{
    collections::HashMap,
    fs,
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
    time::Instant,
};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::render::escape::unescape_html;

static MERMAID_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<pre class="mermaid">(.*?)</pre>"#).expect("placeholder pattern must compile")
});

/// Arguments that shape the SVG; part of the cache key.
const CLI_ARGS: [&str; 8] = [
    "--input",
    "-",
    "--output",
    "-",
    "--outputFormat",
    "svg",
    "--backgroundColor",
    "transparent",
];

#[derive(Debug, Error)]
pub enum MermaidRenderError {
    #[error("failed to prepare diagram cache {path}: {source}")]
    CacheDir { path: PathBuf, source: io::Error },
    #[error("mermaid CLI not found: {0}")]
    Missing(io::Error),
    #[error("failed to talk to mermaid CLI: {0}")]
    Pipe(io::Error),
    #[error("mermaid CLI exited with {exit_code:?}: {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("mermaid CLI produced no SVG")]
    NotSvg,
}

/// Replaces the `<pre class="mermaid">` placeholders left by the element
/// renderer with SVG figures produced by the Mermaid CLI. Each distinct
/// diagram source is rendered once and cached on disk by its hash.
#[derive(Debug, Clone)]
pub struct MermaidRenderer {
    cli_path: PathBuf,
    cache_dir: PathBuf,
}

impl MermaidRenderer {
    pub fn new(cli_path: PathBuf, cache_dir: PathBuf) -> Result<Self, MermaidRenderError> {
        fs::create_dir_all(&cache_dir).map_err(|source| MermaidRenderError::CacheDir {
            path: cache_dir.clone(),
            source,
        })?;
        Ok(Self {
            cli_path,
            cache_dir,
        })
    }

    /// Swap every placeholder in `html` for a `diagram-mermaid` figure.
    /// A placeholder whose diagram fails to render stays as it is.
    pub fn render_placeholders(&self, html: &str) -> String {
        let started_at = Instant::now();
        let mut diagrams: HashMap<String, Option<String>> = HashMap::new();

        let output = MERMAID_PLACEHOLDER.replace_all(html, |caps: &Captures<'_>| {
            let source = unescape_html(&caps[1]);
            let svg = diagrams
                .entry(source)
                .or_insert_with_key(|source| match self.diagram_svg(source) {
                    Ok(svg) => Some(svg),
                    Err(err) => {
                        warn!(
                            target = "application::render::mermaid",
                            op = "mermaid::render_placeholders",
                            error = %err,
                            "Leaving Mermaid placeholder in place"
                        );
                        None
                    }
                });
            match svg {
                Some(svg) => format!("<figure data-role=\"diagram-mermaid\">{svg}</figure>"),
                None => caps[0].to_string(),
            }
        });

        let failed = diagrams.values().filter(|svg| svg.is_none()).count();
        info!(
            target = "application::render::mermaid",
            op = "mermaid::render_placeholders",
            diagrams = diagrams.len(),
            failed,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Mermaid placeholders processed"
        );

        output.into_owned()
    }

    /// SVG for one diagram source, from the cache when present.
    pub fn diagram_svg(&self, source: &str) -> Result<String, MermaidRenderError> {
        let cache_path = self.cache_dir.join(format!("{}.svg", cache_key(source)));
        match fs::read_to_string(&cache_path) {
            Ok(svg) => {
                debug!(
                    target = "application::render::mermaid",
                    op = "mermaid::diagram_svg",
                    cache_path = %cache_path.display(),
                    "Mermaid diagram served from cache"
                );
                return Ok(svg);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                target = "application::render::mermaid",
                op = "mermaid::diagram_svg",
                cache_path = %cache_path.display(),
                error = %err,
                "Unreadable cache entry; rendering again"
            ),
        }

        let svg = self.run_cli(source)?;
        if let Err(err) = store(&self.cache_dir, &cache_path, &svg) {
            warn!(
                target = "application::render::mermaid",
                op = "mermaid::diagram_svg",
                cache_path = %cache_path.display(),
                error = %err,
                "Failed to cache Mermaid diagram"
            );
        }
        Ok(svg)
    }

    /// Feed the source on stdin and read the SVG from stdout.
    fn run_cli(&self, source: &str) -> Result<String, MermaidRenderError> {
        let mut child = Command::new(&self.cli_path)
            .args(CLI_ARGS)
            .arg("--quiet")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => MermaidRenderError::Missing(err),
                _ => MermaidRenderError::Pipe(err),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MermaidRenderError::Pipe(io::Error::other("stdin not captured")))?;
        let input = source.to_owned();
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output().map_err(MermaidRenderError::Pipe)?;
        let written = writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));

        if !output.status.success() {
            return Err(MermaidRenderError::Cli {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written.map_err(MermaidRenderError::Pipe)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.find("<svg") {
            Some(start) => Ok(stdout[start..].trim_end().to_string()),
            None => Err(MermaidRenderError::NotSvg),
        }
    }
}

fn cache_key(source: &str) -> String {
    let mut hasher = Sha256::new();
    for arg in CLI_ARGS {
        hasher.update(arg.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

fn store(cache_dir: &Path, cache_path: &Path, svg: &str) -> io::Result<()> {
    let mut file = NamedTempFile::new_in(cache_dir)?;
    file.write_all(svg.as_bytes())?;
    file.persist(cache_path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const PLACEHOLDER: &str = "<pre class=\"mermaid\">graph TD; A--&gt;B</pre>";

    fn fake_cli(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-mmdc");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path
    }

    /// Fake CLI that wraps its stdin in `<svg>` and logs each run.
    fn echo_cli(dir: &Path) -> (PathBuf, PathBuf) {
        let log = dir.join("runs.log");
        let script = format!(
            "input=$(cat)\necho run >> \"{}\"\nprintf '<svg>%s</svg>\\n' \"$input\"",
            log.display()
        );
        (fake_cli(dir, &script), log)
    }

    fn runs(log: &Path) -> usize {
        fs::read_to_string(log)
            .map(|text| text.lines().count())
            .unwrap_or(0)
    }

    #[test]
    fn placeholder_becomes_figure_with_unescaped_source() {
        let dir = TempDir::new().expect("temp dir");
        let (cli, _) = echo_cli(dir.path());
        let renderer = MermaidRenderer::new(cli, dir.path().join("cache")).expect("renderer");

        let html = renderer.render_placeholders(&format!("<p>before</p>{PLACEHOLDER}<p>after</p>"));

        assert_eq!(
            html,
            "<p>before</p><figure data-role=\"diagram-mermaid\"><svg>graph TD; A-->B</svg></figure><p>after</p>"
        );
    }

    #[test]
    fn repeated_diagram_runs_the_cli_once() {
        let dir = TempDir::new().expect("temp dir");
        let (cli, log) = echo_cli(dir.path());
        let renderer = MermaidRenderer::new(cli, dir.path().join("cache")).expect("renderer");

        let html = renderer.render_placeholders(&format!("{PLACEHOLDER}<hr />{PLACEHOLDER}"));

        assert_eq!(html.matches("diagram-mermaid").count(), 2, "{html}");
        assert_eq!(runs(&log), 1);
    }

    #[test]
    fn cached_diagram_needs_no_cli() {
        let dir = TempDir::new().expect("temp dir");
        let cache = dir.path().join("cache");
        let (cli, _) = echo_cli(dir.path());
        let first = MermaidRenderer::new(cli, cache.clone())
            .expect("renderer")
            .render_placeholders(PLACEHOLDER);

        let offline = MermaidRenderer::new(dir.path().join("does-not-exist"), cache)
            .expect("renderer");
        assert_eq!(offline.render_placeholders(PLACEHOLDER), first);
    }

    #[test]
    fn failing_cli_keeps_placeholder() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(dir.path(), "cat > /dev/null\necho \"parse error\" >&2\nexit 3");
        let renderer = MermaidRenderer::new(cli, dir.path().join("cache")).expect("renderer");

        assert_eq!(renderer.render_placeholders(PLACEHOLDER), PLACEHOLDER);
        match renderer.diagram_svg("graph TD; A-->B") {
            Err(MermaidRenderError::Cli { exit_code, stderr }) => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "parse error");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn output_without_svg_keeps_placeholder() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(dir.path(), "cat > /dev/null\necho nothing here");
        let renderer = MermaidRenderer::new(cli, dir.path().join("cache")).expect("renderer");

        assert_eq!(renderer.render_placeholders(PLACEHOLDER), PLACEHOLDER);
        assert!(matches!(
            renderer.diagram_svg("graph TD; A-->B"),
            Err(MermaidRenderError::NotSvg)
        ));
    }

    #[test]
    fn missing_cli_keeps_placeholder() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = MermaidRenderer::new(
            dir.path().join("does-not-exist"),
            dir.path().join("cache"),
        )
        .expect("renderer");

        assert_eq!(renderer.render_placeholders(PLACEHOLDER), PLACEHOLDER);
        assert!(matches!(
            renderer.diagram_svg("graph TD; A-->B"),
            Err(MermaidRenderError::Missing(_))
        ));
    }
}
