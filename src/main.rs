use std::{
    path::Path,
    process,
    sync::Arc,
    time::Duration,
};

use mpstyle::{
    application::{
        error::AppError,
        render::{
            MermaidRenderer, NotifyRunner, RenderSession, ThemeDescription, builtin_theme,
            builtin_theme_names,
        },
    },
    config::{self, RenderArgs, RenderSettings, Settings},
    infra::{error::InfraError, telemetry},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

/// Upper bound on waiting for the debounced diagram trigger.
const DIAGRAM_WAIT: Duration = Duration::from_secs(2);
const STDIN_PATH: &str = "-";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Render(args) => run_render(settings, *args).await,
        config::Command::Themes(_) => run_themes().await,
    }
}

async fn run_render(settings: Settings, args: RenderArgs) -> Result<(), AppError> {
    let markdown = read_input(&args.input).await?;
    let theme = resolve_theme(&settings.render)?;

    let runner = NotifyRunner::new();
    let diagrams_ready = runner.notify();
    let mut session = RenderSession::new(settings.render.to_configuration(theme))
        .with_diagram_runner(Arc::new(runner));

    let output = session.render(&markdown);
    info!(
        target = "mpstyle::render",
        input = %args.input.display(),
        words = output.metrics.words,
        footnotes = output.footnotes.len(),
        contains_mermaid = output.contains_mermaid,
        "Document rendered"
    );

    let html = if output.contains_mermaid {
        if tokio::time::timeout(DIAGRAM_WAIT, diagrams_ready.notified())
            .await
            .is_err()
        {
            warn!(
                target = "mpstyle::render",
                "Diagram trigger did not fire in time; rendering diagrams anyway"
            );
        }
        render_diagrams(&settings.render, output.html).await?
    } else {
        output.html
    };

    write_output(args.output.as_deref(), &html).await
}

async fn run_themes() -> Result<(), AppError> {
    let mut listing = builtin_theme_names().join("\n");
    listing.push('\n');
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(listing.as_bytes())
        .await
        .map_err(InfraError::from)?;
    stdout.flush().await.map_err(InfraError::from)?;
    Ok(())
}

/// Built-in theme, with the optional theme file layered over it.
fn resolve_theme(render: &RenderSettings) -> Result<ThemeDescription, AppError> {
    let base = builtin_theme(&render.theme)?;
    match render.theme_file.as_ref() {
        Some(path) => {
            let overlay = ThemeDescription::load(path)?;
            Ok(base.merged(&overlay))
        }
        None => Ok(base),
    }
}

/// Swap Mermaid placeholders for SVG; the CLI call blocks, so it runs off the runtime.
async fn render_diagrams(render: &RenderSettings, html: String) -> Result<String, AppError> {
    let renderer = match MermaidRenderer::new(
        render.mermaid_cli_path.clone(),
        render.mermaid_cache_dir.clone(),
    ) {
        Ok(renderer) => renderer,
        Err(err) => {
            warn!(
                target = "mpstyle::render",
                error = %err,
                "Mermaid renderer unavailable; keeping diagram placeholders"
            );
            return Ok(html);
        }
    };

    tokio::task::spawn_blocking(move || renderer.render_placeholders(&html))
        .await
        .map_err(|err| AppError::from(InfraError::diagram(err.to_string())))
}

async fn read_input(path: &Path) -> Result<String, AppError> {
    if path == Path::new(STDIN_PATH) {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .map_err(InfraError::from)?;
        return Ok(buffer);
    }

    let bytes = tokio::fs::read(path).await.map_err(InfraError::from)?;
    String::from_utf8(bytes).map_err(|_| {
        AppError::validation(format!("{} is not valid UTF-8", path.display()))
    })
}

async fn write_output(path: Option<&Path>, html: &str) -> Result<(), AppError> {
    match path {
        Some(path) => {
            tokio::fs::write(path, html)
                .await
                .map_err(InfraError::from)?;
            info!(
                target = "mpstyle::render",
                output = %path.display(),
                bytes = html.len(),
                "HTML written"
            );
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(html.as_bytes())
                .await
                .map_err(InfraError::from)?;
            stdout.write_all(b"\n").await.map_err(InfraError::from)?;
            stdout.flush().await.map_err(InfraError::from)?;
        }
    }
    Ok(())
}
