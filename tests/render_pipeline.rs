use mpstyle::application::render::{
    PartialConfiguration, RenderConfiguration, RenderSession, builtin_theme, default_theme,
};

fn load_markdown() -> String {
    include_str!("fixtures/article.md").to_string()
}

fn configuration(configure: impl FnOnce(&mut RenderConfiguration)) -> RenderConfiguration {
    let mut config = RenderConfiguration::new(default_theme());
    config.sanitize = false;
    configure(&mut config);
    config
}

fn session(configure: impl FnOnce(&mut RenderConfiguration)) -> RenderSession {
    RenderSession::new(configuration(configure))
}

#[test]
fn title_emphasis_and_citation_end_to_end() {
    let mut session = session(|config| config.cite_status = true);
    let output = session.render("# Title\n\nSome *text* with a [link](http://example.com).");
    let styles = session.style_mapping();

    assert!(output.html.starts_with("<section"), "{}", output.html);
    assert!(output.html.ends_with("</section>"), "{}", output.html);
    assert!(output.html.contains(">Title</h1>"), "{}", output.html);
    assert!(
        output
            .html
            .contains(&format!("<span {}>text</span>", styles.style_attr("em", ""))),
        "{}",
        output.html
    );
    assert!(output.html.contains("link<sup>[1]</sup></span>"), "{}", output.html);
    assert!(output.html.contains("引用链接"), "{}", output.html);
    assert!(
        output.html.contains("[1]</code> link: <i style=\"word-break: break-all\">http://example.com</i>"),
        "{}",
        output.html
    );

    assert_eq!(output.footnotes.len(), 1);
    assert_eq!(output.footnotes[0].index, 1);
    assert_eq!(output.footnotes[0].title, "link");
    assert_eq!(output.footnotes[0].link, "http://example.com");
}

#[test]
fn article_fixture_renders_every_block() {
    let mut session = session(|config| config.cite_status = true);
    let output = session.render(&load_markdown());
    let html = &output.html;

    assert_eq!(
        output.metadata.get("title").and_then(|value| value.as_str()),
        Some("Inline styles")
    );
    assert!(!html.contains("tags:"), "{html}");
    assert!(html.contains(">Inline styles</h1>"), "{html}");
    assert!(html.contains("comrak docs<sup>[1]</sup>"), "{html}");
    assert!(html.contains("syntect docs<sup>[2]</sup>"), "{html}");
    assert!(html.contains(">3. three</li>"), "{html}");
    assert!(html.contains(">4. four</li>"), "{html}");
    assert!(html.contains(">• apples</li>"), "{html}");
    assert!(html.contains("class=\"language-rust\""), "{html}");
    assert!(html.contains("<figure"), "{html}");
    assert!(html.contains(">cover</figcaption>"), "{html}");
    assert!(html.contains("<hr"), "{html}");
    assert!(html.contains("<table"), "{html}");
    assert!(html.contains("text-align: right"), "{html}");

    assert!(output.contains_code);
    assert!(!output.contains_mermaid);
    assert_eq!(output.footnotes[0].title, "comrak");
    assert_eq!(output.footnotes[1].title, "syntect docs");
}

#[test]
fn rendering_is_deterministic() {
    let markdown = load_markdown();
    let first = session(|config| config.cite_status = true).render(&markdown);
    let second = session(|config| config.cite_status = true).render(&markdown);
    assert_eq!(first.html, second.html);
    assert_eq!(first.footnotes, second.footnotes);
}

#[test]
fn reset_restarts_footnote_numbering() {
    let mut session = session(|config| config.cite_status = true);
    let markdown = "[a](https://a.test) and [b](https://b.test)";

    let first = session.render(markdown);
    assert_eq!(first.footnotes.len(), 2);

    session.reset(PartialConfiguration::default());
    let second = session.render("[c](https://c.test)");
    assert_eq!(second.footnotes.len(), 1);
    assert_eq!(second.footnotes[0].index, 1);
    assert!(second.html.contains("c<sup>[1]</sup>"), "{}", second.html);
}

#[test]
fn repeated_link_reuses_its_citation_index() {
    let mut session = session(|config| config.cite_status = true);
    let output = session.render("[a](https://a.test) then [a](https://a.test) and [b](https://b.test)");

    assert_eq!(output.html.matches("a<sup>[1]</sup>").count(), 2, "{}", output.html);
    assert!(output.html.contains("b<sup>[2]</sup>"), "{}", output.html);
    assert_eq!(output.footnotes.len(), 2);
}

#[test]
fn citations_off_never_register_footnotes() {
    let mut session = session(|config| config.cite_status = false);
    let output = session.render("[a](https://a.test) [b](https://b.test \"Bee\")");

    assert!(output.footnotes.is_empty());
    assert!(session.footnotes().is_empty());
    assert!(!output.html.contains("<sup>"), "{}", output.html);
    assert!(!output.html.contains("引用链接"), "{}", output.html);
}

#[test]
fn autolinks_never_emit_anchors() {
    let mut session = session(|config| config.cite_status = true);
    let output = session.render("Visit https://example.com today.");

    assert!(!output.html.contains("<a "), "{}", output.html);
    assert!(output.html.contains("https://example.com"), "{}", output.html);
    assert!(output.footnotes.is_empty());
}

#[test]
fn unknown_language_falls_back_to_plaintext() {
    let mut session = session(|_| {});
    let output = session.render("```klingon\nqapla'\n```\n");

    assert!(output.html.contains("class=\"language-plaintext\""), "{}", output.html);
    assert!(output.contains_code);
}

#[test]
fn reading_time_banner_follows_count_flag() {
    let markdown = "one two three four five";

    let off = session(|config| config.count_status = false).render(markdown);
    assert!(!off.html.contains("字数"), "{}", off.html);

    let on = session(|config| config.count_status = true).render(markdown);
    assert!(on.html.contains("字数 5，阅读大约需 1 分钟"), "{}", on.html);
    assert_eq!(on.metrics.words, 5);
}

#[test]
fn ordered_prefixes_follow_the_start_number() {
    let output = session(|_| {}).render("3. first\n4. second\n");
    assert!(output.html.contains(">3. first</li>"), "{}", output.html);
    assert!(output.html.contains(">4. second</li>"), "{}", output.html);
}

#[test]
fn bullet_items_are_prefixed() {
    let output = session(|_| {}).render("* one\n* two\n");
    assert!(output.html.contains(">• one</li>"), "{}", output.html);
    assert!(output.html.contains(">• two</li>"), "{}", output.html);
}

#[test]
fn indent_applies_unless_theme_sets_one() {
    let indented = session(|config| config.is_use_indent = true);
    assert_eq!(
        indented
            .style_mapping()
            .get("p")
            .and_then(|p| p.get("text-indent"))
            .map(String::as_str),
        Some("2em")
    );

    let plain = session(|config| config.is_use_indent = false);
    assert!(
        plain
            .style_mapping()
            .get("p")
            .and_then(|p| p.get("text-indent"))
            .is_none()
    );
}

#[test]
fn empty_partial_changes_nothing() {
    let mut session = session(|config| config.cite_status = true);
    let config_before = session.config().clone();
    let styles_before = session.style_mapping().clone();

    session.set_options(PartialConfiguration::default());

    assert_eq!(session.config(), &config_before);
    assert_eq!(session.style_mapping(), &styles_before);
}

#[test]
fn switching_theme_restyles_output() {
    let mut session = session(|_| {});
    let before = session.render("# Heading").html;

    session.set_options(PartialConfiguration {
        theme: Some(builtin_theme("grace").expect("grace theme")),
        ..Default::default()
    });
    let after = session.render("# Heading").html;

    assert_ne!(before, after);
}

#[test]
fn image_fallback_survives_default_render() {
    let mut session = RenderSession::new(RenderConfiguration::default());
    let output = session.render("![x](https://example.com/x.png)");

    assert!(!session.config().sanitize);
    assert!(output.html.contains("onerror=\"this.onerror=null;"), "{}", output.html);
}

#[test]
fn sanitizer_drops_scripts_and_keeps_styles() {
    let mut session = session(|config| config.sanitize = true);
    let output = session.render("hello\n\n<script>alert(1)</script>\n\n![x](https://example.com/x.png)");

    assert!(!output.html.contains("<script"), "{}", output.html);
    assert!(!output.html.contains("onerror"), "{}", output.html);
    assert!(output.html.contains("style=\""), "{}", output.html);
    assert!(output.html.contains("hello"), "{}", output.html);
}
