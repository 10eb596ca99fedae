use chatmd_babel::render::validator::TRUNCATION_MARKER;
use chatmd_babel::{
    CancellationToken, CircuitBreaker, CircuitState, CodeBlockMode, ErrorKind, InputValidator,
    MarkdownRenderer, RenderOptions, RenderResult,
};
use insta::assert_snapshot;
use std::sync::Arc;
use std::time::Duration;

fn render(markdown: &str) -> RenderResult {
    MarkdownRenderer::default().render(markdown, &RenderOptions::default())
}

fn success_html(result: RenderResult) -> String {
    match result {
        RenderResult::Success { html } => html,
        other => panic!("expected success, got {other:?}"),
    }
}

#[test]
fn heading_and_bold_snapshot() {
    let html = success_html(render("# Hello\n\nThis is **bold**."));
    assert_snapshot!(html.trim(), @r"
    <h1>Hello</h1>
    <p>This is <strong>bold</strong>.</p>
    ");
}

#[test]
fn chat_message_features_render() {
    let md = concat!(
        "Steps:\n",
        "first line\nsecond line\n\n",
        "- [x] done\n- [ ] todo\n\n",
        "| a | b |\n| --- | --- |\n| 1 | 2 |\n\n",
        "Visit https://example.com and ~~skip~~ this.\n\n",
        "```rust\nfn main() {}\n```\n\n",
        "Area $\\pi r^2$ and\n\n$$E = mc^2$$\n",
    );
    let html = success_html(render(md));

    assert!(html.contains("first line<br"));
    assert!(html.contains("type=\"checkbox\""));
    assert!(html.contains("<table>"));
    assert!(html.contains("<a href=\"https://example.com\""));
    assert!(html.contains("<del>skip</del>"));
    assert!(html.contains("<code class=\"language-rust\">"));
    assert!(html.contains("data-math-style=\"inline\""));
    assert!(html.contains("data-math-style=\"display\""));
}

#[test]
fn links_get_safe_rel() {
    let html = success_html(render("[site](https://example.com)"));
    assert!(html.contains("rel=\"noopener noreferrer\""));
}

#[test]
fn script_fails_with_harmless_fallback() {
    let result = render("<script>alert(1)</script>");
    assert_eq!(result.error(), Some(ErrorKind::DangerousContent));
    let RenderResult::Failure { fallback, .. } = result else {
        unreachable!()
    };
    assert!(!fallback.contains("<script"));
    assert!(!fallback.contains("alert"));
}

#[test]
fn fenced_script_renders_as_code() {
    let html = success_html(render("```html\n<script>alert(1)</script>\n```"));
    assert!(html.contains("&lt;script&gt;"));
    assert!(!html.contains("<script"));
}

#[test]
fn oversized_input_falls_back_to_truncated_text() {
    let options = RenderOptions {
        max_input_size: 20,
        ..RenderOptions::default()
    };
    let result = MarkdownRenderer::default().render(&"word ".repeat(100), &options);
    assert_eq!(result.error(), Some(ErrorKind::ContentTooLarge));
    assert!(result.html().contains(TRUNCATION_MARKER.trim()));
}

#[test]
fn deep_nesting_is_rejected() {
    let md = format!("{}x{}", "[".repeat(60), "]".repeat(60));
    assert_eq!(render(&md).error(), Some(ErrorKind::NestingTooDeep));

    let options = RenderOptions {
        max_nesting_depth: 100,
        ..RenderOptions::default()
    };
    let result = MarkdownRenderer::default().render(&md, &options);
    assert!(result.is_success());
}

#[test]
fn placeholder_mode_emits_summary_cards() {
    let options = RenderOptions {
        code_block_mode: CodeBlockMode::Placeholder,
        ..RenderOptions::default()
    };
    let md = "Before\n\n```python\nimport os\nprint(os.getcwd())\nexit()\n```\n";
    let html = success_html(MarkdownRenderer::default().render(md, &options));
    assert!(html.contains("python · 3 lines"));
    assert!(html.contains("chatmd-code-summary"));
    assert!(!html.contains("getcwd"));
}

#[test]
fn unsanitized_output_is_still_engine_safe() {
    let options = RenderOptions {
        sanitize: false,
        ..RenderOptions::default()
    };
    let html = success_html(MarkdownRenderer::default().render("<b>raw</b> text", &options));
    assert!(html.contains("raw HTML omitted"));
}

#[test]
fn cancellation_from_another_thread() {
    let renderer = MarkdownRenderer::default();
    let token = CancellationToken::new();
    let canceller = token.clone();
    std::thread::spawn(move || canceller.cancel()).join().unwrap();

    let result = renderer.render_with_cancel("# Title", &RenderOptions::default(), &token);
    assert_eq!(result.error(), Some(ErrorKind::RenderAborted));
    assert_eq!(renderer.breaker().failure_count(), 1);
}

#[test]
fn shared_breaker_opens_for_every_renderer() {
    let breaker = Arc::new(CircuitBreaker::new(2, Duration::from_secs(60)));
    let first = MarkdownRenderer::new(breaker.clone());
    let second = MarkdownRenderer::new(breaker.clone());
    let stalled = RenderOptions {
        timeout: Duration::ZERO,
        ..RenderOptions::default()
    };

    assert_eq!(first.render("a", &stalled).error(), Some(ErrorKind::RenderTimeout));
    assert_eq!(second.render("b", &stalled).error(), Some(ErrorKind::RenderTimeout));
    assert_eq!(breaker.state(), CircuitState::Open);

    let result = first.render("fine", &RenderOptions::default());
    assert_eq!(result.error(), Some(ErrorKind::CircuitOpen));

    breaker.reset();
    assert!(second.render("fine", &RenderOptions::default()).is_success());
}

#[test]
fn half_open_success_closes_the_circuit() {
    let breaker = Arc::new(CircuitBreaker::new(1, Duration::ZERO));
    let renderer = MarkdownRenderer::new(breaker.clone());
    let stalled = RenderOptions {
        timeout: Duration::ZERO,
        ..RenderOptions::default()
    };
    renderer.render("x", &stalled);
    assert_eq!(breaker.state(), CircuitState::Open);

    assert!(renderer.render("x", &RenderOptions::default()).is_success());
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[test]
fn validation_result_json_snapshot() {
    let result = InputValidator::new().validate("hi <script>x</script>", 1_000);
    let json = serde_json::to_string_pretty(&result).unwrap();
    assert_snapshot!(json, @r#"
    {
      "valid": false,
      "sanitized": "hi ",
      "error": "DANGEROUS_CONTENT"
    }
    "#);
}
