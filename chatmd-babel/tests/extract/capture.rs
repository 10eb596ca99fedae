use crate::common::{strip_tags, KATEX_BLOCK, KATEX_INLINE};
use chatmd_babel::extract::code::fenced_block;
use chatmd_babel::extract::table::format_pipe_table;
use chatmd_babel::{
    CapturePipeline, CodeExtractor, Extractor, MathExtractor, PlaceholderKind, TableParser,
};
use insta::assert_snapshot;

fn message_html() -> String {
    format!(
        concat!(
            "<p>Intro</p>",
            "<pre><code class=\"language-rust\">fn main() {{\n    println!(\"hi\");\n}}</code></pre>",
            "<table><tr><th>k</th><th>v</th></tr><tr><td>a</td><td>1</td></tr></table>",
            "<p>Inline {} and a block:</p>",
            "{}"
        ),
        KATEX_INLINE, KATEX_BLOCK
    )
}

#[test]
fn capture_preserves_every_construct() {
    let markdown = CapturePipeline::new().capture(&message_html(), &strip_tags);

    assert!(markdown.contains("Intro"));
    assert!(markdown.contains("```rust\nfn main() {\n    println!(\"hi\");\n}\n```"));
    assert!(markdown.contains("| k | v |\n| --- | --- |\n| a | 1 |"));
    assert!(markdown.contains("$x_i^2$"));
    assert!(markdown.contains("$$\n\\int_0^1 f(x)\\,dx\n$$"));
    assert!(!markdown.contains("{{"), "leftover token in {markdown}");
    assert!(!markdown.contains("glyphs"));
}

#[test]
fn pipeline_reports_one_map_per_kind() {
    let protected = CapturePipeline::new().extract(&message_html());
    let kinds: Vec<_> = protected.placeholders.iter().map(|m| m.kind()).collect();
    assert_eq!(
        kinds,
        vec![PlaceholderKind::Code, PlaceholderKind::Table, PlaceholderKind::Math]
    );
    let counts: Vec<_> = protected.placeholders.iter().map(|m| m.len()).collect();
    assert_eq!(counts, vec![1, 1, 2]);
}

#[test]
fn interleaved_cycles_restore_independently() {
    let extractor = CodeExtractor;
    let first = extractor.extract(r#"<pre><code class="language-py">print("first")</code></pre>"#);
    let second = extractor.extract(r#"<pre><code class="language-js">log("second")</code></pre>"#);

    // Both cycles hand out {{CODE-0}}; each map only knows its own block
    let second_md = extractor.restore(&strip_tags(&second.html), &second.placeholders);
    let first_md = extractor.restore(&strip_tags(&first.html), &first.placeholders);

    assert!(first_md.contains("```py\nprint(\"first\")\n```"));
    assert!(!first_md.contains("second"));
    assert!(second_md.contains("```js\nlog(\"second\")\n```"));
    assert!(!second_md.contains("first"));
}

#[test]
fn restore_is_idempotent() {
    for extractor in [&CodeExtractor as &dyn Extractor, &TableParser, &MathExtractor] {
        let extraction = extractor.extract(&message_html());
        let once = extractor.restore(&strip_tags(&extraction.html), &extraction.placeholders);
        let twice = extractor.restore(&once, &extraction.placeholders);
        assert_eq!(once, twice);
    }
}

#[test]
fn nothing_to_protect_leaves_input_untouched() {
    let html = "<p>Just <em>prose</em> here.</p>";
    for extractor in [&CodeExtractor as &dyn Extractor, &TableParser, &MathExtractor] {
        let extraction = extractor.extract(html);
        assert_eq!(extraction.html, html);
        assert!(extraction.placeholders.is_empty());
    }
}

#[test]
fn placeholder_map_survives_json() {
    let extraction = TableParser.extract("<table><tr><td>x</td></tr></table>");
    let json = serde_json::to_string(&extraction.placeholders).unwrap();
    let back: chatmd_babel::PlaceholderMap = serde_json::from_str(&json).unwrap();
    assert_eq!(back, extraction.placeholders);
    assert_eq!(back.get("{{TABLE-0}}"), Some("\n\n| x |\n| --- |\n\n"));
}

#[test]
fn pipe_table_snapshot() {
    let rows = vec![
        vec!["Name".to_string(), "Age".to_string(), "City".to_string()],
        vec!["Ann".to_string(), "31".to_string()],
        vec!["Bo".to_string(), "".to_string(), "Oslo".to_string()],
    ];
    let table = format_pipe_table(&rows).unwrap();
    assert_snapshot!(table.trim(), @r"
    | Name | Age | City |
    | --- | --- | --- |
    | Ann | 31 |  |
    | Bo |  | Oslo |
    ");
}

#[test]
fn fenced_block_snapshot() {
    let block = fenced_block(Some("md"), "```\ninner\n```");
    assert_snapshot!(block.trim(), @r"
    ````md
    ```
    inner
    ```
    ````
    ");
}

#[test]
fn code_with_dollar_pairs_survives_capture() {
    let html = concat!(
        "<p>Process id:</p>",
        "<pre><code class=\"language-bash\">echo $$\n\n\necho $$</code></pre>",
        "<p>Cost $$ is not math</p>"
    );
    let markdown = CapturePipeline::new().capture(html, &strip_tags);
    assert!(
        markdown.contains("```bash\necho $$\n\n\necho $$\n```"),
        "code block altered: {markdown}"
    );
}

#[test]
fn table_cells_keep_formulas_and_code() {
    let html = format!(
        concat!(
            "<table><tr><th>term</th><th>example</th></tr>",
            "<tr><td>{}</td><td><pre><code class=\"language-sh\">ls\nls -la | wc</code></pre></td></tr>",
            "</table>"
        ),
        KATEX_INLINE
    );
    let markdown = CapturePipeline::new().capture(&html, &strip_tags);
    assert_snapshot!(markdown.trim(), @r"
    | term | example |
    | --- | --- |
    | $x_i^2$ | `ls ls -la \| wc` |
    ");
}

#[test]
fn stray_delimiter_does_not_hide_block_math() {
    let markdown =
        CapturePipeline::new().capture("<p>$$</p><p>price</p><p>$$x^2$$</p>", &strip_tags);
    assert!(markdown.contains("$$\nx^2\n$$"), "{markdown}");
}
