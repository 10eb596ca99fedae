use chatmd_babel::{
    repair_math_emphasis, CapturePipeline, CodeExtractor, Extractor, MathExtractor, TableParser,
};
use proptest::prelude::*;

fn extractors() -> [&'static dyn Extractor; 3] {
    [&CodeExtractor, &TableParser, &MathExtractor]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn extraction_never_panics(html in "\\PC{0,200}") {
        for extractor in extractors() {
            let extraction = extractor.extract(&html);
            let _ = extractor.restore(&extraction.html, &extraction.placeholders);
        }
    }

    #[test]
    fn extraction_tolerates_markup_fragments(
        parts in prop::collection::vec(
            prop_oneof![
                Just("<pre>"), Just("<code class=\"language-x\">"), Just("</code>"),
                Just("</pre>"), Just("<table>"), Just("<tr>"), Just("<td>"), Just("</table>"),
                Just("<span class=\"katex-error\">"), Just("</span>"), Just("$"), Just("$$"),
                Just("\\("), Just("\\)"), Just("\u{0}"), Just("\u{1b}"), Just("x"), Just("&amp;"),
            ],
            0..40,
        )
    ) {
        let html = parts.concat();
        let protected = CapturePipeline::new().extract(&html);
        let _ = CapturePipeline::new().restore(&protected.html, &protected);
        let _ = repair_math_emphasis(&html);
    }

    #[test]
    fn every_token_is_restored(code in "[a-z][a-z =;]{0,28}[a-z]", lang in "[a-z]{1,8}") {
        let html = format!("<p>a</p><pre><code class=\"language-{lang}\">{code}</code></pre>");
        let extraction = CodeExtractor.extract(&html);
        prop_assert_eq!(extraction.placeholders.len(), 1);
        let restored = CodeExtractor.restore(&extraction.html, &extraction.placeholders);
        prop_assert!(!restored.contains("{{CODE-"));
        let expected = format!("```{lang}\n{code}\n```");
        prop_assert!(restored.contains(&expected));
    }
}
