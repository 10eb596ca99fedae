use chatmd_babel::render::chunk::{fence_marker, split_into_chunks};
use chatmd_babel::{InputValidator, MarkdownRenderer, RenderOptions};
use proptest::prelude::*;

fn block() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{1,20}".prop_map(|p| format!("{p}\n")),
        Just("\n".to_string()),
        "[a-z\n ]{0,30}".prop_map(|body| format!("```\n{body}\n```\n")),
        "[a-z\n ]{0,30}".prop_map(|body| format!("~~~~\n{body}\n~~~~\n")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn chunks_reassemble_and_keep_fences_balanced(
        blocks in prop::collection::vec(block(), 0..30),
        size in 1usize..64,
    ) {
        let markdown = blocks.concat();
        let chunks = split_into_chunks(&markdown, size);
        prop_assert_eq!(chunks.concat(), markdown.clone());
        for chunk in chunks {
            let fences = chunk.lines().filter(|l| fence_marker(l).is_some()).count();
            prop_assert_eq!(fences % 2, 0, "unbalanced chunk {:?}", chunk);
        }
    }

    #[test]
    fn render_always_returns_displayable_html(markdown in "\\PC{0,300}") {
        let result = MarkdownRenderer::default().render(&markdown, &RenderOptions::default());
        prop_assert!(!result.html().to_ascii_lowercase().contains("<script"));
    }

    #[test]
    fn valid_input_is_returned_unchanged(markdown in "[a-zA-Z0-9 \n#*_]{0,200}") {
        let result = InputValidator::new().validate(&markdown, 1_000_000);
        prop_assert!(result.valid);
        prop_assert_eq!(result.sanitized, markdown);
    }

    #[test]
    fn truncation_respects_the_cap(markdown in "\\PC{0,200}", cap in 0usize..100) {
        let result = InputValidator::new().validate(&markdown, cap);
        if markdown.chars().count() > cap {
            prop_assert!(!result.valid);
            let kept = result.sanitized.chars().count() - "\n\n[Content truncated]".chars().count();
            prop_assert_eq!(kept, cap);
        }
    }
}
